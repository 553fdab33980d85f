//! 組込み関数と組込みメソッド
//!
//! - 組込み関数は `BuiltinDef` の静的テーブルで定義し、名前引きは `Lazy` な索引で行う。
//! - メソッドは型ごとの表（list / dict / str）から `BoundMethod` として取り出す。
//! - いずれも `&mut Interpreter` を受け取り、出力や終了要求を評価器経由で扱う。

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::BinOp;
use crate::errors::EvalError;
use crate::evaluator::{binary_op, Interpreter, Signal};
use crate::value::{as_num, compare_values, Num, Value};

pub type BuiltinFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, Signal>;
pub type MethodFn = fn(&mut Interpreter, &Value, Vec<Value>) -> Result<Value, Signal>;

pub struct BuiltinDef {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// `range()` が一度に生成できる要素数の上限。
const RANGE_LIMIT: i128 = 10_000_000;

static BUILTIN_DEFS: &[BuiltinDef] = &[
    BuiltinDef { name: "abs", func: builtin_abs },
    BuiltinDef { name: "bool", func: builtin_bool },
    BuiltinDef { name: "dir", func: builtin_dir },
    BuiltinDef { name: "exit", func: builtin_exit },
    BuiltinDef { name: "float", func: builtin_float },
    BuiltinDef { name: "int", func: builtin_int },
    BuiltinDef { name: "len", func: builtin_len },
    BuiltinDef { name: "list", func: builtin_list },
    BuiltinDef { name: "max", func: builtin_max },
    BuiltinDef { name: "min", func: builtin_min },
    BuiltinDef { name: "print", func: builtin_print },
    BuiltinDef { name: "quit", func: builtin_exit },
    BuiltinDef { name: "range", func: builtin_range },
    BuiltinDef { name: "repr", func: builtin_repr },
    BuiltinDef { name: "sorted", func: builtin_sorted },
    BuiltinDef { name: "str", func: builtin_str },
    BuiltinDef { name: "sum", func: builtin_sum },
    BuiltinDef { name: "type", func: builtin_type },
];

static BUILTINS: Lazy<HashMap<&'static str, &'static BuiltinDef>> =
    Lazy::new(|| BUILTIN_DEFS.iter().map(|d| (d.name, d)).collect());

static LIST_METHODS: &[(&str, MethodFn)] = &[("append", list_append), ("pop", list_pop)];
static DICT_METHODS: &[(&str, MethodFn)] = &[
    ("get", dict_get),
    ("keys", dict_keys),
    ("values", dict_values),
];
static STR_METHODS: &[(&str, MethodFn)] = &[
    ("join", str_join),
    ("lower", str_lower),
    ("split", str_split),
    ("strip", str_strip),
    ("upper", str_upper),
];

/// 名前から組込み関数を引く。
pub fn lookup_builtin(name: &str) -> Option<Value> {
    BUILTINS.get(name).map(|d| Value::Builtin(*d))
}

/// すべての組込み関数名（定義順）。
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_DEFS.iter().map(|d| d.name)
}

fn method_table(receiver: &Value) -> &'static [(&'static str, MethodFn)] {
    match receiver {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Str(_) => STR_METHODS,
        _ => &[],
    }
}

/// 値が持つメソッド名の一覧（補完・`dir()` 用）。
pub fn method_names(receiver: &Value) -> Vec<&'static str> {
    method_table(receiver).iter().map(|(n, _)| *n).collect()
}

/// メソッドを探し、見つかればレシーバと組にして返す。
pub fn lookup_method(receiver: &Value, name: &str) -> Option<(&'static str, MethodFn)> {
    method_table(receiver)
        .iter()
        .find(|(n, _)| *n == name)
        .copied()
}

/// 反復可能な値を要素のベクタへ展開する（文字列は 1 文字ずつ、辞書はキー）。
pub(crate) fn iterate(v: &Value) -> Result<Vec<Value>, EvalError> {
    match v {
        Value::List(xs) => Ok(xs.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(d) => Ok(d.borrow().keys()),
        other => Err(EvalError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let msg = if min == max {
        format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            min,
            plural(min),
            given
        )
    } else if given < min {
        format!(
            "{}() expected at least {} argument{}, got {}",
            name,
            min,
            plural(min),
            given
        )
    } else {
        format!(
            "{}() expected at most {} argument{}, got {}",
            name,
            max,
            plural(max),
            given
        )
    };
    Err(EvalError::type_error(msg))
}

/// 整数として解釈できる値（bool を含む）を取り出す。
pub(crate) fn as_index(v: &Value) -> Result<i64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(*b as i64),
        other => Err(EvalError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            other.type_name()
        ))),
    }
}

fn builtin_print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    let line = args
        .iter()
        .map(Value::to_str)
        .collect::<Vec<_>>()
        .join(" ");
    interp.write_line(&line)?;
    Ok(Value::None)
}

fn builtin_len(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("len", &args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(xs) => xs.borrow().len(),
        Value::Dict(d) => d.borrow().len(),
        other => {
            return Err(EvalError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::Int(n as i64))
}

fn builtin_range(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("range", &args, 1, 3)?;
    let nums = args.iter().map(as_index).collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match nums[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Ok(Value::list(Vec::new())),
    };
    if step == 0 {
        return Err(EvalError::value_error("range() arg 3 must not be zero").into());
    }
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let count = if step > 0 {
        (stop - start + step - 1).div_euclid(step)
    } else {
        (start - stop - step - 1).div_euclid(-step)
    }
    .max(0);
    if count > RANGE_LIMIT {
        return Err(EvalError::new("OverflowError", "range() result has too many items").into());
    }
    let items = (0..count)
        .map(|k| Value::Int((start + k * step) as i64))
        .collect();
    Ok(Value::list(items))
}

fn builtin_str(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("str", &args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_str).unwrap_or_default()))
}

fn builtin_repr(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("repr", &args, 1, 1)?;
    Ok(Value::Str(args[0].repr()))
}

fn builtin_int(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("int", &args, 0, 1)?;
    let Some(arg) = args.first() else {
        return Ok(Value::Int(0));
    };
    let n = match arg {
        Value::Int(i) => *i,
        Value::Bool(b) => *b as i64,
        Value::Float(f) => {
            if f.is_nan() {
                return Err(EvalError::value_error("cannot convert float NaN to integer").into());
            }
            if f.is_infinite() {
                return Err(EvalError::new(
                    "OverflowError",
                    "cannot convert float infinity to integer",
                )
                .into());
            }
            let t = f.trunc();
            if t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(EvalError::new("OverflowError", "integer overflow").into());
            }
            t as i64
        }
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map_err(|_| {
            EvalError::value_error(format!(
                "invalid literal for int() with base 10: {}",
                arg.repr()
            ))
        })?,
        other => {
            return Err(EvalError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::Int(n))
}

fn builtin_float(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("float", &args, 0, 1)?;
    let Some(arg) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    if let Value::Str(s) = arg {
        return s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::value_error(format!("could not convert string to float: {}", arg.repr()))
                .into()
        });
    }
    match as_num(arg) {
        Some(n) => Ok(Value::Float(n.to_f64())),
        None => Err(EvalError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            arg.type_name()
        ))
        .into()),
    }
}

fn builtin_bool(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}

fn builtin_type(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("type", &args, 1, 1)?;
    Ok(Value::str(args[0].type_name()))
}

fn builtin_abs(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("abs", &args, 1, 1)?;
    match as_num(&args[0]) {
        Some(Num::Int(i)) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| EvalError::new("OverflowError", "integer overflow").into()),
        Some(Num::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(EvalError::type_error(format!(
            "bad operand type for abs(): '{}'",
            args[0].type_name()
        ))
        .into()),
    }
}

/// min / max 共通: 引数 1 つなら反復可能値の要素、複数なら引数そのものを比較する。
fn extremum(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, Signal> {
    check_arity(name, &args, 1, usize::MAX)?;
    let items = if args.len() == 1 {
        iterate(&args[0])?
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EvalError::value_error(format!("{}() arg is an empty sequence", name)))?;
    let op = if want == Ordering::Less { "<" } else { ">" };
    for item in iter {
        if compare_values(&item, &best, op)? == want {
            best = item;
        }
    }
    Ok(best)
}

fn builtin_min(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    extremum("min", args, Ordering::Less)
}

fn builtin_max(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    extremum("max", args, Ordering::Greater)
}

fn builtin_sum(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("sum", &args, 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in iterate(&args[0])? {
        total = binary_op(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn builtin_sorted(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("sorted", &args, 1, 1)?;
    let mut items = iterate(&args[0])?;
    let mut failure = None;
    items.sort_by(|a, b| match compare_values(a, b, "<") {
        Ok(ord) => ord,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(Value::list(items)),
    }
}

fn builtin_list(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("list", &args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::list(iterate(v)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

fn builtin_dir(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("dir", &args, 0, 1)?;
    let mut names: Vec<String> = match args.first() {
        None => interp.global_names(),
        Some(Value::Module(m)) => m.namespace.borrow().keys().cloned().collect(),
        Some(v) => method_names(v).into_iter().map(String::from).collect(),
    };
    names.sort();
    Ok(Value::list(names.into_iter().map(Value::Str).collect()))
}

fn builtin_exit(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("exit", &args, 0, 1)?;
    let code = match args.first() {
        None | Some(Value::None) => 0,
        Some(Value::Int(i)) => (*i).clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        Some(Value::Bool(b)) => *b as i32,
        Some(_) => 1,
    };
    Err(Signal::Exit(code))
}

fn list_append(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("append", &args, 1, 1)?;
    if let Value::List(xs) = recv {
        xs.borrow_mut().extend(args);
    }
    Ok(Value::None)
}

fn list_pop(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("pop", &args, 0, 1)?;
    let Value::List(xs) = recv else {
        return Ok(Value::None);
    };
    let mut xs = xs.borrow_mut();
    if xs.is_empty() {
        return Err(EvalError::new("IndexError", "pop from empty list").into());
    }
    let len = xs.len() as i64;
    let raw = match args.first() {
        Some(v) => as_index(v)?,
        None => -1,
    };
    let idx = if raw < 0 { raw + len } else { raw };
    if !(0..len).contains(&idx) {
        return Err(EvalError::new("IndexError", "pop index out of range").into());
    }
    Ok(xs.remove(idx as usize))
}

fn dict_keys(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("keys", &args, 0, 0)?;
    match recv {
        Value::Dict(d) => Ok(Value::list(d.borrow().keys())),
        _ => Ok(Value::None),
    }
}

fn dict_values(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("values", &args, 0, 0)?;
    match recv {
        Value::Dict(d) => Ok(Value::list(d.borrow().values())),
        _ => Ok(Value::None),
    }
}

fn dict_get(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("get", &args, 1, 2)?;
    let default = args.get(1).cloned().unwrap_or(Value::None);
    match recv {
        Value::Dict(d) => Ok(d.borrow().get(&args[0]).unwrap_or(default)),
        _ => Ok(default),
    }
}

fn receiver_str(recv: &Value) -> &str {
    match recv {
        Value::Str(s) => s,
        _ => "",
    }
}

fn str_upper(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("upper", &args, 0, 0)?;
    Ok(Value::Str(receiver_str(recv).to_uppercase()))
}

fn str_lower(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("lower", &args, 0, 0)?;
    Ok(Value::Str(receiver_str(recv).to_lowercase()))
}

fn str_strip(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("strip", &args, 0, 0)?;
    Ok(Value::str(receiver_str(recv).trim()))
}

fn str_split(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("split", &args, 0, 1)?;
    let s = receiver_str(recv);
    let parts: Vec<Value> = match args.first() {
        None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
        Some(Value::Str(sep)) if sep.is_empty() => {
            return Err(EvalError::value_error("empty separator").into())
        }
        Some(Value::Str(sep)) => s.split(sep.as_str()).map(Value::str).collect(),
        Some(other) => {
            return Err(EvalError::type_error(format!(
                "must be str or None, not {}",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::list(parts))
}

fn str_join(_: &mut Interpreter, recv: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    check_arity("join", &args, 1, 1)?;
    let mut parts = Vec::new();
    for (i, item) in iterate(&args[0])?.into_iter().enumerate() {
        match item {
            Value::Str(s) => parts.push(s),
            other => {
                return Err(EvalError::type_error(format!(
                    "sequence item {}: expected str instance, {} found",
                    i,
                    other.type_name()
                ))
                .into())
            }
        }
    }
    Ok(Value::Str(parts.join(receiver_str(recv))))
}

#[cfg(test)]
mod tests {
    use super::{builtin_names, iterate, lookup_builtin, lookup_method, method_names};
    use crate::value::Value;

    #[test]
    /// 組込み関数表の索引が名前で引けることを確認する。
    fn builtin_lookup_by_name() {
        assert!(lookup_builtin("print").is_some());
        assert!(lookup_builtin("printf").is_none());
        assert!(builtin_names().any(|n| n == "sorted"));
    }

    #[test]
    /// 型ごとのメソッド表が分かれていることを検証する。
    fn method_tables_follow_receiver_type() {
        assert!(lookup_method(&Value::list(vec![]), "append").is_some());
        assert!(lookup_method(&Value::str("x"), "append").is_none());
        assert_eq!(
            method_names(&Value::str("x")),
            vec!["join", "lower", "split", "strip", "upper"]
        );
        assert!(method_names(&Value::Int(1)).is_empty());
    }

    #[test]
    /// 文字列の反復が 1 文字ずつになることを確かめる。
    fn iterate_string_yields_chars() {
        let items = iterate(&Value::str("ab")).unwrap();
        assert_eq!(items, vec![Value::str("a"), Value::str("b")]);
        assert_eq!(iterate(&Value::Int(3)).unwrap_err().kind(), "TypeError");
    }
}
