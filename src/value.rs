// パス: src/value.rs
// 役割: 実行時の値表現と表示（repr/str）・真偽・比較の共通ロジックを提供する
// 意図: 評価器・組込み関数・補完の三者で値の扱いを統一する
// 関連ファイル: src/evaluator.rs, src/builtins.rs, src/completer.rs
//! 実行時値モジュール
//!
//! - リストと辞書は `Rc<RefCell<_>>` で共有され、別名を通じた変更が見える。
//! - 辞書は挿入順を保持し、キーにはハッシュ可能なスカラー値のみを許す。
//! - すべての環境は単一スレッド前提で `Rc` を用いる。

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::builtins::{BuiltinDef, MethodFn};
use crate::errors::EvalError;

/// 名前から値への写像（評価環境の実体）。
pub type Env = HashMap<String, Value>;

/// 評価器と補完器が共有する環境ハンドル。
pub type Namespace = Rc<RefCell<Env>>;

/// 空の環境ハンドルを作る。
pub fn new_namespace() -> Namespace {
    Rc::new(RefCell::new(Env::new()))
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Dict>>),
    Function(Rc<Function>),
    Builtin(&'static BuiltinDef),
    Method(Rc<BoundMethod>),
    Module(Rc<Module>),
}

/// ユーザー定義関数（クロージャ）。
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub globals: Namespace,
    /// 内側から外側へ並んだ外側関数のローカル環境。
    pub closure: Vec<Namespace>,
    /// 定義元のソース名（`<console>` またはモジュールのパス）。
    pub origin: Rc<str>,
}

/// レシーバに束縛された組込みメソッド。
pub struct BoundMethod {
    pub receiver: Value,
    pub name: &'static str,
    pub func: MethodFn,
}

/// `import` で読み込まれたモジュール。
pub struct Module {
    pub name: String,
    pub path: PathBuf,
    pub namespace: Namespace,
}

/// 挿入順を保持する連想配列。
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| values_equal(k, key))
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries[i].1.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// キーのハッシュ可能性を検査してから挿入（既存キーは上書き）する。
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), EvalError> {
        ensure_hashable(&key)?;
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// `type(x)` や診断メッセージで使う型名。
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(xs) => !xs.borrow().is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            _ => true,
        }
    }

    /// 対話表示用の表現（`repr`）。
    pub fn repr(&self) -> String {
        let mut out = String::new();
        write_repr(self, &mut out, &mut Vec::new());
        out
    }

    /// `print` / `str()` 用の表現。文字列はそのまま返す。
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

fn ensure_hashable(key: &Value) -> Result<(), EvalError> {
    match key {
        Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Ok(()),
        Value::Function(_) | Value::Builtin(_) | Value::Module(_) => Ok(()),
        other => Err(EvalError::type_error(format!(
            "unhashable type: '{}'",
            other.type_name()
        ))),
    }
}

/// 自己参照するコンテナを `[...]` として打ち切りながら repr を組み立てる。
fn write_repr(v: &Value, out: &mut String, seen: &mut Vec<usize>) {
    match v {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(x) => out.push_str(&format_float(*x)),
        Value::Str(s) => out.push_str(&quote_str(s)),
        Value::List(xs) => {
            let addr = Rc::as_ptr(xs) as *const () as usize;
            if seen.contains(&addr) {
                out.push_str("[...]");
                return;
            }
            seen.push(addr);
            out.push('[');
            for (i, item) in xs.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(item, out, seen);
            }
            out.push(']');
            seen.pop();
        }
        Value::Dict(d) => {
            let addr = Rc::as_ptr(d) as *const () as usize;
            if seen.contains(&addr) {
                out.push_str("{...}");
                return;
            }
            seen.push(addr);
            out.push('{');
            for (i, (k, val)) in d.borrow().entries().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(k, out, seen);
                out.push_str(": ");
                write_repr(val, out, seen);
            }
            out.push('}');
            seen.pop();
        }
        Value::Function(func) => out.push_str(&format!("<function {}>", func.def.name)),
        Value::Builtin(def) => out.push_str(&format!("<built-in function {}>", def.name)),
        Value::Method(m) => out.push_str(&format!(
            "<built-in method {} of {} object>",
            m.name,
            m.receiver.type_name()
        )),
        Value::Module(m) => out.push_str(&format!(
            "<module '{}' from '{}'>",
            m.name,
            m.path.display()
        )),
    }
}

/// 浮動小数を対話表示向けに整形する（整数値でも小数点を残す）。
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // 1e16 -> 1e+16, 1.5e-5 -> 1.5e-05
        let s = format!("{:e}", x);
        if let Some((mantissa, exp)) = s.split_once('e') {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            return format!("{}e{}{:0>2}", mantissa, sign, digits);
        }
        return s;
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// 文字列をクォート付きで表現する。`'` を含み `"` を含まない場合のみ `"` で囲む。
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// 数値として扱える値を (整数, 浮動小数) のどちらかへ正規化する。
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

pub(crate) fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

impl Num {
    pub(crate) fn to_f64(&self) -> f64 {
        match self {
            Num::Int(i) => *i as f64,
            Num::Float(f) => *f,
        }
    }
}

/// 構造的な等価判定。数値は型をまたいで比較する。
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return match (x, y) {
            (Num::Int(x), Num::Int(y)) => x == y,
            (x, y) => x.to_f64() == y.to_f64(),
        };
    }
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(xs), Value::List(ys)) => {
            if Rc::ptr_eq(xs, ys) {
                return true;
            }
            let xs = xs.borrow();
            let ys = ys.borrow();
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len()
                && x
                    .entries()
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, &w)))
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => std::ptr::eq(*x, *y),
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// 順序比較。未対応の組み合わせは TypeError を返す。
pub fn compare_values(a: &Value, b: &Value, op: &str) -> Result<Ordering, EvalError> {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return match (x, y) {
            (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
            (x, y) => Ok(x.to_f64().partial_cmp(&y.to_f64()).unwrap_or(Ordering::Equal)),
        };
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(xs), Value::List(ys)) => {
            let xs = xs.borrow().clone();
            let ys = ys.borrow().clone();
            for (x, y) in xs.iter().zip(ys.iter()) {
                if !values_equal(x, y) {
                    return compare_values(x, y, op);
                }
            }
            Ok(xs.len().cmp(&ys.len()))
        }
        _ => Err(EvalError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}
