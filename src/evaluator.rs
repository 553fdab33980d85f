//! 評価器（evaluator）
//!
//! 目的:
//! - 対話入力を文単位で実行し、セッションをまたいで共有される環境を更新する。
//! - 式文の結果（`None` 以外）を repr で表示し、`_` に束縛する。
//!
//! 仕様要点:
//! - 整数演算は 64bit 範囲で検査し、溢れた場合は `OverflowError` を返す。
//! - 関数呼び出しの入れ子は `RECURSION_LIMIT` までとし、超えると `RecursionError`。
//! - `import m` は検索パス上の `m.tee` を読み込み、モジュール値としてキャッシュする。
//! - 実行時エラーには発生した文の行番号とソース名を後から補う。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, StmtKind, Target, UnaryOp};
use crate::builtins::{as_index, iterate, lookup_builtin, lookup_method};
use crate::errors::{EvalError, ParseError, SourceError, CONSOLE_SOURCE};
use crate::parser::parse_program;
use crate::value::{
    as_num, compare_values, new_namespace, values_equal, BoundMethod, Dict, Function, Module,
    Namespace, Num, Value,
};

/// 関数呼び出しの最大の入れ子数。
pub const RECURSION_LIMIT: usize = 200;

/// `import` が探すモジュールファイルの拡張子。
pub const MODULE_EXTENSION: &str = "tee";

/// 文字列・リストの繰り返しで生成できる最大要素数。
const REPEAT_LIMIT: usize = 1 << 28;

/// 実行を中断させる要因。エラーか、`exit()` による終了要求のいずれか。
#[derive(Debug)]
pub enum Signal {
    Error(SourceError),
    Exit(i32),
}

impl From<EvalError> for Signal {
    fn from(err: EvalError) -> Self {
        Signal::Error(SourceError::Eval(err))
    }
}

impl From<ParseError> for Signal {
    fn from(err: ParseError) -> Self {
        Signal::Error(SourceError::Syntax(err))
    }
}

/// 文の実行結果としての制御フロー。
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// 名前解決に使うスコープの組。モジュール直下では `locals` を持たない。
struct Frame {
    locals: Option<Namespace>,
    closure: Vec<Namespace>,
    globals: Namespace,
    declared_global: HashSet<String>,
}

impl Frame {
    fn module(globals: Namespace) -> Self {
        Self {
            locals: None,
            closure: Vec::new(),
            globals,
            declared_global: HashSet::new(),
        }
    }

    fn local_scope(&self, name: &str) -> Option<&Namespace> {
        if self.declared_global.contains(name) {
            return None;
        }
        self.locals.as_ref()
    }
}

pub struct Interpreter {
    globals: Namespace,
    modules: HashMap<String, Rc<Module>>,
    search_path: Vec<PathBuf>,
    out: Box<dyn Write>,
    depth: usize,
    origin: Rc<str>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// 標準出力へ書き出すインタプリタを作る。
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// 出力先を指定してインタプリタを作る（テストではバッファを渡す）。
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            globals: new_namespace(),
            modules: HashMap::new(),
            search_path: Vec::new(),
            out,
            depth: 0,
            origin: Rc::from(CONSOLE_SOURCE),
        }
    }

    /// 補完器と共有するグローバル環境のハンドル。
    pub fn namespace(&self) -> Namespace {
        self.globals.clone()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn search_path_mut(&mut self) -> &mut Vec<PathBuf> {
        &mut self.search_path
    }

    /// 評価出力に 1 行書き出す。
    pub(crate) fn write_line(&mut self, text: &str) -> Result<(), EvalError> {
        writeln!(self.out, "{}", text)
            .and_then(|_| self.out.flush())
            .map_err(|e| EvalError::new("OSError", e.to_string()))
    }

    /// ソースを文の列として実行する（式文の結果は表示しない）。
    pub fn run_source(&mut self, src: &str) -> Result<(), Signal> {
        let program = parse_program(src)?;
        let mut frame = Frame::module(self.globals.clone());
        self.exec_block(&program.body, &mut frame)?;
        Ok(())
    }

    /// 対話入力 1 件を実行する。トップレベルの式文は結果を表示して `_` に束縛する。
    pub fn run_interactive(&mut self, src: &str) -> Result<(), Signal> {
        let program = parse_program(src)?;
        debug!(statements = program.body.len(), "evaluating input");
        let mut frame = Frame::module(self.globals.clone());
        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::Expr(expr) => {
                    let value = self
                        .eval(expr, &mut frame)
                        .map_err(|sig| self.locate(sig, stmt.line))?;
                    if !value.is_none() {
                        let text = value.repr();
                        self.write_line(&text)
                            .map_err(|e| self.locate(e.into(), stmt.line))?;
                        self.set_global("_", value);
                    }
                }
                _ => {
                    self.exec_stmt(stmt, &mut frame)
                        .map_err(|sig| self.locate(sig, stmt.line))?;
                }
            }
        }
        Ok(())
    }

    /// 位置未設定の実行時エラーに行番号と現在のソース名を補う。
    fn locate(&self, sig: Signal, line: usize) -> Signal {
        match sig {
            Signal::Error(SourceError::Eval(mut err)) if err.0.line.is_none() => {
                err.0.line = Some(line);
                if &*self.origin != CONSOLE_SOURCE {
                    err.0.source = Some(self.origin.to_string());
                }
                Signal::Error(SourceError::Eval(err))
            }
            other => other,
        }
    }

    fn exec_block(&mut self, body: &[Stmt], frame: &mut Frame) -> Result<Flow, Signal> {
        for stmt in body {
            let flow = self
                .exec_stmt(stmt, frame)
                .map_err(|sig| self.locate(sig, stmt.line))?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, Signal> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value, frame)?;
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value, frame)?,
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond, frame)?.truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                return self.exec_block(orelse, frame);
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond, frame)?.truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For { var, iter, body } => {
                let items = iterate(&self.eval(iter, frame)?)?;
                for item in items {
                    self.store_name(var, item, frame);
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Def(def) => {
                let mut closure: Vec<Namespace> = frame.locals.iter().cloned().collect();
                closure.extend(frame.closure.iter().cloned());
                let func = Function {
                    def: def.clone(),
                    globals: frame.globals.clone(),
                    closure,
                    origin: self.origin.clone(),
                };
                self.store_name(&def.name, Value::Function(Rc::new(func)), frame);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(e) => self.eval(e, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Del(targets) => {
                for target in targets {
                    self.delete(target, frame)?;
                }
            }
            StmtKind::Import(name) => {
                let module = self.import(name)?;
                self.store_name(name, Value::Module(module), frame);
            }
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, frame)?.truthy() {
                    let msg = match msg {
                        Some(e) => self.eval(e, frame)?.to_str(),
                        None => String::new(),
                    };
                    return Err(EvalError::new("AssertionError", msg).into());
                }
            }
            StmtKind::Global(names) => {
                frame.declared_global.extend(names.iter().cloned());
            }
        }
        Ok(Flow::Normal)
    }

    fn store_name(&mut self, name: &str, value: Value, frame: &Frame) {
        let scope = frame.local_scope(name).unwrap_or(&frame.globals);
        scope.borrow_mut().insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str, frame: &Frame) -> Result<Value, EvalError> {
        if let Some(locals) = frame.local_scope(name) {
            if let Some(v) = locals.borrow().get(name) {
                return Ok(v.clone());
            }
        }
        if !frame.declared_global.contains(name) {
            for scope in &frame.closure {
                if let Some(v) = scope.borrow().get(name) {
                    return Ok(v.clone());
                }
            }
        }
        if let Some(v) = frame.globals.borrow().get(name) {
            return Ok(v.clone());
        }
        lookup_builtin(name).ok_or_else(|| EvalError::name(name))
    }

    fn assign(&mut self, target: &Target, value: Value, frame: &mut Frame) -> Result<(), Signal> {
        match target {
            Target::Name(name) => self.store_name(name, value, frame),
            Target::Index { obj, index } => {
                let obj = self.eval(obj, frame)?;
                let index = self.eval(index, frame)?;
                set_item(&obj, index, value)?;
            }
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinOp,
        value: &Expr,
        frame: &mut Frame,
    ) -> Result<(), Signal> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name, frame)?;
                let rhs = self.eval(value, frame)?;
                let result = in_place_op(op, current, &rhs)?;
                self.store_name(name, result, frame);
            }
            Target::Index { obj, index } => {
                let obj = self.eval(obj, frame)?;
                let index = self.eval(index, frame)?;
                let current = get_item(&obj, &index)?;
                let rhs = self.eval(value, frame)?;
                let result = in_place_op(op, current, &rhs)?;
                set_item(&obj, index, result)?;
            }
        }
        Ok(())
    }

    fn delete(&mut self, target: &Target, frame: &mut Frame) -> Result<(), Signal> {
        match target {
            Target::Name(name) => {
                let scope = frame.local_scope(name).unwrap_or(&frame.globals);
                if scope.borrow_mut().remove(name).is_none() {
                    return Err(EvalError::name(name).into());
                }
            }
            Target::Index { obj, index } => {
                let obj = self.eval(obj, frame)?;
                let index = self.eval(index, frame)?;
                del_item(&obj, &index)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, Signal> {
        Ok(match expr {
            Expr::Name(name) => self.lookup(name, frame)?,
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::None => Value::None,
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, frame)?);
                }
                Value::list(values)
            }
            Expr::Dict(entries) => {
                let mut dict = Dict::new();
                for (k, v) in entries {
                    let key = self.eval(k, frame)?;
                    let value = self.eval(v, frame)?;
                    dict.insert(key, value)?;
                }
                Value::dict(dict)
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, frame)?;
                unary_op(*op, &v)?
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, frame)?;
                let r = self.eval(right, frame)?;
                binary_op(*op, &l, &r)?
            }
            Expr::BoolOp { op, left, right } => {
                let l = self.eval(left, frame)?;
                match (op, l.truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => l,
                    _ => self.eval(right, frame)?,
                }
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first, frame)?;
                for (op, e) in rest {
                    let right = self.eval(e, frame)?;
                    if !compare_op(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Value::Bool(true)
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func, frame)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                self.call_value(&callee, values)?
            }
            Expr::Index { obj, index } => {
                let obj = self.eval(obj, frame)?;
                let index = self.eval(index, frame)?;
                get_item(&obj, &index)?
            }
            Expr::Attr { obj, name } => {
                let obj = self.eval(obj, frame)?;
                get_attr(&obj, name)?
            }
        })
    }

    /// 呼び出し可能な値を実引数に適用する。
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Signal> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Builtin(def) => (def.func)(self, args),
            Value::Method(m) => (m.func)(self, &m.receiver, args),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn call_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Result<Value, Signal> {
        check_call_arity(&func.def.name, &func.def.params, args.len())?;
        if self.depth >= RECURSION_LIMIT {
            return Err(EvalError::new("RecursionError", "maximum recursion depth exceeded").into());
        }
        trace!(function = %func.def.name, depth = self.depth, "call");
        let locals = new_namespace();
        {
            let mut env = locals.borrow_mut();
            for (param, arg) in func.def.params.iter().zip(args) {
                env.insert(param.clone(), arg);
            }
        }
        let mut frame = Frame {
            locals: Some(locals),
            closure: func.closure.clone(),
            globals: func.globals.clone(),
            declared_global: HashSet::new(),
        };
        self.depth += 1;
        let saved = mem::replace(&mut self.origin, func.origin.clone());
        let result = self.exec_block(&func.def.body, &mut frame);
        self.origin = saved;
        self.depth -= 1;
        match result? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::None),
        }
    }

    /// モジュールを読み込む。読み込み済みならキャッシュを返す。
    fn import(&mut self, name: &str) -> Result<Rc<Module>, Signal> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let file = format!("{}.{}", name, MODULE_EXTENSION);
        let path = self
            .search_path
            .iter()
            .map(|dir| dir.join(&file))
            .find(|p| p.is_file())
            .ok_or_else(|| EvalError::new("ImportError", format!("No module named '{}'", name)))?;
        debug!(module = name, path = %path.display(), "importing module");
        let display = path.display().to_string();
        let src = fs::read_to_string(&path).map_err(|e| {
            EvalError::new("ImportError", format!("cannot read {}: {}", display, e))
        })?;
        let program = parse_program(&src).map_err(|mut e| {
            e.0.source = Some(display.clone());
            e
        })?;
        let module = Rc::new(Module {
            name: name.to_string(),
            path,
            namespace: new_namespace(),
        });
        // 循環 import に備え、実行前にキャッシュへ登録しておく。
        self.modules.insert(name.to_string(), module.clone());
        let saved = mem::replace(&mut self.origin, Rc::from(display.as_str()));
        let mut frame = Frame::module(module.namespace.clone());
        let result = self.exec_block(&program.body, &mut frame);
        self.origin = saved;
        if let Err(sig) = result {
            self.modules.remove(name);
            return Err(sig);
        }
        Ok(module)
    }
}

fn check_call_arity(name: &str, params: &[String], given: usize) -> Result<(), EvalError> {
    let expected = params.len();
    if given < expected {
        let missing: Vec<String> = params[given..].iter().map(|p| format!("'{}'", p)).collect();
        let names = match missing.split_last() {
            Some((last, [])) => last.clone(),
            Some((last, init)) => format!("{} and {}", init.join(", "), last),
            None => String::new(),
        };
        let n = missing.len();
        return Err(EvalError::type_error(format!(
            "{}() missing {} required positional argument{}: {}",
            name,
            n,
            if n == 1 { "" } else { "s" },
            names
        )));
    }
    if given > expected {
        return Err(EvalError::type_error(format!(
            "{}() takes {} positional argument{} but {} {} given",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            given,
            if given == 1 { "was" } else { "were" }
        )));
    }
    Ok(())
}

fn overflow() -> EvalError {
    EvalError::new("OverflowError", "integer overflow")
}

fn unary_op(op: UnaryOp, v: &Value) -> Result<Value, EvalError> {
    let symbol = match op {
        UnaryOp::Not => return Ok(Value::Bool(!v.truthy())),
        UnaryOp::Neg => "-",
        UnaryOp::Pos => "+",
    };
    match (op, as_num(v)) {
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (_, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (_, Some(Num::Float(f))) => Ok(Value::Float(f)),
        _ => Err(EvalError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            v.type_name()
        ))),
    }
}

/// 二項算術演算。数値は int / float を自動で昇格し、文字列とリストは連結と繰り返しに対応する。
pub(crate) fn binary_op(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    if let (Some(a), Some(b)) = (as_num(l), as_num(r)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
            (x, y) => float_op(op, x.to_f64(), y.to_f64()),
        };
    }
    match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(s.len(), *n)?;
            Ok(Value::Str(s.repeat(count)))
        }
        (BinOp::Mul, Value::List(xs), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::List(xs)) => {
            let items = xs.borrow();
            let count = repeat_count(items.len(), *n)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => Err(EvalError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn repeat_count(len: usize, n: i64) -> Result<usize, EvalError> {
    let count = usize::try_from(n.max(0)).map_err(|_| overflow())?;
    match len.checked_mul(count) {
        Some(total) if total <= REPEAT_LIMIT => Ok(count),
        _ => Err(EvalError::new("OverflowError", "repeated sequence is too long")),
    }
}

fn int_op(op: BinOp, x: i64, y: i64) -> Result<Value, EvalError> {
    let zero_div = || EvalError::new("ZeroDivisionError", "integer division or modulo by zero");
    match op {
        BinOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Div => {
            if y == 0 {
                return Err(EvalError::new("ZeroDivisionError", "division by zero"));
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(zero_div());
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            // 商は負の無限大方向へ丸める。
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(zero_div());
            }
            let r = x.checked_rem(y).unwrap_or(0);
            // 余りの符号は除数に揃える。
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(EvalError::new(
                        "ZeroDivisionError",
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
    }
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<Value, EvalError> {
    let zero = |what: &str| EvalError::new("ZeroDivisionError", format!("float {} by zero", what));
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(zero("division"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(zero("floor division"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(zero("modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::new(
                    "ZeroDivisionError",
                    "0.0 cannot be raised to a negative power",
                ));
            }
            x.powf(y)
        }
    };
    Ok(Value::Float(v))
}

/// 累算代入。リスト同士の `+=` は左辺を破壊的に拡張する。
fn in_place_op(op: BinOp, current: Value, rhs: &Value) -> Result<Value, EvalError> {
    if let (BinOp::Add, Value::List(xs), Value::List(ys)) = (op, &current, rhs) {
        let extra = ys.borrow().clone();
        xs.borrow_mut().extend(extra);
        return Ok(current);
    }
    binary_op(op, &current, rhs)
}

fn compare_op(op: CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering::{Greater, Less};
    // NaN を含む比較は常に偽になるよう浮動小数のまま比べる。
    if let (Some(a), Some(b)) = (as_num(l), as_num(r)) {
        if matches!(a, Num::Float(_)) || matches!(b, Num::Float(_)) {
            let (x, y) = (a.to_f64(), b.to_f64());
            match op {
                CmpOp::Lt => return Ok(x < y),
                CmpOp::Le => return Ok(x <= y),
                CmpOp::Gt => return Ok(x > y),
                CmpOp::Ge => return Ok(x >= y),
                _ => {}
            }
        }
    }
    let symbol = op.to_string();
    Ok(match op {
        CmpOp::Eq => values_equal(l, r),
        CmpOp::Ne => !values_equal(l, r),
        CmpOp::Lt => compare_values(l, r, &symbol)? == Less,
        CmpOp::Le => compare_values(l, r, &symbol)? != Greater,
        CmpOp::Gt => compare_values(l, r, &symbol)? == Greater,
        CmpOp::Ge => compare_values(l, r, &symbol)? != Less,
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
    })
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(xs) => Ok(xs.borrow().iter().any(|x| values_equal(x, item))),
        Value::Dict(d) => Ok(d.borrow().contains_key(item)),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// 負の添字を末尾からの位置に読み替え、範囲内なら usize を返す。
fn normalize_index(index: &Value, len: usize, kind: &str) -> Result<Option<usize>, EvalError> {
    let raw = match index {
        Value::Int(_) | Value::Bool(_) => as_index(index)?,
        other => {
            return Err(EvalError::type_error(format!(
                "{} indices must be integers, not {}",
                kind,
                other.type_name()
            )))
        }
    };
    let len = len as i64;
    let idx = if raw < 0 { raw + len } else { raw };
    Ok((0..len).contains(&idx).then_some(idx as usize))
}

fn get_item(obj: &Value, index: &Value) -> Result<Value, EvalError> {
    match obj {
        Value::List(xs) => {
            let xs = xs.borrow();
            normalize_index(index, xs.len(), "list")?
                .map(|i| xs[i].clone())
                .ok_or_else(|| EvalError::new("IndexError", "list index out of range"))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(index, chars.len(), "string")?
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| EvalError::new("IndexError", "string index out of range"))
        }
        Value::Dict(d) => d
            .borrow()
            .get(index)
            .ok_or_else(|| EvalError::new("KeyError", index.repr())),
        other => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(obj: &Value, index: Value, value: Value) -> Result<(), EvalError> {
    match obj {
        Value::List(xs) => {
            let mut xs = xs.borrow_mut();
            let len = xs.len();
            match normalize_index(&index, len, "list")? {
                Some(i) => {
                    xs[i] = value;
                    Ok(())
                }
                None => Err(EvalError::new("IndexError", "list assignment index out of range")),
            }
        }
        Value::Dict(d) => d.borrow_mut().insert(index, value),
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn del_item(obj: &Value, index: &Value) -> Result<(), EvalError> {
    match obj {
        Value::List(xs) => {
            let mut xs = xs.borrow_mut();
            let len = xs.len();
            match normalize_index(index, len, "list")? {
                Some(i) => {
                    xs.remove(i);
                    Ok(())
                }
                None => Err(EvalError::new("IndexError", "list assignment index out of range")),
            }
        }
        Value::Dict(d) => d
            .borrow_mut()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| EvalError::new("KeyError", index.repr())),
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item deletion",
            other.type_name()
        ))),
    }
}

fn get_attr(obj: &Value, name: &str) -> Result<Value, EvalError> {
    if let Value::Module(m) = obj {
        return m.namespace.borrow().get(name).cloned().ok_or_else(|| {
            EvalError::new(
                "AttributeError",
                format!("module '{}' has no attribute '{}'", m.name, name),
            )
        });
    }
    match lookup_method(obj, name) {
        Some((name, func)) => Ok(Value::Method(Rc::new(BoundMethod {
            receiver: obj.clone(),
            name,
            func,
        }))),
        None => Err(EvalError::new(
            "AttributeError",
            format!("'{}' object has no attribute '{}'", obj.type_name(), name),
        )),
    }
}
