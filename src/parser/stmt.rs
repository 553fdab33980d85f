// パス: src/parser/stmt.rs
// 役割: 文・ブロック（suite）の構文解析ルーチンを実装する
// 意図: インデントに基づく複合文の解析を式の解析から分離する
// 関連ファイル: src/parser/expr.rs, src/parser/mod.rs, src/ast.rs

use std::rc::Rc;

use super::Parser;
use crate::ast::{BinOp, Expr, FunctionDef, Program, Stmt, StmtKind, Target};
use crate::errors::ParseError;
use crate::lexer::TokenKind;

impl Parser {
    pub(super) fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.at(TokenKind::EOF) {
            if self.accept(TokenKind::NEWLINE).is_some() {
                continue;
            }
            self.parse_statement(&mut body)?;
        }
        Ok(Program { body })
    }

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        let stmt = match self.peek().kind {
            TokenKind::IF => self.parse_if()?,
            TokenKind::WHILE => self.parse_while()?,
            TokenKind::FOR => self.parse_for()?,
            TokenKind::DEF => self.parse_def()?,
            TokenKind::INDENT | TokenKind::DEDENT => return Err(self.invalid_syntax()),
            _ => return self.parse_simple_line(out),
        };
        out.push(stmt);
        Ok(())
    }

    /// `;` で区切られた単純文を行末まで読む。末尾の `;` は許容する。
    fn parse_simple_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        loop {
            out.push(self.parse_simple()?);
            if self.accept(TokenKind::SEMI).is_none() || self.at_line_end() {
                break;
            }
        }
        self.end_of_line()
    }

    fn at_line_end(&self) -> bool {
        self.at(TokenKind::NEWLINE) || self.at(TokenKind::EOF)
    }

    fn end_of_line(&mut self) -> Result<(), ParseError> {
        if self.accept(TokenKind::NEWLINE).is_some() || self.at(TokenKind::EOF) {
            return Ok(());
        }
        Err(self.invalid_syntax())
    }

    fn parse_simple(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        let kind = match self.peek().kind {
            TokenKind::PASS => {
                self.pop_any();
                StmtKind::Pass
            }
            TokenKind::BREAK => {
                if self.loop_depth == 0 {
                    return Err(self.error_here("'break' outside loop"));
                }
                self.pop_any();
                StmtKind::Break
            }
            TokenKind::CONTINUE => {
                if self.loop_depth == 0 {
                    return Err(self.error_here("'continue' not properly in loop"));
                }
                self.pop_any();
                StmtKind::Continue
            }
            TokenKind::RETURN => {
                if self.func_depth == 0 {
                    return Err(self.error_here("'return' outside function"));
                }
                self.pop_any();
                if self.at_line_end() || self.at(TokenKind::SEMI) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            TokenKind::DEL => {
                self.pop_any();
                let mut targets = vec![self.parse_target()?];
                while self.accept(TokenKind::COMMA).is_some() {
                    targets.push(self.parse_target()?);
                }
                StmtKind::Del(targets)
            }
            TokenKind::IMPORT => {
                self.pop_any();
                let name = self.pop(TokenKind::NAME, "module name")?;
                StmtKind::Import(name.value)
            }
            TokenKind::ASSERT => {
                self.pop_any();
                let test = self.parse_expr()?;
                let msg = if self.accept(TokenKind::COMMA).is_some() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            TokenKind::GLOBAL => {
                self.pop_any();
                let mut names = vec![self.pop(TokenKind::NAME, "name")?.value];
                while self.accept(TokenKind::COMMA).is_some() {
                    names.push(self.pop(TokenKind::NAME, "name")?.value);
                }
                StmtKind::Global(names)
            }
            _ => self.parse_expr_statement()?,
        };
        Ok(Stmt::new(kind, line))
    }

    fn parse_expr_statement(&mut self) -> Result<StmtKind, ParseError> {
        let start = self.peek().clone();
        let expr = self.parse_expr()?;
        if self.accept(TokenKind::ASSIGN).is_some() {
            let target = expr_to_target(expr)
                .ok_or_else(|| ParseError::at("cannot assign to expression", start.line, start.col))?;
            let value = self.parse_expr()?;
            return Ok(StmtKind::Assign { target, value });
        }
        if let Some(op) = self.accept_aug_op() {
            let target = expr_to_target(expr).ok_or_else(|| {
                ParseError::at(
                    "illegal expression for augmented assignment",
                    start.line,
                    start.col,
                )
            })?;
            let value = self.parse_expr()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }
        Ok(StmtKind::Expr(expr))
    }

    fn accept_aug_op(&mut self) -> Option<BinOp> {
        let op = match self.peek().kind {
            TokenKind::PLUSEQ => BinOp::Add,
            TokenKind::MINUSEQ => BinOp::Sub,
            TokenKind::STAREQ => BinOp::Mul,
            TokenKind::SLASHEQ => BinOp::Div,
            TokenKind::DSLASHEQ => BinOp::FloorDiv,
            TokenKind::PERCENTEQ => BinOp::Mod,
            _ => return None,
        };
        self.pop_any();
        Some(op)
    }

    fn parse_target(&mut self) -> Result<Target, ParseError> {
        let start = self.peek().clone();
        let expr = self.parse_postfix()?;
        expr_to_target(expr).ok_or_else(|| ParseError::at("cannot delete expression", start.line, start.col))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let line = self.pop(TokenKind::IF, "'if'")?.line;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_suite()?;
        branches.push((cond, body));
        let mut orelse = Vec::new();
        loop {
            if self.accept(TokenKind::ELIF).is_some() {
                let cond = self.parse_expr()?;
                let body = self.parse_suite()?;
                branches.push((cond, body));
                continue;
            }
            if self.accept(TokenKind::ELSE).is_some() {
                orelse = self.parse_suite()?;
            }
            break;
        }
        Ok(Stmt::new(StmtKind::If { branches, orelse }, line))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let line = self.pop(TokenKind::WHILE, "'while'")?.line;
        let cond = self.parse_expr()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::new(StmtKind::While { cond, body }, line))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let line = self.pop(TokenKind::FOR, "'for'")?.line;
        let var = self.pop(TokenKind::NAME, "loop variable")?.value;
        self.pop(TokenKind::IN, "'in'")?;
        let iter = self.parse_expr()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::new(StmtKind::For { var, iter, body }, line))
    }

    fn parse_def(&mut self) -> Result<Stmt, ParseError> {
        let line = self.pop(TokenKind::DEF, "'def'")?.line;
        let name = self.pop(TokenKind::NAME, "function name")?.value;
        self.pop(TokenKind::LPAREN, "'('")?;
        let mut params: Vec<String> = Vec::new();
        while !self.at(TokenKind::RPAREN) {
            let tok = self.pop(TokenKind::NAME, "parameter name")?;
            if params.contains(&tok.value) {
                return Err(ParseError::at(
                    format!("duplicate argument '{}' in function definition", tok.value),
                    tok.line,
                    tok.col,
                ));
            }
            params.push(tok.value);
            if self.accept(TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.pop(TokenKind::RPAREN, "')'")?;
        // 関数本体は外側のループとは独立に扱う。
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.parse_suite();
        self.func_depth -= 1;
        self.loop_depth = saved_loops;
        let def = FunctionDef {
            name,
            params,
            body: body?,
        };
        Ok(Stmt::new(StmtKind::Def(Rc::new(def)), line))
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        body
    }

    /// `:` に続くブロックを解析する。同一行の単純文か、INDENT で始まる複数文を受け付ける。
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.pop(TokenKind::COLON, "':'")?;
        if self.accept(TokenKind::NEWLINE).is_none() {
            let mut body = Vec::new();
            self.parse_simple_line(&mut body)?;
            return Ok(body);
        }
        if !self.at(TokenKind::INDENT) {
            let mut err = self.error_here("expected an indented block");
            err.0.kind = "IndentationError";
            return Err(err);
        }
        self.pop_any();
        let mut body = Vec::new();
        while !self.at(TokenKind::DEDENT) && !self.at(TokenKind::EOF) {
            if self.accept(TokenKind::NEWLINE).is_some() {
                continue;
            }
            self.parse_statement(&mut body)?;
        }
        self.accept(TokenKind::DEDENT);
        Ok(body)
    }
}

/// 代入可能な式（名前・添字）を `Target` へ変換する。
fn expr_to_target(expr: Expr) -> Option<Target> {
    match expr {
        Expr::Name(name) => Some(Target::Name(name)),
        Expr::Index { obj, index } => Some(Target::Index {
            obj: *obj,
            index: *index,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinOp, Expr, StmtKind, Target};
    use crate::parser::parse_program;

    #[test]
    /// if / elif / else の分岐が 1 つの文にまとまることを確認する。
    fn if_elif_else_chain() {
        let prog = parse_program("if a:\n  x = 1\nelif b:\n  x = 2\nelse:\n  x = 3\n").unwrap();
        assert_eq!(prog.body.len(), 1);
        match &prog.body[0].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(orelse.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 関数定義の引数と本体を検証する。
    fn def_with_params_and_body() {
        let prog = parse_program("def add(a, b):\n    return a + b\n").unwrap();
        match &prog.body[0].kind {
            StmtKind::Def(def) => {
                assert_eq!(def.name, "add");
                assert_eq!(def.params, vec!["a", "b"]);
                assert!(matches!(def.body[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 同一行に書いた単純文がブロックとして扱われることを確かめる。
    fn inline_suite_is_accepted() {
        let prog = parse_program("while x: x -= 1\n").unwrap();
        match &prog.body[0].kind {
            StmtKind::While { body, .. } => assert!(matches!(
                body[0].kind,
                StmtKind::AugAssign { op: BinOp::Sub, .. }
            )),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 添字代入が Target::Index に変換されることを確認する。
    fn subscript_assignment_target() {
        let prog = parse_program("xs[0] = 5").unwrap();
        match &prog.body[0].kind {
            StmtKind::Assign { target: Target::Index { obj, .. }, value } => {
                assert_eq!(*obj, Expr::Name("xs".into()));
                assert_eq!(*value, Expr::Int(5));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 代入できない左辺が構文エラーになることを検証する。
    fn assignment_to_call_is_rejected() {
        let err = parse_program("f() = 1").unwrap_err();
        assert_eq!(err.0.msg, "cannot assign to expression");
    }

    #[test]
    /// ループ外の break と関数外の return を構文エラーとして拒否することを確認する。
    fn control_flow_outside_context_is_rejected() {
        let err = parse_program("break").unwrap_err();
        assert_eq!(err.0.msg, "'break' outside loop");
        let err = parse_program("return 1").unwrap_err();
        assert_eq!(err.0.msg, "'return' outside function");
        let err = parse_program("while x:\n    def f():\n        continue\n").unwrap_err();
        assert_eq!(err.0.msg, "'continue' not properly in loop");
        assert!(parse_program("def f():\n    for x in xs:\n        return x\n").is_ok());
    }

    #[test]
    /// ブロック本体の欠落が IndentationError として報告されることを確認する。
    fn missing_block_is_indentation_error() {
        let err = parse_program("for x in xs:\nprint(x)\n").unwrap_err();
        assert_eq!(err.0.kind, "IndentationError");
        assert_eq!(err.0.msg, "expected an indented block");
    }

    #[test]
    /// セミコロンで区切った単純文が別々の文として並ぶことを確認する。
    fn semicolons_separate_simple_statements() {
        let prog = parse_program("x = 1; y = 2;\nif x: a = 1; b = 2\ndef f(): return; pass\n").unwrap();
        assert_eq!(prog.body.len(), 4);
        assert!(matches!(prog.body[1].kind, StmtKind::Assign { .. }));
        assert_eq!(prog.body[1].line, 1);
        match &prog.body[2].kind {
            StmtKind::If { branches, .. } => assert_eq!(branches[0].1.len(), 2),
            other => panic!("expected if, got {:?}", other),
        }
        match &prog.body[3].kind {
            StmtKind::Def(def) => assert_eq!(def.body[0].kind, StmtKind::Return(None)),
            other => panic!("expected def, got {:?}", other),
        }
        assert!(parse_program("x = 1;;").is_err());
    }
}
