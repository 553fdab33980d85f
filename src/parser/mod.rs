// パス: src/parser/mod.rs
// 役割: トークン列から AST を生成する再帰下降パーサのエントリポイント
// 意図: 字句解析結果を評価器に渡すためのモジュール構成を整理する
// 関連ファイル: src/parser/stmt.rs, src/parser/expr.rs, src/lexer.rs
//! 構文解析モジュール
//!
//! - 文（`stmt`）と式（`expr`）の解析をサブモジュールに分割する。
//! - 演算子の優先順位は `or < and < not < 比較 < 加減 < 乗除 < 単項 < ** < 後置` とする。
//! - エラーには発生行のスニペットを添付し、REPL 上でキャレット表示できるようにする。

use crate::ast::{Expr, Program};
use crate::errors::ParseError;
use crate::lexer::{lex, Token, TokenKind};

mod expr;
mod stmt;

pub struct Parser {
    ts: Vec<Token>,
    i: usize,
    loop_depth: usize,
    func_depth: usize,
}

impl Parser {
    /// トークン列から新しいパーサインスタンスを構築する。
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            ts: tokens,
            i: 0,
            loop_depth: 0,
            func_depth: 0,
        }
    }

    pub(super) fn peek(&self) -> &Token {
        // lex は必ず EOF で終端するため、末尾を超えた参照は EOF に丸める。
        let idx = self.i.min(self.ts.len().saturating_sub(1));
        &self.ts[idx]
    }

    pub(super) fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.ts.get(self.i + offset).map(|t| t.kind)
    }

    pub(super) fn pop_any(&mut self) -> Token {
        let t = self.peek().clone();
        if self.i < self.ts.len() {
            self.i += 1;
        }
        t
    }

    pub(super) fn pop(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek().kind != kind {
            return Err(self.error_here(format!("expected {}", what)));
        }
        Ok(self.pop_any())
    }

    pub(super) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.pop_any())
        } else {
            None
        }
    }

    pub(super) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// 現在のトークン位置を指す構文エラーを作る。
    pub(super) fn error_here(&self, msg: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError::at(msg, t.line, t.col)
    }

    pub(super) fn invalid_syntax(&self) -> ParseError {
        let t = self.peek();
        if t.kind == TokenKind::INDENT {
            let mut err = ParseError::at("unexpected indent", t.line, t.col);
            err.0.kind = "IndentationError";
            return err;
        }
        self.error_here("invalid syntax")
    }
}

/// 位置情報に対応するソース行をスニペットとして添付する。
fn attach_snippet(mut err: ParseError, src: &str) -> ParseError {
    if err.0.snippet.is_none() {
        if let Some(line) = err.0.line {
            if let Some(text) = src.lines().nth(line.saturating_sub(1)) {
                err.0.snippet = Some(text.to_string());
            }
        }
    }
    err
}

/// ソース全体を文の列として解析する。
pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let ts = lex(src).map_err(ParseError::from)?;
    Parser::new(ts)
        .parse_program()
        .map_err(|e| attach_snippet(e, src))
}

/// 単一の式を解析する（末尾の NEWLINE は許容する）。
pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let ts = lex(src).map_err(ParseError::from)?;
    let mut p = Parser::new(ts);
    let e = p.parse_expr().map_err(|e| attach_snippet(e, src))?;
    p.accept(TokenKind::NEWLINE);
    if !p.at(TokenKind::EOF) {
        return Err(attach_snippet(p.invalid_syntax(), src));
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::{parse_expr, parse_program};
    use crate::ast::{BinOp, Expr, StmtKind};

    #[test]
    /// 乗算が加算より強く結合することを確認する。
    fn precedence_mul_over_add() {
        let e = parse_expr("1 + 2 * 3").unwrap();
        match e {
            Expr::Binary { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 構文エラーにスニペットと行番号が添付されることを検証する。
    fn syntax_error_carries_snippet() {
        let err = parse_program("x = 1\ny = = 2\n").unwrap_err();
        assert_eq!(err.0.kind, "SyntaxError");
        assert_eq!(err.0.line, Some(2));
        assert_eq!(err.0.snippet.as_deref(), Some("y = = 2"));
    }

    #[test]
    /// 先頭の余計なインデントが IndentationError になることを確認する。
    fn leading_indent_is_indentation_error() {
        let err = parse_program("  x = 1\n").unwrap_err();
        assert_eq!(err.0.kind, "IndentationError");
        assert_eq!(err.0.msg, "unexpected indent");
    }

    #[test]
    /// 文の開始行が AST に記録されることを確かめる。
    fn statements_record_start_line() {
        let prog = parse_program("a = 1\n\nif a:\n    b = 2\n").unwrap();
        assert_eq!(prog.body.len(), 2);
        assert_eq!(prog.body[0].line, 1);
        assert_eq!(prog.body[1].line, 3);
        match &prog.body[1].kind {
            StmtKind::If { branches, .. } => assert_eq!(branches[0].1[0].line, 4),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
