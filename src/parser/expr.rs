// パス: src/parser/expr.rs
// 役割: 式の構文解析に関する `Parser` 実装をまとめる
// 意図: 優先順位ごとの下降関数と後置演算（呼び出し・添字・属性）を専用モジュールに切り分ける
// 関連ファイル: src/parser/stmt.rs, src/parser/mod.rs, src/ast.rs

use super::Parser;
use crate::ast::{BinOp, BoolOp, CmpOp, Expr, UnaryOp};
use crate::errors::ParseError;
use crate::lexer::TokenKind;

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.accept(TokenKind::OR).is_some() {
            let right = self.parse_and()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.accept(TokenKind::AND).is_some() {
            let right = self.parse_not()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.accept(TokenKind::NOT).is_some() {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.accept_cmp_op() {
            rest.push((op, self.parse_arith()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        Ok(Expr::Compare {
            first: Box::new(first),
            rest,
        })
    }

    fn accept_cmp_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek().kind {
            TokenKind::EQ => CmpOp::Eq,
            TokenKind::NE => CmpOp::Ne,
            TokenKind::LT => CmpOp::Lt,
            TokenKind::LE => CmpOp::Le,
            TokenKind::GT => CmpOp::Gt,
            TokenKind::GE => CmpOp::Ge,
            TokenKind::IN => CmpOp::In,
            TokenKind::NOT if self.peek_kind(1) == Some(TokenKind::IN) => {
                self.pop_any();
                CmpOp::NotIn
            }
            _ => return None,
        };
        self.pop_any();
        Some(op)
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::PLUS => BinOp::Add,
                TokenKind::MINUS => BinOp::Sub,
                _ => break,
            };
            self.pop_any();
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::STAR => BinOp::Mul,
                TokenKind::SLASH => BinOp::Div,
                TokenKind::DSLASH => BinOp::FloorDiv,
                TokenKind::PERCENT => BinOp::Mod,
                _ => break,
            };
            self.pop_any();
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::MINUS => UnaryOp::Neg,
            TokenKind::PLUS => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.pop_any();
        let operand = self.parse_factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `**` は右結合で、右辺に単項演算子を許す（`2 ** -1`）。
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.accept(TokenKind::DBLSTAR).is_some() {
            let exp = self.parse_factor()?;
            return Ok(binary(BinOp::Pow, base, exp));
        }
        Ok(base)
    }

    pub(super) fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.accept(TokenKind::LPAREN).is_some() {
                let args = self.parse_comma_list(TokenKind::RPAREN, "')'")?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.accept(TokenKind::LBRACK).is_some() {
                let index = self.parse_expr()?;
                self.pop(TokenKind::RBRACK, "']'")?;
                expr = Expr::Index {
                    obj: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.accept(TokenKind::DOT).is_some() {
                let name = self.pop(TokenKind::NAME, "attribute name")?.value;
                expr = Expr::Attr {
                    obj: Box::new(expr),
                    name,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::NAME => {
                self.pop_any();
                Ok(Expr::Name(tok.value))
            }
            TokenKind::INT => {
                self.pop_any();
                tok.value
                    .parse::<i64>()
                    .map(Expr::Int)
                    .map_err(|_| ParseError::at("invalid integer literal", tok.line, tok.col))
            }
            TokenKind::FLOAT => {
                self.pop_any();
                tok.value
                    .parse::<f64>()
                    .map(Expr::Float)
                    .map_err(|_| ParseError::at("invalid decimal literal", tok.line, tok.col))
            }
            TokenKind::STRING => {
                // 隣接する文字列リテラルは連結する。
                let mut s = String::new();
                while let Some(t) = self.accept(TokenKind::STRING) {
                    s.push_str(&t.value);
                }
                Ok(Expr::Str(s))
            }
            TokenKind::TRUE => {
                self.pop_any();
                Ok(Expr::Bool(true))
            }
            TokenKind::FALSE => {
                self.pop_any();
                Ok(Expr::Bool(false))
            }
            TokenKind::NONE => {
                self.pop_any();
                Ok(Expr::None)
            }
            TokenKind::LPAREN => {
                self.pop_any();
                let inner = self.parse_expr()?;
                self.pop(TokenKind::RPAREN, "')'")?;
                Ok(inner)
            }
            TokenKind::LBRACK => {
                self.pop_any();
                let items = self.parse_comma_list(TokenKind::RBRACK, "']'")?;
                Ok(Expr::List(items))
            }
            TokenKind::LBRACE => {
                self.pop_any();
                self.parse_dict_body()
            }
            _ => Err(self.invalid_syntax()),
        }
    }

    /// 閉じ括弧までのカンマ区切り式を読む（末尾カンマ可）。
    fn parse_comma_list(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(self.parse_expr()?);
            if self.accept(TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.pop(close, what)?;
        Ok(items)
    }

    fn parse_dict_body(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        while !self.at(TokenKind::RBRACE) {
            let key = self.parse_expr()?;
            self.pop(TokenKind::COLON, "':'")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if self.accept(TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.pop(TokenKind::RBRACE, "'}'")?;
        Ok(Expr::Dict(entries))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinOp, CmpOp, Expr, UnaryOp};
    use crate::parser::parse_expr;

    #[test]
    /// `**` が右結合であり単項マイナスより強いことを確認する。
    fn power_is_right_assoc_and_binds_tighter_than_neg() {
        match parse_expr("-2 ** 3 ** 2").unwrap() {
            Expr::Unary { op: UnaryOp::Neg, operand } => match *operand {
                Expr::Binary { op: BinOp::Pow, right, .. } => {
                    assert!(matches!(*right, Expr::Binary { op: BinOp::Pow, .. }));
                }
                other => panic!("unexpected: {:?}", other),
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// `not in` が 1 つの比較演算子として扱われることを検証する。
    fn not_in_is_single_operator() {
        match parse_expr("a not in b").unwrap() {
            Expr::Compare { rest, .. } => assert_eq!(rest[0].0, CmpOp::NotIn),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 連鎖比較が 1 つの Compare ノードにまとまることを確認する。
    fn chained_comparison() {
        match parse_expr("1 < x <= 3").unwrap() {
            Expr::Compare { rest, .. } => {
                assert_eq!(rest.len(), 2);
                assert_eq!(rest[1].0, CmpOp::Le);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 後置演算（呼び出し・添字・属性）の連鎖を確かめる。
    fn postfix_chain() {
        let e = parse_expr("xs[0].upper()").unwrap();
        match e {
            Expr::Call { func, args } => {
                assert!(args.is_empty());
                assert!(matches!(*func, Expr::Attr { ref name, .. } if name == "upper"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    /// 辞書・リストリテラルと末尾カンマを受け付けることを検証する。
    fn collection_literals() {
        assert_eq!(
            parse_expr("[1, 2,]").unwrap(),
            Expr::List(vec![Expr::Int(1), Expr::Int(2)])
        );
        assert_eq!(
            parse_expr("{'a': 1}").unwrap(),
            Expr::Dict(vec![(Expr::Str("a".into()), Expr::Int(1))])
        );
    }

    #[test]
    /// 式の後ろに余分なトークンがあるとエラーになることを確認する。
    fn trailing_tokens_are_rejected() {
        let err = parse_expr("1 2").unwrap_err();
        assert_eq!(err.0.msg, "invalid syntax");
        assert_eq!(err.0.col, Some(3));
    }
}
