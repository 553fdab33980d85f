// パス: src/lexer.rs
// 役割: インデント構造を持つコンソール言語の字句解析器とトークン定義を提供する
// 意図: 構文解析に必要な位置付きトークン（NEWLINE/INDENT/DEDENT を含む）を生成する
// 関連ファイル: src/parser/mod.rs, src/errors.rs, tests/lexer_parser.rs
//! 字句解析モジュール
//!
//! - 論理行ごとにインデント幅を比較し、`INDENT` / `DEDENT` を合成する。
//! - 括弧の内側では改行とインデントを無視する（暗黙の行継続）。
//! - 空行とコメントのみの行は論理行として扱わない。
//! - すべてのトークンに行・列を記録し、診断情報と連携させる。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::errors::LexerError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    EOF,
    NEWLINE,
    INDENT,
    DEDENT,
    // リテラル・識別子
    NAME,
    INT,
    FLOAT,
    STRING,
    // 演算子・記号トークン
    PLUS,
    MINUS,
    STAR,
    SLASH,
    DSLASH,
    PERCENT,
    DBLSTAR,
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
    ASSIGN,
    PLUSEQ,
    MINUSEQ,
    STAREQ,
    SLASHEQ,
    DSLASHEQ,
    PERCENTEQ,
    LPAREN,
    RPAREN,
    LBRACK,
    RBRACK,
    LBRACE,
    RBRACE,
    COMMA,
    COLON,
    SEMI,
    DOT,
    // キーワード分類
    DEF,
    RETURN,
    IF,
    ELIF,
    ELSE,
    WHILE,
    FOR,
    IN,
    BREAK,
    CONTINUE,
    PASS,
    DEL,
    IMPORT,
    ASSERT,
    GLOBAL,
    AND,
    OR,
    NOT,
    TRUE,
    FALSE,
    NONE,
}

/// 予約語とトークン種別の対応表。
static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    use TokenKind::*;
    [
        ("def", DEF),
        ("return", RETURN),
        ("if", IF),
        ("elif", ELIF),
        ("else", ELSE),
        ("while", WHILE),
        ("for", FOR),
        ("in", IN),
        ("break", BREAK),
        ("continue", CONTINUE),
        ("pass", PASS),
        ("del", DEL),
        ("import", IMPORT),
        ("assert", ASSERT),
        ("global", GLOBAL),
        ("and", AND),
        ("or", OR),
        ("not", NOT),
        ("True", TRUE),
        ("False", FALSE),
        ("None", NONE),
    ]
    .into_iter()
    .collect()
});

/// 予約語の一覧を返す（補完候補の生成に利用）。
pub fn keywords() -> impl Iterator<Item = &'static str> {
    KEYWORDS.keys().copied()
}

/// 識別子の先頭に使用可能な文字かどうかを判定する。
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
/// 識別子の後続として許容される文字か判定する。
fn is_ident_rest(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// ソース文字列をトークン列へ変換する。
pub fn lex(src: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    line: usize,
    line_start: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            line: 1,
            line_start: 0,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexerError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if self.consume_blank_line() {
                    continue;
                }
                self.measure_indent()?;
            }
            let Some(ch) = self.peek_char() else {
                break;
            };
            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance_char();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    if self.depth == 0 {
                        self.push_here(TokenKind::NEWLINE, "");
                    }
                    self.advance_char();
                    self.start_line(self.depth == 0);
                }
                '\\' => self.lex_continuation()?,
                _ => self.lex_token(ch)?,
            }
        }
        self.finish();
        Ok(self.tokens)
    }

    /// 空行・コメント行であれば改行まで読み飛ばして true を返す。
    fn consume_blank_line(&mut self) -> bool {
        let rest = &self.src[self.cursor..];
        let body = rest.trim_start_matches([' ', '\t', '\r', '\x0c']);
        let skipped = rest.len() - body.len();
        if body.is_empty() {
            // 末尾の空白だけが残っている場合は EOF とみなす。
            self.cursor += skipped;
            self.at_line_start = false;
            return false;
        }
        if body.starts_with('\n') || body.starts_with('#') {
            let newline = body.find('\n');
            match newline {
                Some(off) => {
                    self.cursor += skipped + off + 1;
                    self.start_line(true);
                }
                None => {
                    self.cursor = self.src.len();
                    self.at_line_start = false;
                }
            }
            return true;
        }
        false
    }

    /// 行頭の空白幅を測り、インデントスタックと比較して INDENT/DEDENT を生成する。
    fn measure_indent(&mut self) -> Result<(), LexerError> {
        self.at_line_start = false;
        let mut width = 0usize;
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' | '\r' => {}
                _ => break,
            }
            self.advance_char();
        }
        if self.cursor >= self.src.len() {
            return Ok(());
        }
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push_here(TokenKind::INDENT, "");
        } else if width < current {
            while self.indents.last().copied().unwrap_or(0) > width {
                self.indents.pop();
                self.push_here(TokenKind::DEDENT, "");
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.err(
                    "IndentationError",
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    fn start_line(&mut self, logical: bool) {
        self.line += 1;
        self.line_start = self.cursor;
        self.at_line_start = logical;
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn lex_continuation(&mut self) -> Result<(), LexerError> {
        let rest = &self.src[self.cursor + 1..];
        let rest = rest.strip_prefix('\r').unwrap_or(rest);
        if rest.starts_with('\n') || rest.is_empty() {
            self.cursor = self.src.len() - rest.len();
            if rest.starts_with('\n') {
                self.advance_char();
                self.start_line(false);
            }
            return Ok(());
        }
        Err(self.err(
            "SyntaxError",
            "unexpected character after line continuation character",
        ))
    }

    fn lex_token(&mut self, ch: char) -> Result<(), LexerError> {
        if self.try_operator() {
            return Ok(());
        }
        if ch == '"' || ch == '\'' {
            return self.lex_string(ch);
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek_second_char().is_some_and(|c| c.is_ascii_digit())) {
            return self.lex_number();
        }
        if is_ident_start(ch) {
            self.lex_identifier_or_keyword();
            return Ok(());
        }
        Err(self.err("SyntaxError", format!("invalid character '{}'", ch)))
    }

    fn try_operator(&mut self) -> bool {
        const OPERATORS: &[(&str, TokenKind)] = &[
            ("//=", TokenKind::DSLASHEQ),
            ("**", TokenKind::DBLSTAR),
            ("//", TokenKind::DSLASH),
            ("==", TokenKind::EQ),
            ("!=", TokenKind::NE),
            ("<=", TokenKind::LE),
            (">=", TokenKind::GE),
            ("+=", TokenKind::PLUSEQ),
            ("-=", TokenKind::MINUSEQ),
            ("*=", TokenKind::STAREQ),
            ("/=", TokenKind::SLASHEQ),
            ("%=", TokenKind::PERCENTEQ),
            ("+", TokenKind::PLUS),
            ("-", TokenKind::MINUS),
            ("*", TokenKind::STAR),
            ("/", TokenKind::SLASH),
            ("%", TokenKind::PERCENT),
            ("<", TokenKind::LT),
            (">", TokenKind::GT),
            ("=", TokenKind::ASSIGN),
            ("(", TokenKind::LPAREN),
            (")", TokenKind::RPAREN),
            ("[", TokenKind::LBRACK),
            ("]", TokenKind::RBRACK),
            ("{", TokenKind::LBRACE),
            ("}", TokenKind::RBRACE),
            (",", TokenKind::COMMA),
            (":", TokenKind::COLON),
            (";", TokenKind::SEMI),
        ];
        let rest = &self.src[self.cursor..];
        // `.5` のような数値は呼び出し元で処理するため、ここではドット単体のみを扱う。
        if rest.starts_with('.') && !rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.push_here(TokenKind::DOT, ".");
            self.cursor += 1;
            return true;
        }
        for (text, kind) in OPERATORS {
            if rest.starts_with(text) {
                match kind {
                    TokenKind::LPAREN | TokenKind::LBRACK | TokenKind::LBRACE => self.depth += 1,
                    TokenKind::RPAREN | TokenKind::RBRACK | TokenKind::RBRACE => {
                        self.depth = self.depth.saturating_sub(1)
                    }
                    _ => {}
                }
                self.push_here(*kind, text);
                self.cursor += text.len();
                return true;
            }
        }
        false
    }

    fn lex_string(&mut self, quote: char) -> Result<(), LexerError> {
        let (line, col) = self.position();
        self.advance_char(); // 開始クォート
        let mut value = String::new();
        loop {
            let Some(ch) = self.advance_char() else {
                return Err(LexerError::at_with_snippet(
                    "SyntaxError",
                    "unterminated string literal",
                    line,
                    col,
                    self.current_line_text(),
                ));
            };
            if ch == quote {
                break;
            }
            match ch {
                '\n' => {
                    return Err(LexerError::at_with_snippet(
                        "SyntaxError",
                        "unterminated string literal",
                        line,
                        col,
                        self.line_text_at(self.line_start),
                    ));
                }
                '\\' => {
                    let Some(esc) = self.advance_char() else {
                        continue;
                    };
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        'x' => value.push(self.hex_escape(2, line, col)?),
                        'u' => value.push(self.hex_escape(4, line, col)?),
                        '\n' => self.start_line(false),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                other => value.push(other),
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::STRING,
            value,
            line,
            col,
        });
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexerError> {
        let (line, col) = self.position();
        let start = self.cursor;
        let mut is_float = false;
        self.eat_digits();
        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance_char();
            self.eat_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let save = self.cursor;
            self.advance_char();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance_char();
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.eat_digits();
            } else {
                self.cursor = save;
            }
        }
        let text: String = self.src[start..self.cursor]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if is_float {
            if text.parse::<f64>().is_err() {
                return Err(LexerError::at("SyntaxError", "invalid decimal literal", line, col));
            }
            self.tokens.push(Token {
                kind: TokenKind::FLOAT,
                value: text,
                line,
                col,
            });
        } else {
            if text.parse::<i64>().is_err() {
                return Err(LexerError::at(
                    "SyntaxError",
                    "integer literal is too large",
                    line,
                    col,
                ));
            }
            self.tokens.push(Token {
                kind: TokenKind::INT,
                value: text,
                line,
                col,
            });
        }
        Ok(())
    }

    fn eat_digits(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self) {
        let (line, col) = self.position();
        let start = self.cursor;
        while let Some(ch) = self.peek_char() {
            if is_ident_rest(ch) {
                self.advance_char();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.cursor];
        let kind = KEYWORDS.get(text).copied().unwrap_or(TokenKind::NAME);
        self.tokens.push(Token {
            kind,
            value: text.to_string(),
            line,
            col,
        });
    }

    fn finish(&mut self) {
        let needs_newline = self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::NEWLINE | TokenKind::DEDENT));
        if needs_newline {
            self.push_here(TokenKind::NEWLINE, "");
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_here(TokenKind::DEDENT, "");
        }
        self.push_here(TokenKind::EOF, "");
    }

    /// `\xHH` と `\uHHHH` の 16 進数字を読み、対応する文字を返す。
    fn hex_escape(&mut self, digits: usize, line: usize, col: usize) -> Result<char, LexerError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let Some(d) = self.peek_char().and_then(|c| c.to_digit(16)) else {
                let form = if digits == 2 { "\\xXX" } else { "\\uXXXX" };
                return Err(LexerError::at_with_snippet(
                    "SyntaxError",
                    format!("truncated {} escape", form),
                    line,
                    col,
                    self.current_line_text(),
                ));
            };
            self.advance_char();
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| {
            LexerError::at_with_snippet(
                "SyntaxError",
                format!("invalid unicode escape \\u{:04x}", code),
                line,
                col,
                self.current_line_text(),
            )
        })
    }

    fn push_here(&mut self, kind: TokenKind, value: &str) {
        let (line, col) = self.position();
        self.tokens.push(Token {
            kind,
            value: value.to_string(),
            line,
            col,
        });
    }

    fn position(&self) -> (usize, usize) {
        let cursor = self.cursor.min(self.src.len());
        let col = self.src[self.line_start.min(cursor)..cursor].chars().count() + 1;
        (self.line, col)
    }

    fn current_line_text(&self) -> String {
        self.line_text_at(self.line_start)
    }

    fn line_text_at(&self, start: usize) -> String {
        let rest = &self.src[start.min(self.src.len())..];
        rest.split('\n').next().unwrap_or("").to_string()
    }

    fn err(&self, kind: &'static str, msg: impl Into<String>) -> LexerError {
        let (line, col) = self.position();
        LexerError::at_with_snippet(kind, msg, line, col, self.current_line_text())
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.cursor..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut it = self.src[self.cursor..].chars();
        it.next();
        it.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.cursor += ch.len_utf8();
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::{lex, TokenKind};

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    /// ブロック構造が INDENT / DEDENT で表現されることを確認する。
    fn indent_and_dedent_are_synthesized() {
        use TokenKind::*;
        let ks = kinds("if x:\n    y = 1\nz\n");
        assert_eq!(
            ks,
            vec![IF, NAME, COLON, NEWLINE, INDENT, NAME, ASSIGN, INT, NEWLINE, DEDENT, NAME, NEWLINE, EOF]
        );
    }

    #[test]
    /// 括弧の内側の改行が論理行を分割しないことを確かめる。
    fn newlines_inside_brackets_are_ignored() {
        use TokenKind::*;
        let ks = kinds("[1,\n  2]\n");
        assert_eq!(ks, vec![LBRACK, INT, COMMA, INT, RBRACK, NEWLINE, EOF]);
    }

    #[test]
    /// 空行とコメント行がトークンを生まないことを検証する。
    fn blank_and_comment_lines_are_skipped() {
        use TokenKind::*;
        let ks = kinds("\n# note\n   \nx # trailing\n");
        assert_eq!(ks, vec![NAME, NEWLINE, EOF]);
    }

    #[test]
    /// 閉じていないインデントが EOF で DEDENT に変換されるかを確認する。
    fn dedents_are_flushed_at_eof() {
        use TokenKind::*;
        let ks = kinds("while 1:\n  pass");
        assert_eq!(ks, vec![WHILE, INT, COLON, NEWLINE, INDENT, PASS, NEWLINE, DEDENT, EOF]);
    }

    #[test]
    /// 文字列エスケープが復号されることを確かめる。
    fn string_escapes_are_decoded() {
        let toks = lex(r#"'a\n\'b' "c\"d""#).unwrap();
        assert_eq!(toks[0].value, "a\n'b");
        assert_eq!(toks[1].value, "c\"d");
    }

    #[test]
    /// 16 進エスケープと Unicode エスケープが文字に復号されることを確認する。
    fn hex_and_unicode_escapes_are_decoded() {
        let toks = lex(r#"'\xff\x41' "\u00e9\u3042""#).unwrap();
        assert_eq!(toks[0].value, "\u{ff}A");
        assert_eq!(toks[1].value, "é\u{3042}");
        let err = lex(r#"'\x4'"#).unwrap_err();
        assert_eq!(err.0.kind, "SyntaxError");
        assert_eq!(err.0.msg, "truncated \\xXX escape");
        let err = lex(r#"'\ud800'"#).unwrap_err();
        assert_eq!(err.0.kind, "SyntaxError");
    }

    #[test]
    /// セミコロンが独立したトークンとして切り出されることを検証する。
    fn semicolon_is_a_token() {
        use TokenKind::*;
        assert_eq!(kinds("a; b;"), vec![NAME, SEMI, NAME, SEMI, NEWLINE, EOF]);
    }

    #[test]
    /// 数値リテラルの整数・浮動小数の分類を確認する。
    fn numbers_are_classified() {
        use TokenKind::*;
        assert_eq!(kinds("1 2.5 .5 1e3 1_000"), vec![INT, FLOAT, FLOAT, FLOAT, INT, NEWLINE, EOF]);
        let toks = lex("1_000").unwrap();
        assert_eq!(toks[0].value, "1000");
    }

    #[test]
    /// 不整合なインデントが IndentationError になることを検証する。
    fn inconsistent_dedent_is_rejected() {
        let err = lex("if x:\n    a\n  b\n").unwrap_err();
        assert_eq!(err.0.kind, "IndentationError");
        assert_eq!(err.0.line, Some(3));
    }

    #[test]
    /// 閉じていない文字列がスニペット付きで報告されることを確認する。
    fn unterminated_string_reports_position() {
        let err = lex("x = 'abc").unwrap_err();
        assert_eq!(err.0.msg, "unterminated string literal");
        assert_eq!(err.0.col, Some(5));
        assert_eq!(err.0.snippet.as_deref(), Some("x = 'abc"));
    }

    #[test]
    /// 行継続のバックスラッシュが NEWLINE を抑止することを確かめる。
    fn backslash_continuation_joins_lines() {
        use TokenKind::*;
        assert_eq!(kinds("1 + \\\n 2\n"), vec![INT, PLUS, INT, NEWLINE, EOF]);
    }

    #[test]
    /// 複合演算子が最長一致で切り出されることを確認する。
    fn compound_operators_use_longest_match() {
        use TokenKind::*;
        assert_eq!(
            kinds("a //= b ** c != d"),
            vec![NAME, DSLASHEQ, NAME, DBLSTAR, NAME, NE, NAME, NEWLINE, EOF]
        );
    }
}
