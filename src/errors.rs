//! エラー型の定義（共通フォーマット: `File "<src>", line N` + スニペット + `Kind: メッセージ`）。

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 入力元が指定されていない場合に表示するソース名。
pub const CONSOLE_SOURCE: &str = "<console>";

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub kind: &'static str,      // "NameError" などの種別名
    pub msg: String,
    pub source: Option<String>,  // ファイル名（None なら <console>）
    pub line: Option<usize>,     // 1-origin（任意）
    pub col: Option<usize>,      // 1-origin（任意）
    pub snippet: Option<String>, // エラー行のスニペット（任意）
}

impl ErrorInfo {
    pub fn new(kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            source: None,
            line: None,
            col: None,
            snippet: None,
        }
    }
    pub fn at(
        kind: &'static str,
        msg: impl Into<String>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self {
            kind,
            msg: msg.into(),
            source: None,
            line,
            col,
            snippet: None,
        }
    }
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 位置情報が未設定の場合のみ行番号とスニペットを補う。
    pub fn locate_if_missing(&mut self, line: usize, src: &str) {
        if self.line.is_some() {
            return;
        }
        self.line = Some(line);
        if self.snippet.is_none() {
            if let Some(text) = src.lines().nth(line.saturating_sub(1)) {
                self.snippet = Some(text.to_string());
            }
        }
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            let source = self.source.as_deref().unwrap_or(CONSOLE_SOURCE);
            writeln!(f, "  File \"{}\", line {}", source, line)?;
            if let Some(snippet) = &self.snippet {
                // 先頭の空白は落として表示し、キャレット位置もそれに合わせる。
                let trimmed = snippet.trim_start();
                let shift = snippet.chars().count() - trimmed.chars().count();
                writeln!(f, "    {}", trimmed)?;
                if let Some(c) = self.col {
                    let pad = c.saturating_sub(1).saturating_sub(shift);
                    writeln!(f, "    {}^", " ".repeat(pad))?;
                }
            }
        }
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexerError(pub ErrorInfo);
impl LexerError {
    pub fn at(kind: &'static str, msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self(ErrorInfo::at(kind, msg, Some(line), Some(col)))
    }
    pub fn at_with_snippet(
        kind: &'static str,
        msg: impl Into<String>,
        line: usize,
        col: usize,
        snippet: impl Into<String>,
    ) -> Self {
        Self(ErrorInfo::at(kind, msg, Some(line), Some(col)).with_snippet(snippet))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub ErrorInfo);
impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(ErrorInfo::new("SyntaxError", msg))
    }
    pub fn at(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self(ErrorInfo::at("SyntaxError", msg, Some(line), Some(col)))
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        Self(err.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalError(pub ErrorInfo);
impl EvalError {
    pub fn new(kind: &'static str, msg: impl Into<String>) -> Self {
        Self(ErrorInfo::new(kind, msg))
    }
    pub fn name(name: &str) -> Self {
        Self::new("NameError", format!("name '{}' is not defined", name))
    }
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new("TypeError", msg)
    }
    pub fn value_error(msg: impl Into<String>) -> Self {
        Self::new("ValueError", msg)
    }
    pub fn kind(&self) -> &'static str {
        self.0.kind
    }
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for LexerError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for ParseError {}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for EvalError {}

/// ソースを解析・実行したときに利用者へ報告されるエラー。
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    Syntax(ParseError),
    Eval(EvalError),
}

impl SourceError {
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SourceError::Syntax(e) => &e.0,
            SourceError::Eval(e) => &e.0,
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.info(), f)
    }
}
impl StdError for SourceError {}

impl From<ParseError> for SourceError {
    fn from(err: ParseError) -> Self {
        Self::Syntax(err)
    }
}

impl From<EvalError> for SourceError {
    fn from(err: EvalError) -> Self {
        Self::Eval(err)
    }
}

/// セッション開始前に発生する致命的なエラー種別。
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create line editor: {0}")]
    Editor(String),
}

impl StartupError {
    pub fn log_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LogFile {
            path: path.into(),
            source,
        }
    }
}
