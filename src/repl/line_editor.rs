// パス: src/repl/line_editor.rs
// 役割: 端末向けの行編集（履歴・Tab 補完）と、非端末向けの素の行読み取り
// 意図: 入力元の実装を `LineSource` の背後に隠し、対話ループからは区別なく扱えるようにする
// 関連ファイル: src/repl/cmd.rs, src/completer.rs, src/repl/logged.rs
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use tracing::{debug, warn};

use super::cmd::LineSource;
use crate::completer::NameCompleter;
use crate::errors::StartupError;
use crate::value::Namespace;

/// 履歴ファイルの場所を上書きする環境変数。
pub const HISTORY_ENV: &str = "TEECONSOLE_HISTORY_FILE";
const HISTORY_FILE_NAME: &str = ".teeconsole_history";
const MAX_HISTORY: usize = 1000;

/// 空の位置で Tab を押したときに挿入する字下げ。
const INDENT: &str = "    ";

/// 行入力が返す 3 種類の結果を表す列挙体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Line(String),
    Eof,
    Interrupted,
}

/// rustyline に補完を提供するヘルパ。
pub struct ConsoleHelper {
    completer: NameCompleter,
}

impl ConsoleHelper {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            completer: NameCompleter::new(namespace),
        }
    }
}

/// カーソル直前の補完対象語（識別子とドット）の開始位置と内容を求める。
pub(crate) fn completion_word(line: &str, pos: usize) -> (usize, &str) {
    let head = &line[..pos];
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '.')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    (start, &head[start..])
}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, word) = completion_word(line, pos);
        if word.is_empty() {
            let indent = Pair {
                display: INDENT.to_string(),
                replacement: INDENT.to_string(),
            };
            return Ok((pos, vec![indent]));
        }
        let pairs = self
            .completer
            .candidates(word)
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;
}

impl Highlighter for ConsoleHelper {}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}

/// 履歴と Tab 補完を備えた端末用の入力元。
pub struct LineEditor {
    editor: Editor<ConsoleHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl LineEditor {
    /// 補完に使う環境を受け取り、保存済みの履歴を読み込んだエディタを構築する。
    pub fn new(namespace: Namespace) -> Result<Self, StartupError> {
        let editor_error = |e: ReadlineError| StartupError::Editor(e.to_string());
        let config = Config::builder()
            .max_history_size(MAX_HISTORY)
            .map_err(editor_error)?
            .history_ignore_dups(true)
            .map_err(editor_error)?
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ConsoleHelper, DefaultHistory> =
            Editor::with_config(config).map_err(editor_error)?;
        editor.set_helper(Some(ConsoleHelper::new(namespace)));
        let history_path = history_path();
        if let Some(path) = &history_path {
            if path.exists() {
                if let Err(err) = editor.load_history(path) {
                    debug!(path = %path.display(), error = %err, "ignoring unreadable history");
                }
            }
        }
        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadResult::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadResult::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadResult::Eof),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(other) => Err(io::Error::other(other.to_string())),
        }
    }

    fn add_history(&mut self, entry: &str) {
        if let Err(err) = self.editor.add_history_entry(entry) {
            debug!(error = %err, "history entry rejected");
        }
    }

    fn save_history(&mut self) -> io::Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.editor.save_history(path).map_err(|e| match e {
            ReadlineError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        })
    }
}

/// 端末でない入力（パイプやファイル）から 1 行ずつ読む入力元。
pub struct PlainLineSource<R, W> {
    reader: R,
    prompt_out: W,
}

impl PlainLineSource<io::StdinLock<'static>, io::Stdout> {
    /// 標準入力から読み、プロンプトを標準出力へ書く入力元。
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PlainLineSource<R, W> {
    pub fn new(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for PlainLineSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult> {
        write!(self.prompt_out, "{}", prompt)?;
        self.prompt_out.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadResult::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(ReadResult::Line(line))
    }

    fn add_history(&mut self, _entry: &str) {}

    fn save_history(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 履歴ファイルのパス。環境変数があればそれを、なければホームディレクトリ直下を使う。
pub fn history_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(HISTORY_ENV) {
        return Some(PathBuf::from(path));
    }
    let home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"));
    if home.is_none() {
        warn!("no home directory; history will not be saved");
    }
    home.map(PathBuf::from).map(|home| home.join(HISTORY_FILE_NAME))
}
