// パス: src/repl/logged.rs
// 役割: 読み取った入力行をそのままログへ書き写す `LineSource` のデコレータ
// 意図: 入力元の種類に関わらず、評価前に 1 行ずつ確実にログへ残す
// 関連ファイル: src/repl/cmd.rs, src/repl/line_editor.rs, src/session.rs
use std::io::{self, Write};

use tracing::trace;

use super::cmd::LineSource;
use super::line_editor::ReadResult;

/// 内側の入力元が返した各行を `log` に追記してから呼び出し側へ返す。
///
/// 行は改行を付けて書き込み、毎回フラッシュする。入力終端と割り込みは記録せずに素通しする。
pub struct LoggedLineSource<S, W> {
    inner: S,
    log: W,
    lines: usize,
}

impl<S: LineSource, W: Write> LoggedLineSource<S, W> {
    pub fn new(inner: S, log: W) -> Self {
        Self {
            inner,
            log,
            lines: 0,
        }
    }

    /// これまでにログへ書き込んだ行数。
    pub fn lines_logged(&self) -> usize {
        self.lines
    }

    pub fn log(&self) -> &W {
        &self.log
    }

    pub fn into_parts(self) -> (S, W) {
        (self.inner, self.log)
    }
}

impl<S: LineSource, W: Write> LineSource for LoggedLineSource<S, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult> {
        let result = self.inner.read_line(prompt)?;
        if let ReadResult::Line(line) = &result {
            self.log.write_all(line.as_bytes())?;
            self.log.write_all(b"\n")?;
            self.log.flush()?;
            self.lines += 1;
            trace!(lines = self.lines, "logged input line");
        }
        Ok(result)
    }

    fn add_history(&mut self, entry: &str) {
        self.inner.add_history(entry);
    }

    fn save_history(&mut self) -> io::Result<()> {
        self.inner.save_history()
    }
}
