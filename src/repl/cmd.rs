// パス: src/repl/cmd.rs
// 役割: 入力元の抽象と、行を文へ束ねて評価する対話ループ
// 意図: 入力の取得方法（端末・標準入力・ログ付き）をループから切り離して差し替え可能にする
// 関連ファイル: src/repl/logged.rs, src/repl/line_editor.rs, src/evaluator.rs
//! 対話ループ
//!
//! 入力元から 1 行ずつ受け取り、複合文が閉じるまでバッファに溜めてから評価する。
//! 評価中のエラーは表示するだけでセッションは継続し、`exit()`・入力終端・割り込みで終了する。

use std::io::{self, Write};
use std::mem;

use tracing::{debug, error, warn};

use super::line_editor::ReadResult;
use super::printer::write_error;
use crate::evaluator::{Interpreter, Signal};
use crate::value::{Namespace, Value};

/// 一次プロンプト。
pub const PS1: &str = ">>> ";
/// 継続行のプロンプト。
pub const PS2: &str = "... ";

/// プロンプトを受け取り 1 行を返す入力元。
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult>;
    fn add_history(&mut self, entry: &str);
    fn save_history(&mut self) -> io::Result<()>;
}

/// 対話ループが終わった理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Eof,
    Interrupted,
    Exit(i32),
    /// 入力元（ログ書き込みを含む）が I/O エラーを返した。
    InputError,
}

impl SessionEnd {
    pub fn exit_code(self) -> i32 {
        match self {
            SessionEnd::Eof | SessionEnd::Interrupted => 0,
            SessionEnd::Exit(code) => code,
            SessionEnd::InputError => 1,
        }
    }
}

/// 永続する評価環境を抱えた対話コンソール。
pub struct Console {
    interp: Interpreter,
}

impl Console {
    pub fn new(interp: Interpreter) -> Self {
        Self { interp }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    pub fn namespace(&self) -> Namespace {
        self.interp.namespace()
    }

    /// 環境に文字列が束縛されていればそれを、なければ既定値をプロンプトにする。
    fn prompt(&self, name: &str, default: &str) -> String {
        match self.interp.get_global(name) {
            Some(Value::Str(s)) => s,
            _ => default.to_string(),
        }
    }

    /// 完結した入力を 1 件評価する。`exit()` が呼ばれた場合は終了コードを返す。
    pub fn push_source<E: Write>(&mut self, src: &str, err: &mut E) -> io::Result<Option<i32>> {
        match self.interp.run_interactive(src) {
            Ok(()) => Ok(None),
            Err(Signal::Exit(code)) => {
                debug!(code, "exit requested");
                Ok(Some(code))
            }
            Err(Signal::Error(e)) => {
                debug!(kind = e.info().kind, "evaluation failed");
                write_error(err, &e)?;
                Ok(None)
            }
        }
    }

    /// 入力元が尽きるか終了が要求されるまで読み取りと評価を繰り返す。
    pub fn interact<S, E>(&mut self, source: &mut S, err: &mut E) -> io::Result<SessionEnd>
    where
        S: LineSource,
        E: Write,
    {
        let mut buffer: Vec<String> = Vec::new();
        let end = loop {
            let prompt = if buffer.is_empty() {
                self.prompt("ps1", PS1)
            } else {
                self.prompt("ps2", PS2)
            };
            match source.read_line(&prompt) {
                Ok(ReadResult::Line(line)) => {
                    if !line.trim().is_empty() {
                        source.add_history(&line);
                    }
                    buffer.push(line);
                    if starts_new_statement(&buffer) {
                        // 直前までの複合文を先に評価し、最後の行から新しい入力を始める。
                        let next = buffer.split_off(buffer.len() - 1);
                        let block = mem::replace(&mut buffer, next).join("\n");
                        if let Some(code) = self.push_source(&block, err)? {
                            break SessionEnd::Exit(code);
                        }
                    }
                    let src = buffer.join("\n");
                    if needs_more_input(&src) {
                        continue;
                    }
                    buffer.clear();
                    if let Some(code) = self.push_source(&src, err)? {
                        break SessionEnd::Exit(code);
                    }
                }
                Ok(ReadResult::Eof) => {
                    writeln!(err)?;
                    break SessionEnd::Eof;
                }
                Ok(ReadResult::Interrupted) => {
                    writeln!(err, "\nKeyboardInterrupt")?;
                    break SessionEnd::Interrupted;
                }
                Err(e) => {
                    error!(error = %e, "reading input failed");
                    writeln!(err, "input error: {}", e)?;
                    break SessionEnd::InputError;
                }
            }
        };
        if let Err(e) = source.save_history() {
            warn!(error = %e, "saving history failed");
            writeln!(err, "warning: failed to save history: {}", e)?;
        }
        Ok(end)
    }
}

/// 1 物理行を走査した結果。
struct LineScan {
    depth: i32,
    last: Option<char>,
}

/// 括弧の深さを引き継ぎつつ、文字列とコメントを除いた末尾の有効文字を求める。
fn scan_line(line: &str, mut depth: i32) -> LineScan {
    let mut last = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
                last = Some(ch);
            }
            continue;
        }
        match ch {
            '#' => break,
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        if !ch.is_whitespace() {
            last = Some(ch);
        }
    }
    LineScan { depth, last }
}

/// 行頭の識別子（字下げは読み飛ばす）。
fn first_word(line: &str) -> &str {
    let line = line.trim_start();
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    &line[..end]
}

fn starts_compound(src: &str) -> bool {
    let Some(first) = src.lines().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    matches!(first_word(first), "if" | "while" | "for" | "def")
}

/// 複合文の本体に続いて、字下げのない新しい文が最後の行で始まったかを判定する。
///
/// `elif` / `else` は同じ複合文の続きとして扱う。括弧の内側とバックスラッシュ継続の直後は対象外。
pub fn starts_new_statement<L: AsRef<str>>(lines: &[L]) -> bool {
    let Some((last, body)) = lines.split_last() else {
        return false;
    };
    let last = last.as_ref();
    if body.is_empty() || last.trim().is_empty() || last.starts_with(char::is_whitespace) {
        return false;
    }
    let mut depth = 0;
    let mut tail = None;
    let mut block_opened = false;
    for line in body {
        let scan = scan_line(line.as_ref(), depth);
        depth = scan.depth;
        tail = scan.last;
        if depth <= 0 && tail == Some(':') {
            block_opened = true;
        }
    }
    if depth > 0 || tail == Some('\\') {
        return false;
    }
    if !block_opened && !starts_compound(body[0].as_ref()) {
        return false;
    }
    !matches!(first_word(last), "elif" | "else")
}

/// バッファがまだ追加の行を必要としているかを判定する。
///
/// 括弧が閉じていない場合と行末がバックスラッシュの場合は継続する。
/// 複合文は空行か、字下げのない次の文が入力されるまで継続する。
pub fn needs_more_input(src: &str) -> bool {
    let mut depth = 0;
    let mut last = None;
    let mut block_opened = false;
    for line in src.split('\n') {
        let scan = scan_line(line, depth);
        depth = scan.depth;
        last = scan.last;
        if depth <= 0 && last == Some(':') {
            block_opened = true;
        }
    }
    if depth > 0 || last == Some('\\') {
        return true;
    }
    let lines: Vec<&str> = src.split('\n').collect();
    let last_line = lines.last().copied().unwrap_or("");
    if last_line.trim().is_empty() || starts_new_statement(&lines) {
        return false;
    }
    block_opened || starts_compound(src)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{self, Write};
    use std::rc::Rc;

    use super::{needs_more_input, starts_new_statement, Console, LineSource, SessionEnd};
    use crate::evaluator::Interpreter;
    use crate::repl::line_editor::ReadResult;
    use crate::value::Value;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    enum ScriptEvent {
        Line(&'static str),
        Interrupt,
    }

    struct ScriptedLineSource {
        events: VecDeque<ScriptEvent>,
        prompts: Vec<String>,
        history: Vec<String>,
        saved: bool,
    }

    impl ScriptedLineSource {
        fn new(events: impl IntoIterator<Item = ScriptEvent>) -> Self {
            Self {
                events: events.into_iter().collect(),
                prompts: Vec::new(),
                history: Vec::new(),
                saved: false,
            }
        }

        fn lines(lines: &[&'static str]) -> Self {
            Self::new(lines.iter().map(|l| ScriptEvent::Line(*l)))
        }
    }

    impl LineSource for ScriptedLineSource {
        fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult> {
            self.prompts.push(prompt.to_string());
            match self.events.pop_front() {
                Some(ScriptEvent::Line(s)) => Ok(ReadResult::Line(s.to_string())),
                Some(ScriptEvent::Interrupt) => Ok(ReadResult::Interrupted),
                None => Ok(ReadResult::Eof),
            }
        }

        fn add_history(&mut self, entry: &str) {
            self.history.push(entry.to_string());
        }

        fn save_history(&mut self) -> io::Result<()> {
            self.saved = true;
            Ok(())
        }
    }

    fn console() -> (Console, SharedBuf) {
        let out = SharedBuf::default();
        let interp = Interpreter::with_output(Box::new(out.clone()));
        (Console::new(interp), out)
    }

    #[test]
    /// 未閉じの括弧とバックスラッシュ継続で追加入力を要求することを確認する。
    fn needs_more_input_for_open_brackets_and_backslash() {
        assert!(needs_more_input("(1 + 2"));
        assert!(!needs_more_input("(1 + 2)"));
        assert!(needs_more_input("{'a': 1,"));
        assert!(needs_more_input("x = 1 + \\"));
        assert!(!needs_more_input("'unterminated"));
    }

    #[test]
    /// 複合文が空行まで継続されることを検証する。
    fn needs_more_input_until_blank_line_after_block() {
        assert!(needs_more_input("if x:"));
        assert!(needs_more_input("if x:\n    y = 1"));
        assert!(!needs_more_input("if x:\n    y = 1\n"));
        assert!(needs_more_input("while x: x -= 1"));
        assert!(!needs_more_input("x = {'a': 1}"));
        // 文字列やコメント中のコロンは無視する。
        assert!(!needs_more_input("s = 'a:'"));
        assert!(!needs_more_input("x = 1  # note:"));
        assert!(!needs_more_input(""));
    }

    #[test]
    /// 式文の結果が表示され、`_` に束縛されることを確かめる。
    fn expression_results_are_echoed_and_bound() {
        let (mut console, out) = console();
        let mut src = ScriptedLineSource::lines(&["1 + 2", "x = 5", "_ * 2", "None"]);
        let mut err: Vec<u8> = Vec::new();
        let end = console.interact(&mut src, &mut err).unwrap();
        assert_eq!(end, SessionEnd::Eof);
        assert_eq!(out.text(), "3\n6\n");
        assert_eq!(console.interpreter().get_global("_"), Some(Value::Int(6)));
        assert!(src.saved);
    }

    #[test]
    /// 複合文の継続行で二次プロンプトが使われることを確認する。
    fn continuation_lines_use_secondary_prompt() {
        let (mut console, out) = console();
        let mut src = ScriptedLineSource::lines(&["for i in range(3):", "    print(i)", ""]);
        let mut err: Vec<u8> = Vec::new();
        console.interact(&mut src, &mut err).unwrap();
        assert_eq!(out.text(), "0\n1\n2\n");
        assert_eq!(src.prompts, vec![">>> ", "... ", "... ", ">>> "]);
        assert_eq!(src.history, vec!["for i in range(3):", "    print(i)"]);
    }

    #[test]
    /// 実行時エラーの後もセッションが継続することを検証する。
    fn runtime_error_does_not_end_session() {
        let (mut console, out) = console();
        let mut src = ScriptedLineSource::lines(&["1 / 0", "print('still here')"]);
        let mut err: Vec<u8> = Vec::new();
        let end = console.interact(&mut src, &mut err).unwrap();
        assert_eq!(end, SessionEnd::Eof);
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("ZeroDivisionError: division by zero"));
        assert!(err.contains("File \"<console>\", line 1"));
        assert_eq!(out.text(), "still here\n");
    }

    #[test]
    /// exit() が終了コードを伴ってループを抜けることを確認する。
    fn exit_call_ends_loop_with_code() {
        let (mut console, out) = console();
        let mut src = ScriptedLineSource::lines(&["exit(4)", "print('unreachable')"]);
        let end = console.interact(&mut src, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(end, SessionEnd::Exit(4));
        assert_eq!(end.exit_code(), 4);
        assert_eq!(out.text(), "");
    }

    #[test]
    /// 割り込みが正常終了として扱われることを確かめる。
    fn interrupt_terminates_cleanly() {
        let (mut console, _) = console();
        let mut src = ScriptedLineSource::new([ScriptEvent::Line("x = 1"), ScriptEvent::Interrupt]);
        let end = console.interact(&mut src, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(end, SessionEnd::Interrupted);
        assert_eq!(end.exit_code(), 0);
    }

    #[test]
    /// 環境の ps1 / ps2 がプロンプトを上書きすることを検証する。
    fn prompts_follow_ps1_binding() {
        let (mut console, _) = console();
        let mut src = ScriptedLineSource::lines(&["ps1 = 'tee> '", "1"]);
        console.interact(&mut src, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(src.prompts, vec![">>> ", "tee> ", "tee> "]);
    }

    #[test]
    /// 複合文の後の字下げなしの行で入力が区切られ、以降の行も個別に評価されることを確認する。
    fn dedented_line_after_block_starts_new_input() {
        let (mut console, out) = console();
        let mut src =
            ScriptedLineSource::lines(&["def f():", "    return 1", "g()", "print('next')", ""]);
        let mut err: Vec<u8> = Vec::new();
        let end = console.interact(&mut src, &mut err).unwrap();
        assert_eq!(end, SessionEnd::Eof);
        assert_eq!(src.prompts, vec![">>> ", "... ", "... ", ">>> ", ">>> ", ">>> "]);
        assert_eq!(out.text(), "next\n");
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("NameError: name 'g' is not defined"));
        assert!(matches!(console.interpreter().get_global("f"), Some(Value::Function(_))));
    }

    #[test]
    /// 区切られた行が新しい複合文を開く場合は継続入力として扱うことを検証する。
    fn dedented_block_opener_continues_as_new_block() {
        let (mut console, out) = console();
        let mut src = ScriptedLineSource::lines(&[
            "def f():",
            "    return 1",
            "for i in range(2):",
            "    print(f() + i)",
            "",
        ]);
        console.interact(&mut src, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(out.text(), "1\n2\n");
        assert_eq!(src.prompts, vec![">>> ", "... ", "... ", "... ", "... ", ">>> "]);
    }

    #[test]
    /// 字下げのない行の判定が elif / else と括弧の内側を除外することを確かめる。
    fn new_statement_detection_respects_continuations() {
        assert!(!needs_more_input("def f():\n    return 1\nf()"));
        assert!(starts_new_statement(&["def f():", "    return 1", "f()"]));
        assert!(!starts_new_statement(&["if x:", "    y = 1", "else:"]));
        assert!(needs_more_input("if x:\n    y = 1\nelse:"));
        assert!(!starts_new_statement(&["if x:", "    y = (1,", "2)"]));
        assert!(!starts_new_statement(&["x = 1", "y"]));
        assert!(!starts_new_statement(&["if x:"]));
    }
}
