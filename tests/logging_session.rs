// パス: tests/logging_session.rs
// 役割: ログファイルへの書き写しとセッションの起動・終了を実ファイルで検証する
// 意図: 入力行が評価結果に関係なく順にちょうど 1 回記録されることを保証する
// 関連ファイル: src/session.rs, src/repl/logged.rs, tests/test_support.rs
#[path = "test_support.rs"]
mod support;

use std::fs;

use support::{interpreter, ScriptedSource, SharedBuf};
use teeconsole::completer::NameCompleter;
use teeconsole::repl::SessionEnd;
use teeconsole::{Session, SessionConfig, StartupError, Value};

fn run_session(config: &SessionConfig, lines: &[&str]) -> (SessionEnd, SharedBuf, String) {
    let (interp, out) = interpreter();
    let source = ScriptedSource::lines(lines);
    let mut session = Session::open_with(config, interp, |_| Ok(source)).unwrap();
    let mut err: Vec<u8> = Vec::new();
    let end = session.run(&mut err).unwrap();
    (end, out, String::from_utf8(err).unwrap())
}

#[test]
/// 評価の成否に関わらず、全行が改行付きで順に記録されることを確認する。
fn log_contains_every_line_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("out.log");
    let config = SessionConfig::new(&log, Vec::new());
    let lines = ["x = 1", "x +", "undefined_name", "print(x)"];
    let (end, out, err) = run_session(&config, &lines);
    assert_eq!(end, SessionEnd::Eof);
    assert_eq!(fs::read_to_string(&log).unwrap(), "x = 1\nx +\nundefined_name\nprint(x)\n");
    assert_eq!(out.text(), "1\n");
    assert!(err.contains("SyntaxError"));
    assert!(err.contains("NameError: name 'undefined_name' is not defined"));
}

#[test]
/// 複合文は完結するまで評価されないが、各物理行は 1 回ずつ記録されることを検証する。
fn compound_statement_lines_are_logged_individually() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("def.log");
    let config = SessionConfig::new(&log, Vec::new());
    let lines = ["def double(n):", "    return n * 2", "", "double(21)"];
    let (_, out, _) = run_session(&config, &lines);
    assert_eq!(out.text(), "42\n");
    assert_eq!(
        fs::read_to_string(&log).unwrap(),
        "def double(n):\n    return n * 2\n\ndouble(21)\n"
    );
}

#[test]
/// 既存のログは切り詰められ、追加引数が `args` に束縛されることを確かめる。
fn existing_log_is_truncated_and_args_are_bound() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("old.log");
    fs::write(&log, "stale content\nfrom an earlier run\n").unwrap();
    let config = SessionConfig::new(&log, vec!["a".to_string(), "b".to_string()]);
    let (end, out, _) = run_session(&config, &["args", "len(args)"]);
    assert_eq!(end, SessionEnd::Eof);
    assert_eq!(out.text(), "['a', 'b']\n2\n");
    assert_eq!(fs::read_to_string(&log).unwrap(), "args\nlen(args)\n");
}

#[test]
/// 実行時エラーの後も次のプロンプトが表示され、問題の行は既に記録されていることを確認する。
fn runtime_error_keeps_session_alive() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("err.log");
    let config = SessionConfig::new(&log, Vec::new());
    let (interp, out) = interpreter();
    let source = ScriptedSource::lines(&["1 / 0", "print('after')"]);
    let mut session = Session::open_with(&config, interp, |_| Ok(source)).unwrap();
    let mut err: Vec<u8> = Vec::new();
    session.run(&mut err).unwrap();
    let err = String::from_utf8(err).unwrap();
    assert!(err.contains("Traceback (most recent call last):"));
    assert!(err.contains("ZeroDivisionError: division by zero"));
    assert_eq!(out.text(), "after\n");
    assert_eq!(fs::read_to_string(&log).unwrap(), "1 / 0\nprint('after')\n");
}

#[test]
/// exit() の後の行は読まれず、終了コードとログの案内が残ることを検証する。
fn exit_stops_reading_and_reports_log_path() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("exit.log");
    let config = SessionConfig::new(&log, Vec::new());
    let (end, out, err) = run_session(&config, &["exit(3)", "print('never')"]);
    assert_eq!(end, SessionEnd::Exit(3));
    assert_eq!(end.exit_code(), 3);
    assert_eq!(out.text(), "");
    assert_eq!(fs::read_to_string(&log).unwrap(), "exit(3)\n");
    assert!(err.trim_end().ends_with(&format!("Logged output to {}", log.display())));
}

#[test]
/// 割り込みは終了コード 0 で終わり、割り込み自体は記録されないことを確かめる。
fn interrupt_ends_session_without_logging() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("int.log");
    let config = SessionConfig::new(&log, Vec::new());
    let (interp, _) = interpreter();
    let source = ScriptedSource::lines(&["y = 2"]).then_interrupt();
    let mut session = Session::open_with(&config, interp, |_| Ok(source)).unwrap();
    let end = session.run(&mut Vec::<u8>::new()).unwrap();
    assert_eq!(end, SessionEnd::Interrupted);
    assert_eq!(end.exit_code(), 0);
    assert_eq!(fs::read_to_string(&log).unwrap(), "y = 2\n");
    assert_eq!(session.console().interpreter().get_global("y"), Some(Value::Int(2)));
}

#[test]
/// 開けないログパスは起動エラーになり、入力元は作られないことを検証する。
fn unopenable_log_is_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("missing").join("out.log");
    let config = SessionConfig::new(&log, Vec::new());
    let (interp, _) = interpreter();
    let mut built = false;
    let result = Session::open_with(&config, interp, |_| {
        built = true;
        Ok(ScriptedSource::lines(&[]))
    });
    match result {
        Err(StartupError::LogFile { path, .. }) => assert_eq!(path, log),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("opening a log in a missing directory should fail"),
    }
    assert!(!built);
}

#[test]
/// 入力元へ渡される環境を補完器が共有し、セッション中の束縛が候補に現れることを確認する。
fn completer_shares_session_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(dir.path().join("c.log"), vec!["z".to_string()]);
    let (interp, _) = interpreter();
    let mut shared = None;
    let source = ScriptedSource::lines(&["zebra_count = 3"]);
    let mut session = Session::open_with(&config, interp, |ns| {
        shared = Some(ns);
        Ok(source)
    })
    .unwrap();
    let mut completer = NameCompleter::new(shared.unwrap());
    assert_eq!(completer.complete("ar", 0), Some("args".to_string()));
    assert_eq!(completer.complete("ar", 1), None);
    session.run(&mut Vec::<u8>::new()).unwrap();
    assert_eq!(completer.complete("zeb", 0), Some("zebra_count".to_string()));
    assert_eq!(completer.complete("zeb", 1), None);
}

#[test]
/// 空行なしで複合文の後に続けた文も評価され、全行が記録されることを検証する。
fn statement_after_block_without_blank_line_runs() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("dedent.log");
    let config = SessionConfig::new(&log, Vec::new());
    let lines = ["def f():", "    return 1", "g()", "print('next'); print(f())", ""];
    let (end, out, err) = run_session(&config, &lines);
    assert_eq!(end, SessionEnd::Eof);
    assert_eq!(out.text(), "next\n1\n");
    assert!(err.contains("NameError: name 'g' is not defined"));
    assert_eq!(
        fs::read_to_string(&log).unwrap(),
        "def f():\n    return 1\ng()\nprint('next'); print(f())\n\n"
    );
}
