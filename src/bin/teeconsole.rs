// パス: src/bin/teeconsole.rs
// 役割: 引数を解釈してログ付きの対話セッションを起動するエントリポイント
// 意図: 端末なら行編集付き、そうでなければ標準入力を素のまま読む
// 関連ファイル: src/cli.rs, src/session.rs
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::Parser;
use teeconsole::cli::{init_tracing, Cli};
use teeconsole::repl::{LineEditor, PlainLineSource};
use teeconsole::Session;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();
    let config = cli.into_config();
    let mut stderr = io::stderr();
    let end = if io::stdin().is_terminal() {
        Session::open(&config, LineEditor::new)?.run(&mut stderr)?
    } else {
        Session::open(&config, |_| Ok(PlainLineSource::stdin()))?.run(&mut stderr)?
    };
    Ok(ExitCode::from(end.exit_code() as u8))
}
