// パス: src/repl/printer.rs
// 役割: バナー・終了メッセージ・評価エラーの表示形式をまとめる
// 意図: 利用者へ見せる文言を一箇所に集約し、対話時の出力を統一する
// 関連ファイル: src/repl/cmd.rs, src/session.rs, src/errors.rs
use std::env;
use std::io::{self, Write};
use std::path::Path;

use crate::errors::SourceError;

/// セッション開始時に表示する 1 行。
pub fn banner() -> String {
    let exe = env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
    format!(
        "teeconsole {} Logged Console running on {}",
        env!("CARGO_PKG_VERSION"),
        exe
    )
}

/// セッション終了時に表示するログファイルの案内。
pub fn exit_message(log_path: &Path) -> String {
    format!("Logged output to {}", log_path.display())
}

/// 評価エラーを表示する。実行時エラーには見出し行を付ける。
pub fn write_error<W: Write>(w: &mut W, err: &SourceError) -> io::Result<()> {
    if matches!(err, SourceError::Eval(_)) && err.info().line.is_some() {
        writeln!(w, "Traceback (most recent call last):")?;
    }
    writeln!(w, "{}", err)
}
