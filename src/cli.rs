// パス: src/cli.rs
// 役割: コマンドライン引数と環境変数からセッション設定を組み立てる
// 意図: 起動時の設定読み込みとログ出力の初期化をバイナリから切り離してテスト可能にする
// 関連ファイル: src/session.rs, src/bin/teeconsole.rs
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::session::SessionConfig;

/// モジュール検索パスの先頭に追加するディレクトリの一覧（プラットフォームのパス区切り）。
pub const PATH_ENV: &str = "TEECONSOLE_PATH";
/// tracing のフィルタ指定。
pub const LOG_ENV: &str = "TEECONSOLE_LOG";
const DEFAULT_FILTER: &str = "warn";

/// 入力をすべてログファイルへ書き写しながら評価する対話コンソール。
#[derive(Debug, Parser)]
#[command(
    name = "teeconsole",
    version,
    about = "Interactive console that tees every input line to a log file"
)]
pub struct Cli {
    /// 入力行を書き込むログファイル（既存の内容は切り詰める）
    pub logfile: PathBuf,

    /// `args` として環境に束縛される追加の引数
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn into_config(self) -> SessionConfig {
        SessionConfig {
            log_path: self.logfile,
            args: self.args,
            search_path: search_path(env::var_os(PATH_ENV)),
        }
    }
}

/// 環境変数の値を展開し、末尾にカレントディレクトリを加えた検索パスを返す。
pub fn search_path(from_env: Option<OsString>) -> Vec<PathBuf> {
    let mut path: Vec<PathBuf> = from_env
        .map(|value| {
            env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();
    path.push(PathBuf::from("."));
    path
}

/// stderr へ書く tracing サブスクライバを登録する。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
