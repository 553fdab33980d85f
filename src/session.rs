// パス: src/session.rs
// 役割: ログファイル・評価環境・入力元を束ねたセッションの生成と実行
// 意図: 起動時の準備（ログを開く、args を束縛する、検索パスを設定する）を一箇所にまとめる
// 関連ファイル: src/cli.rs, src/repl/cmd.rs, src/repl/logged.rs, src/bin/teeconsole.rs
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::StartupError;
use crate::evaluator::Interpreter;
use crate::repl::cmd::{Console, LineSource, SessionEnd};
use crate::repl::logged::LoggedLineSource;
use crate::repl::printer::{banner, exit_message};
use crate::value::{Namespace, Value};

/// 引数に予約された環境上の名前。
pub const ARGS_NAME: &str = "args";

/// セッションの起動設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub log_path: PathBuf,
    pub args: Vec<String>,
    pub search_path: Vec<PathBuf>,
}

impl SessionConfig {
    pub fn new(log_path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            log_path: log_path.into(),
            args,
            search_path: vec![PathBuf::from(".")],
        }
    }
}

/// ログファイルを書き込み用に開く。既存の内容は切り詰める。
pub fn open_log(path: &Path) -> Result<File, StartupError> {
    File::create(path).map_err(|e| StartupError::log_file(path, e))
}

/// `args` と検索パスを設定したコンソールを作る。
pub fn prepare_console(mut interp: Interpreter, config: &SessionConfig) -> Console {
    let args = config.args.iter().map(|a| Value::str(a.as_str())).collect();
    interp.set_global(ARGS_NAME, Value::list(args));
    *interp.search_path_mut() = config.search_path.clone();
    Console::new(interp)
}

/// 1 回の対話セッション。入力はすべて `LoggedLineSource` を通って評価される。
pub struct Session<S, W = File> {
    console: Console,
    input: LoggedLineSource<S, W>,
    log_path: PathBuf,
}

impl<S: LineSource> Session<S, File> {
    /// 標準出力へ結果を書くインタプリタでセッションを開く。
    pub fn open<F>(config: &SessionConfig, make_source: F) -> Result<Self, StartupError>
    where
        F: FnOnce(Namespace) -> Result<S, StartupError>,
    {
        Self::open_with(config, Interpreter::new(), make_source)
    }

    /// ログを開いてから、評価環境を共有する入力元を `make_source` で組み立てる。
    pub fn open_with<F>(
        config: &SessionConfig,
        interp: Interpreter,
        make_source: F,
    ) -> Result<Self, StartupError>
    where
        F: FnOnce(Namespace) -> Result<S, StartupError>,
    {
        let log = open_log(&config.log_path)?;
        debug!(path = %config.log_path.display(), "log file opened");
        let console = prepare_console(interp, config);
        let source = make_source(console.namespace())?;
        Ok(Self::from_parts(console, source, log, config.log_path.clone()))
    }
}

impl<S: LineSource, W: Write> Session<S, W> {
    pub fn from_parts(console: Console, source: S, log: W, log_path: PathBuf) -> Self {
        Self {
            console,
            input: LoggedLineSource::new(source, log),
            log_path,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// バナーを表示して対話ループを回し、終了時にログの場所を案内する。
    pub fn run<E: Write>(&mut self, err: &mut E) -> io::Result<SessionEnd> {
        writeln!(err, "{}", banner())?;
        let end = self.console.interact(&mut self.input, err)?;
        writeln!(err, "{}", exit_message(&self.log_path))?;
        info!(
            lines = self.input.lines_logged(),
            code = end.exit_code(),
            "session finished"
        );
        Ok(end)
    }

    pub fn into_log(self) -> W {
        self.input.into_parts().1
    }
}
