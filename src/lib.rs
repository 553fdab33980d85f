// パス: src/lib.rs
// 役割: クレートのルート。各モジュールの宣言と主要な型の再公開
// 意図: バイナリとテストから必要な型へ短いパスで届くようにする
// 関連ファイル: src/session.rs, src/repl/mod.rs, src/evaluator.rs
//! teeconsole ルートモジュール
//!
//! 入力された行をすべてログファイルへ書き写しながら評価する対話コンソール。
//!
//! - 言語処理: `lexer` → `parser` → `evaluator`（値は `value`、組み込みは `builtins`）
//! - 対話: `repl`（入力元・ログ記録・評価ループ）、`completer`（Tab 補完）
//! - 起動: `cli`（引数と環境変数）、`session`（ログを開いてループを回す）

pub mod ast;
pub mod builtins;
pub mod cli;
pub mod completer;
pub mod errors;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod session;
pub mod value;

pub use crate::completer::NameCompleter;
pub use crate::errors::{EvalError, LexerError, ParseError, SourceError, StartupError};
pub use crate::evaluator::{Interpreter, Signal};
pub use crate::repl::{LineSource, LoggedLineSource, ReadResult, SessionEnd};
pub use crate::session::{Session, SessionConfig};
pub use crate::value::{Namespace, Value};
