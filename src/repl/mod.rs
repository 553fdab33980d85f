// パス: src/repl/mod.rs
// 役割: 対話コンソールを構成するモジュールのファサード
// 意図: 入力元・ログ記録・評価ループ・表示を役割ごとに分け、必要な型だけを再公開する
// 関連ファイル: src/repl/cmd.rs, src/repl/logged.rs, src/session.rs
//! 対話コンソールを構成するモジュール群をまとめたファサード。
//!
//! - `cmd`: 入力元の抽象（`LineSource`）と評価ループ
//! - `logged`: 入力行をログへ書き写す `LineSource` のデコレータ
//! - `line_editor`: rustyline による行編集と標準入力からの素の読み取り
//! - `printer`: バナー・終了メッセージ・エラーの表示

pub mod cmd;
pub mod line_editor;
pub mod logged;
pub mod printer;

pub use cmd::{needs_more_input, Console, LineSource, SessionEnd, PS1, PS2};
pub use line_editor::{LineEditor, PlainLineSource, ReadResult};
pub use logged::LoggedLineSource;
