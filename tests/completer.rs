// パス: tests/completer.rs
// 役割: 評価器と共有した環境に対する補完候補の生成を検証する
// 意図: 実行で束縛された名前・import したモジュール・組込みメソッドが候補に現れることを保証する
// 関連ファイル: src/completer.rs, src/evaluator.rs, tests/test_support.rs
#[path = "test_support.rs"]
mod support;

use std::fs;

use support::interpreter;
use teeconsole::NameCompleter;

#[test]
/// import したモジュールの属性がドット付きで補完されることを確認する。
fn module_attributes_complete_with_prefix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("geo.tee"), "def area(r):\n    return r * r\narity = 1\n").unwrap();
    let (mut interp, _) = interpreter();
    interp.search_path_mut().push(dir.path().to_path_buf());
    interp.run_source("import geo\n").unwrap();
    let completer = NameCompleter::new(interp.namespace());
    assert_eq!(completer.candidates("geo.ar"), vec!["geo.area", "geo.arity"]);
    assert_eq!(completer.candidates("geo.are"), vec!["geo.area"]);
    assert!(completer.candidates("geo.zz").is_empty());
}

#[test]
/// 辞書とリストの値にはそれぞれのメソッドが候補として返ることを検証する。
fn builtin_values_offer_their_methods() {
    let (mut interp, _) = interpreter();
    interp.run_source("d = {'k': 1}\nitems = [1]\n").unwrap();
    let completer = NameCompleter::new(interp.namespace());
    assert_eq!(completer.candidates("d."), vec!["d.get", "d.keys", "d.values"]);
    assert_eq!(completer.candidates("items."), vec!["items.append", "items.pop"]);
}

#[test]
/// 状態番号を進めると候補が順に返り、最後に None になることを確かめる。
fn state_walks_through_candidates() {
    let (mut interp, _) = interpreter();
    interp.run_source("total_a = 1\ntotal_b = 2\n").unwrap();
    let mut completer = NameCompleter::new(interp.namespace());
    assert_eq!(completer.complete("total_", 0).as_deref(), Some("total_a"));
    assert_eq!(completer.complete("total_", 1).as_deref(), Some("total_b"));
    assert_eq!(completer.complete("total_", 2), None);
}
