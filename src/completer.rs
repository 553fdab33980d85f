// パス: src/completer.rs
// 役割: 評価環境の名前・キーワード・組込み関数から補完候補を列挙する
// 意図: 行エディタの Tab 補完と状態付き問い合わせ API の双方に同じ候補を供給する
// 関連ファイル: src/repl/line_editor.rs, src/value.rs, src/builtins.rs
//! 名前補完
//!
//! - `complete(text, state)` は `state == 0` で候補を作り直し、以降は同じ列を順に返す。
//! - 候補は辞書順で重複を含まない。
//! - `obj.attr` 形式はドット区切りの名前を環境から辿り、モジュールの属性か組込みメソッドを返す。
//!   補完のために式を評価することはない。

use std::collections::BTreeSet;

use crate::builtins::{builtin_names, lookup_builtin, method_names};
use crate::lexer::keywords;
use crate::value::{Namespace, Value};

pub struct NameCompleter {
    namespace: Namespace,
    matches: Vec<String>,
}

impl NameCompleter {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            matches: Vec::new(),
        }
    }

    /// `state` 番目の候補を返す。候補が尽きたら `None`。
    pub fn complete(&mut self, text: &str, state: usize) -> Option<String> {
        if state == 0 {
            self.matches = self.candidates(text);
        }
        self.matches.get(state).cloned()
    }

    /// `text` を接頭辞に持つ候補を辞書順で列挙する。
    pub fn candidates(&self, text: &str) -> Vec<String> {
        match text.rsplit_once('.') {
            Some((obj, attr)) => self.attr_matches(obj, attr),
            None => self.global_matches(text),
        }
    }

    fn global_matches(&self, text: &str) -> Vec<String> {
        let env = self.namespace.borrow();
        let names: BTreeSet<String> = keywords()
            .chain(builtin_names())
            .map(String::from)
            .chain(env.keys().cloned())
            .filter(|name| name.starts_with(text))
            .collect();
        names.into_iter().collect()
    }

    fn attr_matches(&self, obj: &str, attr: &str) -> Vec<String> {
        let Some(value) = self.resolve(obj) else {
            return Vec::new();
        };
        let names: BTreeSet<String> = match &value {
            Value::Module(m) => m.namespace.borrow().keys().cloned().collect(),
            other => method_names(other).into_iter().map(String::from).collect(),
        };
        names
            .into_iter()
            .filter(|name| name.starts_with(attr))
            .map(|name| format!("{}.{}", obj, name))
            .collect()
    }

    /// `a.b.c` のようなドット区切りの名前を環境とモジュールを辿って解決する。
    fn resolve(&self, dotted: &str) -> Option<Value> {
        let mut parts = dotted.split('.');
        let head = parts.next()?;
        let mut value = self
            .namespace
            .borrow()
            .get(head)
            .cloned()
            .or_else(|| lookup_builtin(head))?;
        for part in parts {
            let next = match &value {
                Value::Module(m) => m.namespace.borrow().get(part).cloned(),
                _ => None,
            };
            value = next?;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::NameCompleter;
    use crate::value::{new_namespace, Value};

    #[test]
    /// 一意な接頭辞で候補が 1 つだけ返り、次の状態では尽きることを確認する。
    fn unique_prefix_yields_single_match() {
        let ns = new_namespace();
        ns.borrow_mut().insert("zebra_count".into(), Value::Int(1));
        let mut c = NameCompleter::new(ns);
        assert_eq!(c.complete("zeb", 0).as_deref(), Some("zebra_count"));
        assert_eq!(c.complete("zeb", 1), None);
    }

    #[test]
    /// キーワード・組込み・利用者定義名が辞書順で混在することを検証する。
    fn candidates_merge_sources_in_sorted_order() {
        let ns = new_namespace();
        ns.borrow_mut().insert("print_all".into(), Value::None);
        let c = NameCompleter::new(ns);
        assert_eq!(c.candidates("pr"), vec!["print", "print_all"]);
        assert_eq!(c.candidates("whi"), vec!["while"]);
    }

    #[test]
    /// 組込み値の属性補完でメソッド名が返ることを確かめる。
    fn attribute_completion_lists_methods() {
        let ns = new_namespace();
        ns.borrow_mut().insert("s".into(), Value::str("abc"));
        let c = NameCompleter::new(ns);
        assert_eq!(c.candidates("s.up"), vec!["s.upper"]);
        assert!(c.candidates("missing.x").is_empty());
    }

    #[test]
    /// 環境の更新が共有ハンドル越しに補完へ反映されることを確認する。
    fn completer_observes_namespace_updates() {
        let ns = new_namespace();
        let mut c = NameCompleter::new(ns.clone());
        assert_eq!(c.complete("late", 0), None);
        ns.borrow_mut().insert("late_binding".into(), Value::Int(0));
        assert_eq!(c.complete("late", 0).as_deref(), Some("late_binding"));
    }
}
