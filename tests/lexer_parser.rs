// パス: tests/lexer_parser.rs
// 役割: 字句解析と構文解析の結合動作を検証する
// 意図: 演算子の優先順位・インデント構造・構文エラーの位置が回帰しないようにする
// 関連ファイル: src/lexer.rs, src/parser/mod.rs, src/parser/expr.rs, src/parser/stmt.rs
use teeconsole::ast::{BinOp, Expr, StmtKind, UnaryOp};
use teeconsole::lexer::keywords;
use teeconsole::parser::{parse_expr, parse_program};

fn int(n: i64) -> Box<Expr> {
    Box::new(Expr::Int(n))
}

#[test]
/// 乗算が加算より強く結合することを確認する。
fn multiplication_binds_tighter_than_addition() {
    let e = parse_expr("1 + 2 * 3").unwrap();
    assert_eq!(
        e,
        Expr::Binary {
            op: BinOp::Add,
            left: int(1),
            right: Box::new(Expr::Binary {
                op: BinOp::Mul,
                left: int(2),
                right: int(3),
            }),
        }
    );
}

#[test]
/// べき乗が右結合で、単項マイナスより強く結合することを検証する。
fn power_is_right_associative() {
    let e = parse_expr("2 ** 3 ** 2").unwrap();
    assert_eq!(
        e,
        Expr::Binary {
            op: BinOp::Pow,
            left: int(2),
            right: Box::new(Expr::Binary {
                op: BinOp::Pow,
                left: int(3),
                right: int(2),
            }),
        }
    );
    let e = parse_expr("-2 ** 2").unwrap();
    assert!(matches!(e, Expr::Unary { op: UnaryOp::Neg, .. }));
}

#[test]
/// 関数定義の本体が文の列として解析され、行番号が保たれることを確かめる。
fn def_body_is_parsed_with_lines() {
    let program = parse_program("x = 1\n\ndef f(a, b):\n    y = a\n    return y + b\n").unwrap();
    assert_eq!(program.body.len(), 2);
    assert_eq!(program.body[1].line, 3);
    match &program.body[1].kind {
        StmtKind::Def(def) => {
            assert_eq!(def.name, "f");
            assert_eq!(def.params, vec!["a", "b"]);
            assert_eq!(def.body.len(), 2);
            assert_eq!(def.body[1].line, 5);
        }
        other => panic!("expected def, got {:?}", other),
    }
}

#[test]
/// 構文エラーが行番号・列・スニペットを持つことを確認する。
fn syntax_error_carries_location() {
    let err = parse_program("a = 1\nb = = 2\n").unwrap_err();
    assert_eq!(err.0.kind, "SyntaxError");
    assert_eq!(err.0.line, Some(2));
    assert_eq!(err.0.snippet.as_deref(), Some("b = = 2"));
    assert!(err.0.col.is_some());
}

#[test]
/// 本体のないブロックが IndentationError になることを検証する。
fn missing_block_is_indentation_error() {
    let err = parse_program("if x:\npass\n").unwrap_err();
    assert_eq!(err.0.kind, "IndentationError");
}

#[test]
/// 予約語の一覧に制御構文と定数が含まれることを確かめる。
fn keywords_include_control_words() {
    let words: Vec<&str> = keywords().collect();
    for kw in ["def", "while", "import", "True", "None", "not"] {
        assert!(words.contains(&kw), "missing keyword {}", kw);
    }
}
