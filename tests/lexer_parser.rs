// パス: tests/lexer_parser.rs
// 役割: Lexer と parser の基本〜境界テストを一本化
// 意図: 字句解析と構文解析の重要ケースをシンプルに網羅する
// 関連ファイル: src/lexer.rs, src/parser/mod.rs, src/ast.rs
#[path = "test_support.rs"]
mod support;

use monkey::lexer::TokenKind;
use support::{lex_kinds, parse_errors, parse_program};

#[test]
/// 代表的な字句パターンをテーブル駆動で検証する。
fn lexer_happy_paths() {
    use TokenKind::*;
    let cases: &[(&str, &[TokenKind])] = &[
        ("let five = 5;", &[LET, IDENT, ASSIGN, INT, SEMICOLON, EOF]),
        ("!-/*<>", &[BANG, MINUS, SLASH, ASTERISK, LT, GT, EOF]),
        ("10 == 10; 9 != 8", &[INT, EQ, INT, SEMICOLON, INT, NOTEQ, INT, EOF]),
        ("fn(x, y) { x + y }", &[FUNCTION, LPAREN, IDENT, COMMA, IDENT, RPAREN, LBRACE, IDENT, PLUS, IDENT, RBRACE, EOF]),
        ("if (a) { return true } else { false }", &[IF, LPAREN, IDENT, RPAREN, LBRACE, RETURN, TRUE, RBRACE, ELSE, LBRACE, FALSE, RBRACE, EOF]),
        ("[1, 2]; {\"a\": 1}", &[LBRACKET, INT, COMMA, INT, RBRACKET, SEMICOLON, LBRACE, STRING, COLON, INT, RBRACE, EOF]),
    ];
    for (src, kinds) in cases {
        assert_eq!(&lex_kinds(src), kinds, "source: {src}");
    }
}

#[test]
fn lexer_marks_unknown_input_as_illegal() {
    assert_eq!(lex_kinds("@"), vec![TokenKind::ILLEGAL, TokenKind::EOF]);
    assert_eq!(lex_kinds("\"open"), vec![TokenKind::ILLEGAL, TokenKind::EOF]);
}

#[test]
/// 演算子の優先順位と結合性が正規化表示に反映されるか検証する。
fn operator_precedence_rendering() {
    let cases = [
        ("-a * b", "((-a) * b)"),
        ("!-a", "(!(-a))"),
        ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
        ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
        ("(5 + 5) * 2", "((5 + 5) * 2)"),
        ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
        ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
        ("add(a * b[2], b[1], 2 * [1, 2][1])", "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))"),
    ];
    for (src, expected) in cases {
        assert_eq!(parse_program(src).to_string(), expected, "source: {src}");
    }
}

#[test]
fn statements_render_canonically() {
    assert_eq!(parse_program("let x = 5;").to_string(), "let x = 5;");
    assert_eq!(parse_program("return x;").to_string(), "return x;");
    assert_eq!(parse_program("let x = 5; x").to_string(), "let x = 5;x");
}

#[test]
/// 構文エラーは停止せず蓄積され、発生順に位置付きで報告される。
fn parser_collects_errors_in_order() {
    let errors = parse_errors("let =;");
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0],
        "[PAR001] expected next token to be IDENT, got = instead @line=1,col=5 @pos=4\nlet =;\n    ^"
    );
    assert!(errors[1].starts_with("[PAR002] no prefix parse function for = found @line=1,col=5"));

    let errors = parse_errors("let x 5;");
    assert_eq!(
        errors[0],
        "[PAR001] expected next token to be =, got INT instead @line=1,col=7 @pos=6\nlet x 5;\n      ^"
    );
}

#[test]
fn integer_literal_overflow_is_a_parse_error() {
    let errors = parse_errors("99999999999999999999");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("could not parse"), "{}", errors[0]);
}
