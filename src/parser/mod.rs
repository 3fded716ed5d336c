// パス: src/parser/mod.rs
// 役割: 字句解析器からトークンを受け取り AST を生成する Pratt パーサのエントリポイント
// 意図: エラーで停止せずに全件を収集し、REPL がまとめて報告できるようにする
// 関連ファイル: src/parser/program.rs, src/parser/expr.rs, src/lexer.rs
//! 構文解析モジュール
//!
//! - 文は再帰下降、式は優先順位付きの Pratt 方式で解析する。
//! - 優先順位は `== != < > + - * / 前置 呼出 添字` の順に強くなる。
//! - 失敗した文はエラーを記録して読み飛ばし、次のトークンから解析を続ける。
//!   `errors()` が空でない場合、`parse_program` の結果は破棄すること。
//! - 式の入れ子は `MAX_NESTING` 段まで。超えた時点でエラーを 1 件記録し、その行の解析を打ち切る。

use crate::ast::{Identifier, Program, Span};
use crate::errors::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

mod expr;
mod program;

/// 式の入れ子（括弧・前置演算子・左結合の連鎖を含む）の上限。
pub const MAX_NESTING: usize = 256;

/// 二項演算子・後置演算子の結合力。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

impl Precedence {
    pub(super) fn of(kind: TokenKind) -> Self {
        match kind {
            TokenKind::EQ | TokenKind::NOTEQ => Precedence::Equals,
            TokenKind::LT | TokenKind::GT => Precedence::LessGreater,
            TokenKind::PLUS | TokenKind::MINUS => Precedence::Sum,
            TokenKind::ASTERISK | TokenKind::SLASH => Precedence::Product,
            TokenKind::LPAREN => Precedence::Call,
            TokenKind::LBRACKET => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
    depth: usize,
    too_deep: bool,
}

impl<'a> Parser<'a> {
    /// 字句解析器から新しいパーサを構築し、先読み 2 トークンを準備する。
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
            depth: 0,
            too_deep: false,
        }
    }

    /// 解析中に蓄積したエラーを発生順に返す。
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// 蓄積したエラーを所有権ごと取り出す。
    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    pub(super) fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.cur = std::mem::replace(&mut self.peek, next);
    }

    pub(super) fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    pub(super) fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// 次のトークンが `kind` なら 1 つ進める。違えばエラーを記録して `None` を返す。
    pub(super) fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek_is(kind) {
            self.next_token();
            Some(())
        } else {
            self.peek_error(kind);
            None
        }
    }

    pub(super) fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek.kind)
    }

    pub(super) fn cur_precedence(&self) -> Precedence {
        Precedence::of(self.cur.kind)
    }

    pub(super) fn cur_identifier(&self) -> Identifier {
        Identifier {
            name: self.cur.value.clone(),
            span: span_from_token(&self.cur),
        }
    }

    fn peek_error(&mut self, expected: TokenKind) {
        let msg = format!(
            "expected next token to be {}, got {} instead",
            expected, self.peek.kind
        );
        let err = self.error_at("PAR001", msg, &self.peek);
        self.errors.push(err);
    }

    pub(super) fn no_prefix_parse_fn_error(&mut self) {
        let msg = format!("no prefix parse function for {} found", self.cur.kind);
        let err = self.error_at("PAR002", msg, &self.cur);
        self.errors.push(err);
    }

    /// 入れ子を 1 段深くする。上限を超えたら最初の 1 回だけエラーを記録する。
    pub(super) fn descend(&mut self) -> Option<()> {
        self.depth += 1;
        if self.depth <= MAX_NESTING {
            return Some(());
        }
        if !self.too_deep {
            self.too_deep = true;
            self.push_error("PAR004", "expression nested too deeply".to_string());
        }
        None
    }

    pub(super) fn push_error(&mut self, code: &'static str, msg: String) {
        let err = self.error_at(code, msg, &self.cur);
        self.errors.push(err);
    }

    fn error_at(&self, code: &'static str, msg: String, token: &Token) -> ParseError {
        let snippet = self
            .lexer
            .source()
            .lines()
            .nth(token.line.saturating_sub(1))
            .unwrap_or("");
        ParseError::located(code, msg, token.pos, token.line, token.col, snippet)
    }
}

pub(super) fn span_from_token(token: &Token) -> Span {
    Span::new(token.pos, token.line, token.col)
}

/// ソース文字列を解析し、成功時は `Program`、失敗時は全エラーを返す。
pub fn parse(src: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(Lexer::new(src));
    let program = parser.parse_program();
    if parser.errors().is_empty() {
        Ok(program)
    } else {
        Err(parser.into_errors())
    }
}

#[cfg(test)]
mod tests {
    use super::parse;

    fn render(src: &str) -> String {
        parse(src).expect("parse").to_string()
    }

    fn messages(src: &str) -> Vec<String> {
        parse(src)
            .expect_err("expected parse errors")
            .iter()
            .map(|e| e.message().to_string())
            .collect()
    }

    #[test]
    /// 演算子の優先順位と結合が正準形に反映されるか検証する。
    fn operator_precedence_rendering() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b - c", "((a + b) - c)"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            ("add(a + b, c * d)", "add((a + b), (c * d))"),
        ];
        for (src, expected) in cases {
            assert_eq!(render(src), expected, "source: {src}");
        }
    }

    #[test]
    fn let_and_return_statements() {
        assert_eq!(render("let x = 5; return x;"), "let x = 5;return x;");
    }

    #[test]
    /// let で束縛した関数リテラルに名前が付与される。
    fn let_names_function_literal() {
        assert_eq!(render("let f = fn(a) { a };"), "let f = fn<f>(a) a;");
    }

    #[test]
    fn hash_and_if_expressions() {
        assert_eq!(render("{\"a\": 1, true: 2}"), "{a:1, true:2}");
        assert_eq!(render("if (x < y) { x } else { y }"), "if(x < y) xelse y");
    }

    #[test]
    /// 不正な let 文で発生するエラーが順番通りに蓄積される。
    fn broken_let_collects_errors_in_order() {
        assert_eq!(
            messages("let =;"),
            vec![
                "expected next token to be IDENT, got = instead".to_string(),
                "no prefix parse function for = found".to_string(),
            ]
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        let msgs = messages(&"9".repeat(30));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("could not parse"));
    }

    #[test]
    fn error_carries_position() {
        let errs = parse("let x 5;").expect_err("expected errors");
        assert_eq!(errs[0].0.line, Some(1));
        assert_eq!(errs[0].0.col, Some(7));
        assert_eq!(errs[0].0.pos, Some(6));
        assert_eq!(
            errs[0].to_string(),
            "[PAR001] expected next token to be =, got INT instead @line=1,col=7 @pos=6\nlet x 5;\n      ^"
        );
    }

    #[test]
    /// 入れ子が上限を超えるとエラー 1 件で解析を打ち切る。
    fn deep_nesting_is_rejected_once() {
        let depth = 10_000;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(messages(&src), vec!["expression nested too deeply".to_string()]);

        let src = format!("{}1", "-".repeat(depth));
        assert_eq!(messages(&src), vec!["expression nested too deeply".to_string()]);

        let src = format!("1{}", " + 1".repeat(depth));
        assert_eq!(messages(&src), vec!["expression nested too deeply".to_string()]);
    }

    #[test]
    fn nesting_below_limit_parses() {
        let depth = super::MAX_NESTING / 2;
        let src = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse(&src).is_ok());
    }
}
