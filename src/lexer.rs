// パス: src/lexer.rs
// 役割: 1 行分のソースを位置付きトークンへ分解する字句解析器
// 意図: パーサが必要な時点でトークンを 1 つずつ取り出せるようにする
// 関連ファイル: src/parser/mod.rs, src/errors.rs, tests/lexer_parser.rs
//! 字句解析モジュール
//!
//! - `Lexer::next_token` はオンデマンドでトークンを返し、末尾では `EOF` を返し続ける。
//! - 字句解析自体は失敗しない。未知の文字や閉じていない文字列は `ILLEGAL` として
//!   パーサへ渡し、構文エラーとして報告させる。
//! - すべてのトークンに行・列・バイト位置を記録し、診断情報と連携させる。

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub pos: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    ILLEGAL,
    EOF,
    // 識別子・リテラル
    IDENT,
    INT,
    STRING,
    // 演算子
    ASSIGN,
    PLUS,
    MINUS,
    BANG,
    ASTERISK,
    SLASH,
    LT,
    GT,
    EQ,
    NOTEQ,
    // 区切り記号
    COMMA,
    SEMICOLON,
    COLON,
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,
    // キーワード
    FUNCTION,
    LET,
    TRUE,
    FALSE,
    IF,
    ELSE,
    RETURN,
}

impl TokenKind {
    /// エラーメッセージで用いる表記。
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::ILLEGAL => "ILLEGAL",
            TokenKind::EOF => "EOF",
            TokenKind::IDENT => "IDENT",
            TokenKind::INT => "INT",
            TokenKind::STRING => "STRING",
            TokenKind::ASSIGN => "=",
            TokenKind::PLUS => "+",
            TokenKind::MINUS => "-",
            TokenKind::BANG => "!",
            TokenKind::ASTERISK => "*",
            TokenKind::SLASH => "/",
            TokenKind::LT => "<",
            TokenKind::GT => ">",
            TokenKind::EQ => "==",
            TokenKind::NOTEQ => "!=",
            TokenKind::COMMA => ",",
            TokenKind::SEMICOLON => ";",
            TokenKind::COLON => ":",
            TokenKind::LPAREN => "(",
            TokenKind::RPAREN => ")",
            TokenKind::LBRACE => "{",
            TokenKind::RBRACE => "}",
            TokenKind::LBRACKET => "[",
            TokenKind::RBRACKET => "]",
            TokenKind::FUNCTION => "FUNCTION",
            TokenKind::LET => "LET",
            TokenKind::TRUE => "TRUE",
            TokenKind::FALSE => "FALSE",
            TokenKind::IF => "IF",
            TokenKind::ELSE => "ELSE",
            TokenKind::RETURN => "RETURN",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    HashMap::from([
        ("fn", TokenKind::FUNCTION),
        ("let", TokenKind::LET),
        ("true", TokenKind::TRUE),
        ("false", TokenKind::FALSE),
        ("if", TokenKind::IF),
        ("else", TokenKind::ELSE),
        ("return", TokenKind::RETURN),
    ])
});

/// 識別子がキーワードならその分類を、そうでなければ `IDENT` を返す。
pub fn lookup_ident(ident: &str) -> TokenKind {
    KEYWORDS.get(ident).copied().unwrap_or(TokenKind::IDENT)
}

#[derive(Debug)]
/// 行頭オフセットを事前計算し、行・列情報を素早く算出するヘルパ。
struct LineMap {
    starts: Vec<usize>,
}

impl LineMap {
    /// 入力全体を 1 度だけ走査して行頭インデックスを収集する。
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        for (idx, ch) in src.char_indices() {
            if ch == '\n' {
                starts.push(idx + ch.len_utf8());
            }
        }
        Self { starts }
    }

    /// 指定バイト位置の行番号と桁位置を返す。
    fn locate(&self, src: &str, pos: usize) -> (usize, usize) {
        let idx = match self.starts.binary_search(&pos) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let start = self.starts[idx];
        let col = src[start..pos].chars().count() + 1;
        (idx + 1, col)
    }
}

/// 空白文字かどうかを判定するユーティリティ。
fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}
/// 識別子に使用可能な文字かどうかを判定する。
fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// ソース文字列を走査してトークンを順に生成する字句解析器。
pub struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    line_map: LineMap,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            line_map: LineMap::new(src),
        }
    }

    /// 解析対象のソース全体。
    pub fn source(&self) -> &'a str {
        self.src
    }

    /// 次のトークンを返す。入力末尾に達した後は `EOF` を返し続ける。
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.cursor;
        let Some(ch) = self.peek_char() else {
            return self.make(TokenKind::EOF, String::new(), start);
        };

        if let Some(kind) = self.two_char_operator(ch) {
            self.advance_bytes(2);
            let value = self.src[start..self.cursor].to_string();
            return self.make(kind, value, start);
        }

        let single = match ch {
            '=' => Some(TokenKind::ASSIGN),
            '+' => Some(TokenKind::PLUS),
            '-' => Some(TokenKind::MINUS),
            '!' => Some(TokenKind::BANG),
            '*' => Some(TokenKind::ASTERISK),
            '/' => Some(TokenKind::SLASH),
            '<' => Some(TokenKind::LT),
            '>' => Some(TokenKind::GT),
            ',' => Some(TokenKind::COMMA),
            ';' => Some(TokenKind::SEMICOLON),
            ':' => Some(TokenKind::COLON),
            '(' => Some(TokenKind::LPAREN),
            ')' => Some(TokenKind::RPAREN),
            '{' => Some(TokenKind::LBRACE),
            '}' => Some(TokenKind::RBRACE),
            '[' => Some(TokenKind::LBRACKET),
            ']' => Some(TokenKind::RBRACKET),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance_char();
            return self.make(kind, ch.to_string(), start);
        }

        if ch == '"' {
            return self.read_string();
        }
        if ch.is_ascii_digit() {
            self.advance_while(|c| c.is_ascii_digit());
            let value = self.src[start..self.cursor].to_string();
            return self.make(TokenKind::INT, value, start);
        }
        if is_letter(ch) {
            self.advance_while(is_letter);
            let value = &self.src[start..self.cursor];
            let kind = lookup_ident(value);
            return self.make(kind, value.to_string(), start);
        }

        self.advance_char();
        self.make(TokenKind::ILLEGAL, ch.to_string(), start)
    }

    fn two_char_operator(&self, first: char) -> Option<TokenKind> {
        match (first, self.peek_second_char()?) {
            ('=', '=') => Some(TokenKind::EQ),
            ('!', '=') => Some(TokenKind::NOTEQ),
            _ => None,
        }
    }

    fn read_string(&mut self) -> Token {
        let start = self.cursor;
        self.advance_bytes(1); // 開始ダブルクォート
        let mut out = String::new();
        let mut escaped = false;
        while let Some(ch) = self.advance_char() {
            if escaped {
                out.push(match ch {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '"' => return self.make(TokenKind::STRING, out, start),
                _ => out.push(ch),
            }
        }
        // 閉じていない文字列
        let value = self.src[start..self.cursor].to_string();
        self.make(TokenKind::ILLEGAL, value, start)
    }

    fn make(&self, kind: TokenKind, value: String, start: usize) -> Token {
        let (line, col) = self.line_map.locate(self.src, start);
        Token {
            kind,
            value,
            pos: start,
            line,
            col,
        }
    }

    fn skip_whitespace(&mut self) {
        self.advance_while(is_whitespace);
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.advance_char();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.cursor..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut iter = self.src[self.cursor..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.advance_bytes(ch.len_utf8());
        Some(ch)
    }

    fn advance_bytes(&mut self, count: usize) {
        self.cursor = (self.cursor + count).min(self.src.len());
    }
}

/// 入力全体を `EOF` を含むトークン列へ変換する。
pub fn lex(src: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let done = tok.kind == TokenKind::EOF;
        tokens.push(tok);
        if done {
            return tokens;
        }
    }
}
