// パス: src/errors.rs
// 役割: ステージごとのエラー型と共通フォーマットを定義する
// 意図: 構文解析・コンパイル・実行の失敗を同じ書式で報告できるようにする
// 関連ファイル: src/parser/mod.rs, src/compiler/mod.rs, src/vm/mod.rs
//! エラー型の定義（共通フォーマット: \[CODE\] メッセージ @line:col / @pos）。

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub msg: String,
    pub pos: Option<usize>,      // バイトオフセット（任意）
    pub line: Option<usize>,     // 1-origin（任意）
    pub col: Option<usize>,      // 1-origin（任意）
    pub snippet: Option<String>, // エラー行のスニペット（任意）
}

impl ErrorInfo {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            line: None,
            col: None,
            snippet: None,
        }
    }
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            line,
            col,
            snippet: None,
        }
    }
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // 1行目: ヘッダ
        match (self.line, self.col, self.pos) {
            (Some(l), Some(c), Some(p)) => write!(
                f,
                "[{}] {} @line={},col={} @pos={}",
                self.code, self.msg, l, c, p
            )?,
            (Some(l), Some(c), None) => {
                write!(f, "[{}] {} @line={},col={}", self.code, self.msg, l, c)?
            }
            (_, _, Some(p)) => write!(f, "[{}] {} @pos={}", self.code, self.msg, p)?,
            _ => write!(f, "[{}] {}", self.code, self.msg)?,
        }
        // 2行目以降: スニペット
        if let (Some(s), Some(c)) = (&self.snippet, self.col) {
            let caret = if c > 1 {
                " ".repeat(c - 1) + "^"
            } else {
                "^".to_string()
            };
            write!(f, "\n{}\n{}", s, caret)?;
        }
        Ok(())
    }
}

/// 構文解析エラー。パーサは複数件を発生順に蓄積する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub ErrorInfo);
impl ParseError {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self(ErrorInfo::new(code, msg, pos))
    }
    /// トークン位置（バイトオフセットと行・列）とエラー行のスニペット付きで構築する。
    pub fn located(
        code: &'static str,
        msg: impl Into<String>,
        pos: usize,
        line: usize,
        col: usize,
        snippet: impl Into<String>,
    ) -> Self {
        Self(ErrorInfo::at(code, msg, Some(pos), Some(line), Some(col)).with_snippet(snippet))
    }
    /// 位置情報を除いたメッセージ本文。
    pub fn message(&self) -> &str {
        &self.0.msg
    }
}

/// コード生成時のエラー（未定義変数など）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError(pub ErrorInfo);
impl CompileError {
    pub fn new(code: &'static str, msg: impl Into<String>) -> Self {
        Self(ErrorInfo::new(code, msg, None))
    }
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self(ErrorInfo::at(code, msg, None, line, col))
    }
    pub fn message(&self) -> &str {
        &self.0.msg
    }
}

/// VM 実行時のエラー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError(pub ErrorInfo);
impl RuntimeError {
    pub fn new(code: &'static str, msg: impl Into<String>) -> Self {
        Self(ErrorInfo::new(code, msg, None))
    }
    pub fn message(&self) -> &str {
        &self.0.msg
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for ParseError {}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for CompileError {}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for RuntimeError {}
