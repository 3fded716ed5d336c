// パス: src/lib.rs
// 役割: クレートルート。各モジュールを配線し公開 API を定める
// 意図: 字句解析から VM・REPL までの処理系を 1 つのライブラリとして提供する
// 関連ファイル: src/repl/mod.rs, src/compiler/mod.rs, src/vm/mod.rs, src/errors.rs
//! Monkey (Rust) ルートモジュール
//!
//! 目的:
//! - Monkey 言語のバイトコードコンパイラ・仮想マシン・対話環境を提供する。
//! - 1 行ごとに 解析 → コンパイル → 実行 → 表示 を行い、失敗はその行の中で完結させる。
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - 各ステージは `Result` で成否を返し、パニックで制御しない。
//! - パブリックAPIは最小限。

pub mod ast;
pub mod builtins;
pub mod code;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod vm;

// 便利な再エクスポート
pub use crate::errors::{CompileError, ErrorInfo, ParseError, RuntimeError};
pub use crate::object::Value;
pub use crate::parser::parse;
