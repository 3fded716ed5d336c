// パス: src/repl/mod.rs
// 役割: REPL モジュール群のファサード
// 意図: セッション開始 API と行単位の処理結果だけを外部へ公開する
// 関連ファイル: src/repl/session.rs, src/repl/pipeline.rs, src/repl/printer.rs, src/bin/monkey.rs
//! Monkey の対話環境を構成するモジュール群をまとめたファサード。
//!
//! 入力・行パイプライン・表示を役割ごとに分け、外部には最小限の API のみを公開する。
//! - `session`: プロンプトと読み取りのループ、設定
//! - `pipeline`: 1 行分の 解析 → コンパイル → 実行 → 結果取得
//! - `printer`: 結果値と失敗報告の書式

pub mod pipeline;
mod printer;
pub mod session;

pub use pipeline::{run_line, CarriedState, LineReport, StageFailure};
pub use printer::{MONKEY_FACE, PROMPT};
pub use session::{run_repl, start, start_with, LineSource, SessionConfig, SessionError};
