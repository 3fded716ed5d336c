// パス: src/bin/monkey.rs
// 役割: REPL を起動するバイナリのエントリポイント
// 意図: コマンドライン引数とログ設定を `SessionConfig` へ写して対話セッションを開始する
// 関連ファイル: src/repl/session.rs, src/lib.rs
use std::process::ExitCode;

use clap::Parser as ClapParser;
use monkey::repl::{self, SessionConfig};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(name = "monkey-repl")]
#[command(about = "Monkey language REPL (bytecode compiler + VM)", long_about = None)]
struct Args {
    /// 行をまたいで let 束縛を持ち越す
    #[arg(long)]
    persist: bool,

    /// 1 行あたりに実行できる命令数の上限（省略時は無制限）
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,
}

fn main() -> ExitCode {
    // ログは標準エラーへ。REPL の出力ストリームには混ぜない
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = SessionConfig {
        persist_bindings: args.persist,
        step_limit: args.max_steps,
        ..SessionConfig::default()
    };
    tracing::debug!(?config, "starting session");

    match repl::run_repl(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("REPL 実行中にエラーが発生しました: {}", err);
            ExitCode::FAILURE
        }
    }
}
