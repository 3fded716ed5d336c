// パス: src/repl/printer.rs
// 役割: 1 行分の処理結果を REPL 出力へ整形する
// 意図: 成功値と各ステージの失敗報告の書式を一箇所に固定する
// 関連ファイル: src/repl/session.rs, src/repl/pipeline.rs, src/object.rs
//! REPL の表示ロジック。
//! 失敗報告の文言は利用者やスクリプトが依存する契約なので、改行位置も含め変更しないこと。
//! 報告に載せるのはメッセージ本文のみ。エラーコードと位置はログ（`tracing`）側で出す。

use std::io::{self, Write};

use super::pipeline::{LineReport, StageFailure};
use crate::errors::{CompileError, ParseError, RuntimeError};

/// 既定のプロンプト。
pub const PROMPT: &str = ">> ";

/// 構文エラー報告の先頭に出すバナー。
pub const MONKEY_FACE: &str = r#"            __,__
   .--.  .-"     "-.  .--.
  / .. \/  .-. .-.  \/ .. \
 | |  '|  /   Y   \  |'  | |
 | \   \  \ 0 | 0 /  /   / |
  \ '- ,\.-"""""""-./, -' /
   ''-' /_   ^ ^   _\ '-''
       |  \._   _./  |
       \   \ '~' /   /
        '._ '-=-' _.'
           '-----'
"#;

/// `puts` の出力に続けて、結果値または失敗報告を書き出す。
pub(crate) fn write_report<W: Write>(out: &mut W, report: &LineReport) -> io::Result<()> {
    out.write_all(report.console.as_bytes())?;
    match &report.outcome {
        Ok(value) => writeln!(out, "{}", value.inspect()),
        Err(StageFailure::Parse(errors)) => write_parse_errors(out, errors),
        Err(StageFailure::Compile(err)) => write_compile_error(out, err),
        Err(StageFailure::Runtime(err)) => write_runtime_error(out, err),
    }
}

pub(crate) fn write_parse_errors<W: Write>(out: &mut W, errors: &[ParseError]) -> io::Result<()> {
    out.write_all(MONKEY_FACE.as_bytes())?;
    out.write_all(b"Whoops! We ran into some monkey business here!\n")?;
    out.write_all(b" parser errors:\n")?;
    for err in errors {
        writeln!(out, "\t{}", err.message())?;
    }
    Ok(())
}

pub(crate) fn write_compile_error<W: Write>(out: &mut W, err: &CompileError) -> io::Result<()> {
    write!(out, "Whoops! Compilation failed:\n {}\n", err.message())
}

pub(crate) fn write_runtime_error<W: Write>(out: &mut W, err: &RuntimeError) -> io::Result<()> {
    write!(out, "Whoops! Executing bytecode failed:\n {}\n", err.message())
}
