// パス: src/repl/session.rs
// 役割: プロンプト表示・行読み取り・パイプライン実行を繰り返すセッションループ
// 意図: 入出力ストリームを差し替え可能にし、対話実行とテストで同じループを使う
// 関連ファイル: src/repl/pipeline.rs, src/repl/printer.rs, src/bin/monkey.rs
//! セッションループ
//!
//! - 読み取りの前に必ずプロンプトを書き出して flush する。
//! - 入力終端で `Ok(())` を返す。それ以上は何も出力しない。
//! - ステージの失敗は報告して次の行へ進む。ループを止めるのは入出力エラーだけ。

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::debug;

use super::pipeline::{run_line, CarriedState};
use super::printer::{write_report, PROMPT};

/// セッションの設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub prompt: String,
    /// 行をまたいで束縛を持ち越すか（既定は持ち越さない）。
    /// 持ち越す場合、定数プールは新しい束縛を作った行の分だけ増える。
    /// 上限（65536 個）に達した後の行は定数の追加でコンパイルエラーになる。
    pub persist_bindings: bool,
    /// 1 行あたりに実行できる命令数の上限。`None` は無制限。
    pub step_limit: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: PROMPT.to_string(),
            persist_bindings: false,
            step_limit: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O エラー: {0}")]
    Io(#[from] io::Error),
}

/// 入力行の供給元。
pub trait LineSource {
    /// 次の 1 行を改行を除いて返す。入力終端なら `None`。
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

impl<R: BufRead> LineSource for R {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        // 不正な UTF-8 は置換文字にして字句解析へ渡す
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// 既定設定でセッションを開始する。
///
/// # Examples
/// ```
/// let mut out = Vec::new();
/// monkey::repl::start("1 + 2\n".as_bytes(), &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), ">> 3\n>> ");
/// ```
pub fn start<S, W>(input: S, output: W) -> Result<(), SessionError>
where
    S: LineSource,
    W: Write,
{
    start_with(input, output, &SessionConfig::default())
}

pub fn start_with<S, W>(mut input: S, mut output: W, config: &SessionConfig) -> Result<(), SessionError>
where
    S: LineSource,
    W: Write,
{
    let mut carried = config.persist_bindings.then(CarriedState::default);
    let mut line_no: usize = 0;
    loop {
        output.write_all(config.prompt.as_bytes())?;
        output.flush()?;
        let Some(line) = input.next_line()? else {
            debug!(lines = line_no, "end of input");
            return Ok(());
        };
        line_no += 1;
        debug!(line_no, len = line.len(), "read line");
        let report = run_line(&line, config.step_limit, carried.as_mut());
        write_report(&mut output, &report)?;
    }
}

/// 標準入力と標準出力でセッションを実行する。
pub fn run_repl(config: &SessionConfig) -> Result<(), SessionError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    start_with(stdin.lock(), stdout.lock(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str, config: &SessionConfig) -> String {
        let mut out = Vec::new();
        start_with(input.as_bytes(), &mut out, config).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_input_writes_single_prompt() {
        assert_eq!(run("", &SessionConfig::default()), ">> ");
    }

    #[test]
    /// 行末の CRLF と、改行で終わらない最終行を扱えるか検証する。
    fn line_endings_are_stripped() {
        assert_eq!(run("1 + 2\r\n3", &SessionConfig::default()), ">> 3\n>> 3\n>> ");
    }

    #[test]
    fn blank_line_renders_null() {
        assert_eq!(run("\n", &SessionConfig::default()), ">> null\n>> ");
    }

    #[test]
    fn custom_prompt_and_persistence() {
        let config = SessionConfig {
            prompt: "monkey> ".into(),
            persist_bindings: true,
            step_limit: None,
        };
        assert_eq!(
            run("let x = 5;\nx + 1\n", &config),
            "monkey> 5\nmonkey> 6\nmonkey> "
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut out = Vec::new();
        start(&b"\"\xff\"\n"[..], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">> \u{fffd}\n>> ");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_errors_end_the_session() {
        let err = start("1\n".as_bytes(), FailingWriter).unwrap_err();
        assert!(matches!(err, SessionError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
