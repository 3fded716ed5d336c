// パス: tests/test_support.rs
// 役割: 統合テスト共通の補助関数を提供する
// 意図: 解析・コンパイル・実行・セッション駆動の定型処理を一元化しテストを簡潔に保つ
// 関連ファイル: tests/lexer_parser.rs, tests/vm.rs, tests/repl_session.rs
#![allow(dead_code)]
use monkey::{ast, compiler::Compiler, errors::RuntimeError, lexer, object::Value, parser, repl, vm::Vm};

pub fn parse_program(src: &str) -> ast::Program {
    parser::parse(src).expect("parse program")
}

/// 構文エラーの表示文字列を発生順に返す。
pub fn parse_errors(src: &str) -> Vec<String> {
    match parser::parse(src) {
        Ok(program) => panic!("expected parse errors, got program `{program}`"),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    }
}

pub fn lex_kinds(src: &str) -> Vec<lexer::TokenKind> {
    lexer::lex(src).into_iter().map(|t| t.kind).collect()
}

pub fn run_result(src: &str) -> Result<Value, RuntimeError> {
    let program = parse_program(src);
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped_stack_elem())
}

pub fn run_inspect(src: &str) -> String {
    run_result(src).expect("run").inspect()
}

/// 既定設定でセッションを回し、出力全体を文字列で返す。
pub fn session_output(input: &str) -> String {
    session_output_with(input, &repl::SessionConfig::default())
}

pub fn session_output_with(input: &str, config: &repl::SessionConfig) -> String {
    let mut out = Vec::new();
    repl::start_with(input.as_bytes(), &mut out, config).expect("session");
    String::from_utf8(out).expect("utf8 output")
}
