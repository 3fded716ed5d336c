// パス: src/repl/pipeline.rs
// 役割: 1 行分の構文解析・コンパイル・実行・結果取得を順に実行する
// 意図: 各ステージの成否をタグ付きの結果へ正規化し、最初の失敗で打ち切る
// 関連ファイル: src/repl/session.rs, src/repl/printer.rs, src/compiler/mod.rs, src/vm/mod.rs
//! 行パイプライン
//!
//! - ステージは 解析 → コンパイル → 実行 → 結果取得 の順で、並べ替えも再試行もしない。
//! - 1 行につき結果はちょうど 1 つ（値か、いずれかのステージの失敗）。
//! - 行をまたいで状態を持ち越すのは `CarriedState` を渡された場合のみ。
//!   持ち越し状態は行全体が成功したときだけ更新する。

use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::Program;
use crate::code::Bytecode;
use crate::compiler::{Compiler, CompilerState};
use crate::errors::{CompileError, ParseError, RuntimeError};
use crate::object::Value;
use crate::parser;
use crate::vm::Vm;

/// ステージの失敗。どの段階で止まったかを表す。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    #[error("parse failed with {} error(s)", .0.len())]
    Parse(Vec<ParseError>),
    #[error("compile failed: {0}")]
    Compile(#[source] CompileError),
    #[error("execution failed: {0}")]
    Runtime(#[source] RuntimeError),
}

impl StageFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            StageFailure::Parse(_) => "parse",
            StageFailure::Compile(_) => "compile",
            StageFailure::Runtime(_) => "runtime",
        }
    }
}

/// 1 行分の処理結果。`console` は `puts` の出力で、結果より先に表示する。
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub console: String,
    pub outcome: Result<Value, StageFailure>,
}

/// 行をまたいで持ち越す状態（シンボル表・定数・グローバル領域）。
#[derive(Debug, Clone, Default)]
pub struct CarriedState {
    pub compiler: CompilerState,
    pub globals: Vec<Value>,
}

/// 1 行を処理する。`carried` が `Some` のときは束縛を持ち越す。
pub fn run_line(
    line: &str,
    step_limit: Option<u64>,
    carried: Option<&mut CarriedState>,
) -> LineReport {
    let mut console = String::new();
    let outcome = run_stages(line, step_limit, carried, &mut console);
    if let Err(failure) = &outcome {
        log_failure(failure);
    }
    LineReport { console, outcome }
}

/// 失敗をコード・位置・スニペット付きでログへ出す（REPL 出力には本文のみ載る）。
fn log_failure(failure: &StageFailure) {
    match failure {
        StageFailure::Parse(errors) => {
            for err in errors {
                debug!(stage = failure.stage(), "{err}");
            }
        }
        StageFailure::Compile(err) => debug!(stage = failure.stage(), "{err}"),
        StageFailure::Runtime(err) => debug!(stage = failure.stage(), "{err}"),
    }
}

fn run_stages(
    line: &str,
    step_limit: Option<u64>,
    carried: Option<&mut CarriedState>,
    console: &mut String,
) -> Result<Value, StageFailure> {
    let program = lex_and_parse(line)?;
    let (seed_state, seed_globals) = match carried.as_deref() {
        Some(state) => (Some(state.compiler.clone()), state.globals.clone()),
        None => (None, Vec::new()),
    };
    let (bytecode, compiler_state) = compile(&program, seed_state)?;
    let vm = execute(bytecode, seed_globals, step_limit, console)?;
    let value = extract_result(&vm);
    if let Some(state) = carried {
        commit(state, compiler_state, vm.into_globals());
    }
    Ok(value)
}

/// 成功した行の状態を持ち越し状態へ反映する。
/// 新しいグローバル束縛がない行の定数は、後続の行から参照される経路がないので捨てる。
fn commit(state: &mut CarriedState, mut next: CompilerState, globals: Vec<Value>) {
    if next.symbols.num_definitions() == state.compiler.symbols.num_definitions() {
        next.constants.truncate(state.compiler.constants.len());
    }
    state.compiler = next;
    state.globals = globals;
}

/// 字句・構文解析。エラーが 1 件でもあればプログラムは破棄する。
pub fn lex_and_parse(line: &str) -> Result<Program, StageFailure> {
    let program = parser::parse(line).map_err(StageFailure::Parse)?;
    debug!(statements = program.statements.len(), "parsed");
    Ok(program)
}

/// コンパイル。`state` を渡すと既存のシンボル表と定数の続きから生成する。
pub fn compile(
    program: &Program,
    state: Option<CompilerState>,
) -> Result<(Bytecode, CompilerState), StageFailure> {
    let mut compiler = match state {
        Some(state) => Compiler::new_with_state(state),
        None => Compiler::new(),
    };
    compiler.compile(program).map_err(StageFailure::Compile)?;
    let bytecode = compiler.bytecode();
    debug!(
        bytes = bytecode.instructions.len(),
        constants = bytecode.constants.len(),
        "compiled"
    );
    trace!("bytecode:\n{}", bytecode.instructions);
    Ok((bytecode, compiler.into_state()))
}

/// 実行。失敗した場合も、それまでの `puts` 出力は `console` に残す。
pub fn execute(
    bytecode: Bytecode,
    globals: Vec<Value>,
    step_limit: Option<u64>,
    console: &mut String,
) -> Result<Vm, StageFailure> {
    let mut vm = Vm::new_with_globals(bytecode, globals).with_step_limit(step_limit);
    let result = vm.run();
    console.push_str(&vm.take_console());
    result.map_err(StageFailure::Runtime)?;
    debug!("executed");
    Ok(vm)
}

pub fn extract_result(vm: &Vm) -> Value {
    vm.last_popped_stack_elem()
}
