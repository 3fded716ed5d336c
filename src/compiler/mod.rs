// パス: src/compiler/mod.rs
// 役割: AST をバイトコード（命令列 + 定数プール）へ変換するコンパイラ
// 意図: 1 行ごとに新しいインスタンスを作り、VM が単独で実行できる成果物を渡す
// 関連ファイル: src/compiler/symbol_table.rs, src/code.rs, src/vm/mod.rs
//! コンパイラ
//!
//! 仕様要点:
//! - `<` はオペランドを入れ替えて `OpGreaterThan` に落とす。
//! - `if` の各分岐は必ず値を 1 つ積む（空の分岐や `let` で終わる分岐は `null`）。
//! - 関数本体の末尾の式は暗黙の戻り値になる。
//! - `let` は値をコンパイルする前に名前を定義する（関数の自己参照を許すため）。

pub mod symbol_table;

use std::mem;
use std::rc::Rc;

use crate::ast::{BlockStatement, Expression, Identifier, Program, Statement};
use crate::builtins::BUILTINS;
use crate::code::{make, Bytecode, Instructions, Opcode};
use crate::errors::CompileError;
use crate::object::{CompiledFunction, Value};

pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

const MAX_U8_OPERAND: usize = u8::MAX as usize;
const MAX_U16_OPERAND: usize = u16::MAX as usize;

#[derive(Clone, Copy, Debug)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// 行をまたいで引き継げるコンパイラの状態（`--persist` 用）。
#[derive(Clone, Debug)]
pub struct CompilerState {
    pub symbols: SymbolTable,
    pub constants: Vec<Value>,
}

impl Default for CompilerState {
    fn default() -> Self {
        let mut symbols = SymbolTable::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(i, builtin.name);
        }
        Self {
            symbols,
            constants: Vec::new(),
        }
    }
}

pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scope: CompilationScope,
    enclosing: Vec<CompilationScope>,
}

impl Compiler {
    /// 組み込み関数のみが定義された新しいコンパイラを作る。
    pub fn new() -> Self {
        Self::new_with_state(CompilerState::default())
    }

    /// 既存のシンボル表と定数プールを引き継いでコンパイラを作る。
    pub fn new_with_state(state: CompilerState) -> Self {
        Self {
            constants: state.constants,
            symbols: state.symbols,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// 直近の `compile` が生成したバイトコード。
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: Instructions(self.scope.instructions.clone()),
            constants: self.constants.clone(),
        }
    }

    /// 次の行へ引き継ぐための状態を取り出す。
    pub fn into_state(self) -> CompilerState {
        CompilerState {
            symbols: self.symbols,
            constants: self.constants,
        }
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Expression { expr } => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let { name, value } => {
                let symbol = self.symbols.define(&name.name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => {
                        check_operand(symbol.index, MAX_U16_OPERAND, "CMP005", "global bindings")?;
                        self.emit(Opcode::SetGlobal, &[symbol.index]);
                    }
                    _ => {
                        check_operand(symbol.index, MAX_U8_OPERAND, "CMP004", "local bindings")?;
                        self.emit(Opcode::SetLocal, &[symbol.index]);
                    }
                }
            }
            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::IntegerLiteral(v) => {
                let idx = self.add_constant(Value::Integer(*v))?;
                self.emit(Opcode::Constant, &[idx]);
            }
            Expression::StringLiteral(s) => {
                let idx = self.add_constant(Value::string(s))?;
                self.emit(Opcode::Constant, &[idx]);
            }
            Expression::Boolean(true) => {
                self.emit(Opcode::True, &[]);
            }
            Expression::Boolean(false) => {
                self.emit(Opcode::False, &[]);
            }
            Expression::Prefix { op, right } => {
                self.compile_expression(right)?;
                match op.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    other => return Err(unknown_operator(other)),
                };
            }
            Expression::Infix { op, left, right } => {
                if op == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let opcode = match op.as_str() {
                    "+" => Opcode::Add,
                    "-" => Opcode::Sub,
                    "*" => Opcode::Mul,
                    "/" => Opcode::Div,
                    ">" => Opcode::GreaterThan,
                    "==" => Opcode::Equal,
                    "!=" => Opcode::NotEqual,
                    other => return Err(unknown_operator(other)),
                };
                self.emit(opcode, &[]);
            }
            Expression::If {
                cond,
                consequence,
                alternative,
            } => self.compile_if(cond, consequence, alternative.as_ref())?,
            Expression::Identifier(ident) => {
                let symbol = self.resolve(ident)?;
                self.load_symbol(&symbol);
            }
            Expression::ArrayLiteral(items) => {
                for item in items {
                    self.compile_expression(item)?;
                }
                check_operand(items.len(), MAX_U16_OPERAND, "CMP007", "array elements")?;
                self.emit(Opcode::Array, &[items.len()]);
            }
            Expression::HashLiteral(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                check_operand(pairs.len() * 2, MAX_U16_OPERAND, "CMP007", "hash elements")?;
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expression::FunctionLiteral { params, body, name } => {
                self.compile_function(params, body, name.as_deref())?
            }
            Expression::Call { function, args } => {
                self.compile_expression(function)?;
                for arg in args {
                    self.compile_expression(arg)?;
                }
                check_operand(args.len(), MAX_U8_OPERAND, "CMP008", "call arguments")?;
                self.emit(Opcode::Call, &[args.len()]);
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        cond: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<(), CompileError> {
        self.compile_expression(cond)?;
        // ジャンプ先は後で書き換える
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[9999]);
        self.compile_branch(consequence)?;
        let jump = self.emit(Opcode::Jump, &[9999]);
        let after_consequence = self.scope.instructions.len();
        self.change_operand(jump_not_truthy, after_consequence)?;

        match alternative {
            Some(alt) => self.compile_branch(alt)?,
            None => {
                self.emit(Opcode::Null, &[]);
            }
        }
        let after_alternative = self.scope.instructions.len();
        self.change_operand(jump, after_alternative)
    }

    /// 分岐ブロックを、スタックに値を 1 つ残す形でコンパイルする。
    fn compile_branch(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        self.compile_block(block)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Null, &[]);
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        params: &[Identifier],
        body: &BlockStatement,
        name: Option<&str>,
    ) -> Result<(), CompileError> {
        self.enter_scope();
        if let Some(name) = name {
            self.symbols.define_function_name(name);
        }
        for param in params {
            self.symbols.define(&param.name);
        }
        self.compile_block(body)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbols.free_symbols().to_vec();
        let num_locals = self.symbols.num_definitions();
        let instructions = self.leave_scope();
        check_operand(num_locals, MAX_U8_OPERAND, "CMP004", "local bindings")?;
        check_operand(free_symbols.len(), MAX_U8_OPERAND, "CMP009", "free variables")?;

        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }
        let func = CompiledFunction {
            instructions: Rc::new(Instructions(instructions)),
            num_locals,
            num_parameters: params.len(),
        };
        let idx = self.add_constant(Value::CompiledFunction(Rc::new(func)))?;
        self.emit(Opcode::Closure, &[idx, free_symbols.len()]);
        Ok(())
    }

    fn resolve(&mut self, ident: &Identifier) -> Result<Symbol, CompileError> {
        self.symbols.resolve(&ident.name).ok_or_else(|| {
            CompileError::at(
                "CMP001",
                format!("undefined variable {}", ident.name),
                Some(ident.span.line),
                Some(ident.span.col),
            )
        })
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        let _ = match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        let idx = self.constants.len();
        check_operand(idx, MAX_U16_OPERAND, "CMP003", "constants")?;
        self.constants.push(value);
        Ok(idx)
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let ins = make(op, operands);
        let position = self.scope.instructions.len();
        self.scope.instructions.extend_from_slice(&ins);
        self.scope.previous = self.scope.last;
        self.scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        position
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        !self.scope.instructions.is_empty() && self.scope.last.map(|l| l.opcode) == Some(op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last {
            self.scope.instructions.truncate(last.position);
            self.scope.last = self.scope.previous;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope.last.as_mut() {
            let ins = make(Opcode::ReturnValue, &[]);
            let pos = last.position;
            self.scope.instructions[pos..pos + ins.len()].copy_from_slice(&ins);
            last.opcode = Opcode::ReturnValue;
        }
    }

    fn change_operand(&mut self, position: usize, operand: usize) -> Result<(), CompileError> {
        check_operand(operand, MAX_U16_OPERAND, "CMP006", "instruction bytes")?;
        let byte = self.scope.instructions[position];
        let Some(op) = Opcode::from_byte(byte) else {
            return Err(CompileError::new(
                "CMP099",
                format!("cannot patch unknown opcode {byte}"),
            ));
        };
        let ins = make(op, &[operand]);
        self.scope.instructions[position..position + ins.len()].copy_from_slice(&ins);
        Ok(())
    }

    fn enter_scope(&mut self) {
        let outer = mem::take(&mut self.scope);
        self.enclosing.push(outer);
        let outer_symbols = mem::take(&mut self.symbols);
        self.symbols = SymbolTable::new_enclosed(outer_symbols);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let outer = self.enclosing.pop().unwrap_or_default();
        let inner = mem::replace(&mut self.scope, outer);
        if let Some(outer_symbols) = self.symbols.take_outer() {
            self.symbols = outer_symbols;
        }
        inner.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_operand(
    value: usize,
    max: usize,
    code: &'static str,
    what: &str,
) -> Result<(), CompileError> {
    if value > max {
        return Err(CompileError::new(
            code,
            format!("too many {what}: {value} exceeds limit {max}"),
        ));
    }
    Ok(())
}

fn unknown_operator(op: &str) -> CompileError {
    CompileError::new("CMP002", format!("unknown operator {op}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile_src(src: &str) -> Result<Bytecode, CompileError> {
        let program = parse(src).expect("parse");
        let mut compiler = Compiler::new();
        compiler.compile(&program)?;
        Ok(compiler.bytecode())
    }

    fn concat(parts: Vec<Vec<u8>>) -> Instructions {
        Instructions::from(parts)
    }

    fn assert_instructions(actual: &Instructions, expected: Vec<Vec<u8>>) {
        let expected = concat(expected);
        assert_eq!(
            actual, &expected,
            "\nwant:\n{}\ngot:\n{}",
            expected, actual
        );
    }

    fn assert_int_constants(constants: &[Value], expected: &[i64]) {
        let actual: Vec<i64> = constants
            .iter()
            .filter_map(|c| match c {
                Value::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(actual, expected);
    }

    fn function_at(constants: &[Value], idx: usize) -> Rc<CompiledFunction> {
        match &constants[idx] {
            Value::CompiledFunction(f) => Rc::clone(f),
            other => panic!("constant {idx} is not a function: {other:?}"),
        }
    }

    #[test]
    /// 整数演算と `<` の入れ替えを検証する。
    fn integer_arithmetic_and_comparison() {
        let bc = compile_src("1 + 2; 1 < 2").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[2]),
                make(Opcode::Constant, &[3]),
                make(Opcode::GreaterThan, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
        assert_int_constants(&bc.constants, &[1, 2, 2, 1]);
    }

    #[test]
    fn prefix_operators() {
        let bc = compile_src("-1; !true").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Minus, &[]),
                make(Opcode::Pop, &[]),
                make(Opcode::True, &[]),
                make(Opcode::Bang, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    /// else 無しの if は null を積み、ジャンプ先が後から埋められる。
    fn conditionals_patch_jump_targets() {
        let bc = compile_src("if (true) { 10 }; 3333;").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::True, &[]),
                make(Opcode::JumpNotTruthy, &[10]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Jump, &[11]),
                make(Opcode::Null, &[]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );

        let bc = compile_src("if (true) { 10 } else { 20 }; 3333;").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::True, &[]),
                make(Opcode::JumpNotTruthy, &[10]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Jump, &[13]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[2]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn empty_branch_pushes_null() {
        let bc = compile_src("if (true) { }").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::True, &[]),
                make(Opcode::JumpNotTruthy, &[8]),
                make(Opcode::Null, &[]),
                make(Opcode::Jump, &[9]),
                make(Opcode::Null, &[]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn global_let_statements() {
        let bc = compile_src("let one = 1; let two = one; two;").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::SetGlobal, &[0]),
                make(Opcode::GetGlobal, &[0]),
                make(Opcode::SetGlobal, &[1]),
                make(Opcode::GetGlobal, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn collections_and_index() {
        let bc = compile_src("[1, 2][0]; {1: 2}").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Array, &[2]),
                make(Opcode::Constant, &[2]),
                make(Opcode::Index, &[]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[3]),
                make(Opcode::Constant, &[4]),
                make(Opcode::Hash, &[2]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    /// 関数本体の最後の式が戻り値になり、本体が定数として格納される。
    fn functions_with_implicit_return() {
        let bc = compile_src("fn() { 5 + 10 }").unwrap();
        let func = function_at(&bc.constants, 2);
        assert_instructions(
            &func.instructions,
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::ReturnValue, &[]),
            ],
        );
        assert_instructions(
            &bc.instructions,
            vec![make(Opcode::Closure, &[2, 0]), make(Opcode::Pop, &[])],
        );

        let bc = compile_src("fn() { }").unwrap();
        let func = function_at(&bc.constants, 0);
        assert_instructions(&func.instructions, vec![make(Opcode::Return, &[])]);
    }

    #[test]
    fn locals_and_arguments() {
        let bc = compile_src("fn(a) { let b = a; b }(1)").unwrap();
        let func = function_at(&bc.constants, 0);
        assert_eq!(func.num_locals, 2);
        assert_eq!(func.num_parameters, 1);
        assert_instructions(
            &func.instructions,
            vec![
                make(Opcode::GetLocal, &[0]),
                make(Opcode::SetLocal, &[1]),
                make(Opcode::GetLocal, &[1]),
                make(Opcode::ReturnValue, &[]),
            ],
        );
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Closure, &[0, 0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Call, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    fn builtins_resolve_to_fixed_indices() {
        let bc = compile_src("len([]); push([], 1);").unwrap();
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::GetBuiltin, &[0]),
                make(Opcode::Array, &[0]),
                make(Opcode::Call, &[1]),
                make(Opcode::Pop, &[]),
                make(Opcode::GetBuiltin, &[5]),
                make(Opcode::Array, &[0]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Call, &[2]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    /// 外側関数のローカル変数が自由変数として捕捉される。
    fn closures_capture_free_variables() {
        let bc = compile_src("fn(a) { fn(b) { a + b } }").unwrap();
        let inner = function_at(&bc.constants, 0);
        assert_instructions(
            &inner.instructions,
            vec![
                make(Opcode::GetFree, &[0]),
                make(Opcode::GetLocal, &[0]),
                make(Opcode::Add, &[]),
                make(Opcode::ReturnValue, &[]),
            ],
        );
        let outer = function_at(&bc.constants, 1);
        assert_instructions(
            &outer.instructions,
            vec![
                make(Opcode::GetLocal, &[0]),
                make(Opcode::Closure, &[0, 1]),
                make(Opcode::ReturnValue, &[]),
            ],
        );
    }

    #[test]
    fn recursive_function_uses_current_closure() {
        let bc =
            compile_src("let countDown = fn(x) { countDown(x - 1); }; countDown(1);").unwrap();
        let func = function_at(&bc.constants, 1);
        assert_instructions(
            &func.instructions,
            vec![
                make(Opcode::CurrentClosure, &[]),
                make(Opcode::GetLocal, &[0]),
                make(Opcode::Constant, &[0]),
                make(Opcode::Sub, &[]),
                make(Opcode::Call, &[1]),
                make(Opcode::ReturnValue, &[]),
            ],
        );
        assert_instructions(
            &bc.instructions,
            vec![
                make(Opcode::Closure, &[1, 0]),
                make(Opcode::SetGlobal, &[0]),
                make(Opcode::GetGlobal, &[0]),
                make(Opcode::Constant, &[2]),
                make(Opcode::Call, &[1]),
                make(Opcode::Pop, &[]),
            ],
        );
    }

    #[test]
    /// 未定義変数は位置付きのコンパイルエラーになる。
    fn undefined_variable_is_an_error() {
        let err = compile_src("let a = 1; a + foobar").unwrap_err();
        assert_eq!(err.message(), "undefined variable foobar");
        assert_eq!(
            err.to_string(),
            "[CMP001] undefined variable foobar @line=1,col=16"
        );
    }

    #[test]
    /// 状態を引き継いだコンパイラは前回の定義を解決できる。
    fn state_carries_globals_between_compilers() {
        let mut first = Compiler::new();
        first.compile(&parse("let x = 5;").unwrap()).unwrap();
        let state = first.into_state();
        assert_eq!(state.constants.len(), 1);

        let mut second = Compiler::new_with_state(state);
        second.compile(&parse("x").unwrap()).unwrap();
        let bc = second.bytecode();
        assert_instructions(
            &bc.instructions,
            vec![make(Opcode::GetGlobal, &[0]), make(Opcode::Pop, &[])],
        );
    }
}
