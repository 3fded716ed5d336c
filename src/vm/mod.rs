// パス: src/vm/mod.rs
// 役割: バイトコードを実行するスタックマシン
// 意図: 1 行分のバイトコードを独立に実行し、最後に取り出した値を結果として返す
// 関連ファイル: src/vm/frame.rs, src/code.rs, src/object.rs, src/builtins.rs
//! 仮想マシン
//!
//! 仕様要点:
//! - 「結果」はメインループ終了時点でスタックポインタの直上に残っている値（最後に pop した値）。
//!   何も積まれなかった場合は `null`。
//! - 整数演算はラップアラウンドする。0 除算は実行時エラー。
//! - トップレベルの `return` は実行を終了し、その値を結果とする。
//! - 実行時間は既定で無制限。`with_step_limit` を指定した場合のみ命令数で打ち切る。

mod frame;

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::trace;

use crate::builtins::{Builtin, BUILTINS};
use crate::code::{read_operands, Bytecode, Opcode};
use crate::errors::RuntimeError;
use crate::object::{Closure, CompiledFunction, HashPair, Value};

pub use frame::Frame;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize, // 常に次の空きスロットを指す。スタック先頭は stack[sp - 1]
    globals: Vec<Value>,
    frames: Vec<Frame>,
    console: String,
    step_limit: Option<u64>,
    steps: u64,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::new_with_globals(bytecode, Vec::new())
    }

    /// 既存のグローバル領域を引き継いで VM を構築する（`--persist` 用）。
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_fn = CompiledFunction {
            instructions: Rc::new(bytecode.instructions),
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Rc::new(Closure {
            func: Rc::new(main_fn),
            free: Vec::new(),
        });
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));
        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
            console: String::new(),
            step_limit: None,
            steps: 0,
        }
    }

    /// 実行できる命令数の上限を設定する。`None` は無制限。
    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    /// 最後にスタックから取り出した値。
    pub fn last_popped_stack_elem(&self) -> Value {
        self.stack.get(self.sp).cloned().unwrap_or(Value::Null)
    }

    /// `puts` が書き込んだテキストを取り出す。
    pub fn take_console(&mut self) -> String {
        std::mem::take(&mut self.console)
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let (ins, ip) = match self.frames.last() {
                Some(frame) => (Rc::clone(frame.instructions()), frame.ip),
                None => return Ok(()),
            };
            let bytes = ins.as_bytes();
            if ip >= bytes.len() {
                if self.frames.len() == 1 {
                    return Ok(());
                }
                return Err(malformed("function body ended without return"));
            }
            self.tick()?;

            let op = Opcode::from_byte(bytes[ip])
                .ok_or_else(|| malformed(format!("opcode {} undefined", bytes[ip])))?;
            let def = op.definition();
            let (operands, read) = read_operands(&def, &bytes[ip + 1..])
                .ok_or_else(|| malformed(format!("{} operands truncated", def.name)))?;
            trace!(ip, op = def.name, sp = self.sp, "exec");
            self.set_ip(ip + 1 + read);

            if let ControlFlow::Break(()) = self.execute(op, &operands)? {
                return Ok(());
            }
        }
    }

    fn execute(&mut self, op: Opcode, operands: &[usize]) -> Result<ControlFlow<()>, RuntimeError> {
        let operand = |i: usize| operands.get(i).copied().unwrap_or(0);
        match op {
            Opcode::Constant => {
                let value = self
                    .constants
                    .get(operand(0))
                    .cloned()
                    .ok_or_else(|| malformed(format!("constant {} missing", operand(0))))?;
                self.push(value)?;
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                self.execute_binary_operation(op)?
            }
            Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                self.execute_comparison(op)?
            }
            Opcode::Bang => {
                let value = self.pop()?;
                self.push(Value::Boolean(!value.is_truthy()))?;
            }
            Opcode::Minus => {
                match self.pop()? {
                    Value::Integer(i) => self.push(Value::Integer(i.wrapping_neg()))?,
                    other => {
                        return Err(RuntimeError::new(
                            "VM005",
                            format!("unsupported type for negation: {}", other.type_name()),
                        ))
                    }
                }
            }
            Opcode::True => self.push(Value::Boolean(true))?,
            Opcode::False => self.push(Value::Boolean(false))?,
            Opcode::Null => self.push(Value::Null)?,
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Jump => self.set_ip(operand(0)),
            Opcode::JumpNotTruthy => {
                let condition = self.pop()?;
                if !condition.is_truthy() {
                    self.set_ip(operand(0));
                }
            }
            Opcode::SetGlobal => {
                let value = self.pop()?;
                let idx = operand(0);
                if idx >= GLOBALS_SIZE {
                    return Err(malformed(format!("global {idx} out of range")));
                }
                if idx >= self.globals.len() {
                    self.globals.resize(idx + 1, Value::Null);
                }
                self.globals[idx] = value;
            }
            Opcode::GetGlobal => {
                let value = self.globals.get(operand(0)).cloned().unwrap_or(Value::Null);
                self.push(value)?;
            }
            Opcode::SetLocal => {
                let slot = self.frame()?.base_pointer + operand(0);
                let value = self.pop()?;
                self.stack[slot] = value;
            }
            Opcode::GetLocal => {
                let slot = self.frame()?.base_pointer + operand(0);
                let value = self.stack[slot].clone();
                self.push(value)?;
            }
            Opcode::GetBuiltin => {
                let builtin = BUILTINS
                    .get(operand(0))
                    .ok_or_else(|| malformed(format!("builtin {} undefined", operand(0))))?;
                self.push(Value::Builtin(builtin))?;
            }
            Opcode::GetFree => {
                let value = self
                    .frame()?
                    .closure
                    .free
                    .get(operand(0))
                    .cloned()
                    .ok_or_else(|| malformed(format!("free variable {} missing", operand(0))))?;
                self.push(value)?;
            }
            Opcode::CurrentClosure => {
                let closure = Rc::clone(&self.frame()?.closure);
                self.push(Value::Closure(closure))?;
            }
            Opcode::Array => {
                let items = self.take_top(operand(0))?;
                self.push(Value::array(items))?;
            }
            Opcode::Hash => {
                let items = self.take_top(operand(0))?;
                let hash = build_hash(items)?;
                self.push(hash)?;
            }
            Opcode::Index => {
                let index = self.pop()?;
                let left = self.pop()?;
                let value = execute_index(&left, &index)?;
                self.push(value)?;
            }
            Opcode::Call => self.execute_call(operand(0))?,
            Opcode::Closure => self.push_closure(operand(0), operand(1))?,
            Opcode::ReturnValue => {
                let value = self.pop()?;
                if self.frames.len() == 1 {
                    // トップレベルの return: pop 済みの値がそのまま結果になる
                    return Ok(ControlFlow::Break(()));
                }
                self.return_from_frame(value)?;
            }
            Opcode::Return => {
                if self.frames.len() == 1 {
                    return Ok(ControlFlow::Break(()));
                }
                self.return_from_frame(Value::Null)?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => Value::Integer(integer_op(op, *l, *r)?),
            (Value::Str(l), Value::Str(r)) => {
                if op != Opcode::Add {
                    return Err(RuntimeError::new(
                        "VM003",
                        format!("unknown string operator: {}", op.definition().name),
                    ));
                }
                let mut s = String::with_capacity(l.len() + r.len());
                s.push_str(l);
                s.push_str(r);
                Value::string(&s)
            }
            _ => {
                return Err(RuntimeError::new(
                    "VM001",
                    format!(
                        "unsupported types for binary operation: {} {}",
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }
        };
        self.push(result)
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = match (op, &left, &right) {
            (Opcode::GreaterThan, Value::Integer(l), Value::Integer(r)) => l > r,
            (Opcode::Equal, _, _) => left == right,
            (Opcode::NotEqual, _, _) => left != right,
            _ => {
                return Err(RuntimeError::new(
                    "VM004",
                    format!(
                        "unknown operator: {} ({} {})",
                        op.definition().name,
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }
        };
        self.push(Value::Boolean(result))
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        let callee_slot = self
            .sp
            .checked_sub(num_args + 1)
            .ok_or_else(|| malformed("call without callee"))?;
        match self.stack[callee_slot].clone() {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            other => Err(RuntimeError::new(
                "VM008",
                format!(
                    "calling non-function and non-built-in: {}",
                    other.type_name()
                ),
            )),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<(), RuntimeError> {
        let func = Rc::clone(&closure.func);
        if num_args != func.num_parameters {
            return Err(RuntimeError::new(
                "VM009",
                format!(
                    "wrong number of arguments: want={}, got={}",
                    func.num_parameters, num_args
                ),
            ));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::new(
                "VM011",
                format!("stack overflow: call depth exceeds {MAX_FRAMES} frames"),
            ));
        }
        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + func.num_locals;
        if new_sp >= STACK_SIZE {
            return Err(stack_overflow());
        }
        for slot in &mut self.stack[self.sp..new_sp] {
            *slot = Value::Null;
        }
        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = new_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, num_args: usize) -> Result<(), RuntimeError> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args, &mut self.console)?;
        self.sp -= num_args + 1;
        self.push(result)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<(), RuntimeError> {
        let func = match self.constants.get(const_index) {
            Some(Value::CompiledFunction(func)) => Rc::clone(func),
            Some(other) => {
                return Err(RuntimeError::new(
                    "VM013",
                    format!("not a function: {}", other.inspect()),
                ))
            }
            None => return Err(malformed(format!("constant {const_index} missing"))),
        };
        let free = self.take_top(num_free)?;
        self.push(Value::Closure(Rc::new(Closure { func, free })))
    }

    fn return_from_frame(&mut self, value: Value) -> Result<(), RuntimeError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| malformed("return without frame"))?;
        // 呼び出し対象（クロージャ）のスロットごと捨てる
        self.sp = frame
            .base_pointer
            .checked_sub(1)
            .ok_or_else(|| malformed("return below stack base"))?;
        self.push(value)
    }

    fn take_top(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let start = self
            .sp
            .checked_sub(count)
            .ok_or_else(|| malformed("stack underflow"))?;
        let items = self.stack[start..self.sp].to_vec();
        self.sp = start;
        Ok(items)
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(stack_overflow());
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// 値はスロットに残したまま sp だけ下げる（`last_popped_stack_elem` が参照する）。
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.sp == 0 {
            return Err(malformed("stack underflow"));
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames.last().ok_or_else(|| malformed("no active frame"))
    }

    fn set_ip(&mut self, ip: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = ip;
        }
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if let Some(limit) = self.step_limit {
            if self.steps > limit {
                return Err(RuntimeError::new(
                    "VM090",
                    format!("execution aborted after {limit} instructions (step limit)"),
                ));
            }
        }
        Ok(())
    }
}

fn integer_op(op: Opcode, l: i64, r: i64) -> Result<i64, RuntimeError> {
    match op {
        Opcode::Add => Ok(l.wrapping_add(r)),
        Opcode::Sub => Ok(l.wrapping_sub(r)),
        Opcode::Mul => Ok(l.wrapping_mul(r)),
        Opcode::Div if r == 0 => Err(RuntimeError::new("VM012", "division by zero")),
        Opcode::Div => Ok(l.wrapping_div(r)),
        other => Err(RuntimeError::new(
            "VM002",
            format!("unknown integer operator: {}", other.definition().name),
        )),
    }
}

fn build_hash(items: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut pairs = BTreeMap::new();
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let hash_key = key.hash_key().ok_or_else(|| unusable_hash_key(&key))?;
        pairs.insert(hash_key, HashPair { key, value });
    }
    Ok(Value::Hash(Rc::new(pairs)))
}

fn execute_index(left: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (left, index) {
        (Value::Array(items), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Hash(pairs), _) => {
            let key = index.hash_key().ok_or_else(|| unusable_hash_key(index))?;
            Ok(pairs
                .get(&key)
                .map(|p| p.value.clone())
                .unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::new(
            "VM007",
            format!("index operator not supported: {}", left.type_name()),
        )),
    }
}

fn unusable_hash_key(key: &Value) -> RuntimeError {
    RuntimeError::new(
        "VM006",
        format!("unusable as hash key: {}", key.type_name()),
    )
}

fn stack_overflow() -> RuntimeError {
    RuntimeError::new("VM010", "stack overflow")
}

fn malformed(msg: impl Into<String>) -> RuntimeError {
    RuntimeError::new("VM099", format!("malformed bytecode: {}", msg.into()))
}
