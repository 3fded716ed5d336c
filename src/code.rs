// パス: src/code.rs
// 役割: バイトコード命令セットのエンコード・デコードと逆アセンブルを提供する
// 意図: コンパイラと VM が同じ命令定義（オペランド幅）を共有できるようにする
// 関連ファイル: src/compiler/mod.rs, src/vm/mod.rs, src/object.rs
//! 命令は 1 バイトのオペコードと、ビッグエンディアンの固定幅オペランドで構成する。

use std::fmt;

use crate::object::Value;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Constant,
    Add,
    Pop,
    Sub,
    Mul,
    Div,
    True,
    False,
    Equal,
    NotEqual,
    GreaterThan,
    Minus,
    Bang,
    JumpNotTruthy,
    Jump,
    Null,
    GetGlobal,
    SetGlobal,
    Array,
    Hash,
    Index,
    Call,
    ReturnValue,
    Return,
    GetLocal,
    SetLocal,
    GetBuiltin,
    Closure,
    GetFree,
    CurrentClosure,
}

const ALL_OPCODES: [Opcode; 30] = [
    Opcode::Constant,
    Opcode::Add,
    Opcode::Pop,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::True,
    Opcode::False,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::Minus,
    Opcode::Bang,
    Opcode::JumpNotTruthy,
    Opcode::Jump,
    Opcode::Null,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::Array,
    Opcode::Hash,
    Opcode::Index,
    Opcode::Call,
    Opcode::ReturnValue,
    Opcode::Return,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::GetBuiltin,
    Opcode::Closure,
    Opcode::GetFree,
    Opcode::CurrentClosure,
];

/// オペコードの表示名とオペランド幅（バイト数）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        ALL_OPCODES.get(byte as usize).copied()
    }

    pub fn definition(self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            Opcode::Constant => ("OpConstant", &[2]),
            Opcode::Add => ("OpAdd", &[]),
            Opcode::Pop => ("OpPop", &[]),
            Opcode::Sub => ("OpSub", &[]),
            Opcode::Mul => ("OpMul", &[]),
            Opcode::Div => ("OpDiv", &[]),
            Opcode::True => ("OpTrue", &[]),
            Opcode::False => ("OpFalse", &[]),
            Opcode::Equal => ("OpEqual", &[]),
            Opcode::NotEqual => ("OpNotEqual", &[]),
            Opcode::GreaterThan => ("OpGreaterThan", &[]),
            Opcode::Minus => ("OpMinus", &[]),
            Opcode::Bang => ("OpBang", &[]),
            Opcode::JumpNotTruthy => ("OpJumpNotTruthy", &[2]),
            Opcode::Jump => ("OpJump", &[2]),
            Opcode::Null => ("OpNull", &[]),
            Opcode::GetGlobal => ("OpGetGlobal", &[2]),
            Opcode::SetGlobal => ("OpSetGlobal", &[2]),
            Opcode::Array => ("OpArray", &[2]),
            Opcode::Hash => ("OpHash", &[2]),
            Opcode::Index => ("OpIndex", &[]),
            Opcode::Call => ("OpCall", &[1]),
            Opcode::ReturnValue => ("OpReturnValue", &[]),
            Opcode::Return => ("OpReturn", &[]),
            Opcode::GetLocal => ("OpGetLocal", &[1]),
            Opcode::SetLocal => ("OpSetLocal", &[1]),
            Opcode::GetBuiltin => ("OpGetBuiltin", &[1]),
            Opcode::Closure => ("OpClosure", &[2, 1]),
            Opcode::GetFree => ("OpGetFree", &[1]),
            Opcode::CurrentClosure => ("OpCurrentClosure", &[]),
        };
        Definition {
            name,
            operand_widths,
        }
    }
}

/// 命令をエンコードする。オペランドは定義の幅に切り詰めて書き込む。
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    let len = 1 + def.operand_widths.iter().sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.push(op as u8);
    for (operand, width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => out.extend_from_slice(&(*operand as u16).to_be_bytes()),
            1 => out.push(*operand as u8),
            _ => {}
        }
    }
    out
}

/// オペランド列をデコードし、読み取ったバイト数と共に返す。
/// 命令列が途中で切れている場合は `None`。
pub fn read_operands(def: &Definition, ins: &[u8]) -> Option<(Vec<usize>, usize)> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;
    for width in def.operand_widths {
        match width {
            2 => operands.push(read_u16(ins, offset)? as usize),
            1 => operands.push(read_u8(ins, offset)? as usize),
            _ => {}
        }
        offset += width;
    }
    Some((operands, offset))
}

pub fn read_u16(ins: &[u8], offset: usize) -> Option<u16> {
    let bytes = ins.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn read_u8(ins: &[u8], offset: usize) -> Option<u8> {
    ins.get(offset).copied()
}

/// 連結された命令列。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instructions(pub Vec<u8>);

impl Instructions {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<Vec<u8>>> for Instructions {
    fn from(parts: Vec<Vec<u8>>) -> Self {
        Self(parts.concat())
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut i = 0;
        while i < self.0.len() {
            let Some(op) = Opcode::from_byte(self.0[i]) else {
                writeln!(f, "ERROR: opcode {} undefined", self.0[i])?;
                i += 1;
                continue;
            };
            let def = op.definition();
            let Some((operands, read)) = read_operands(&def, &self.0[i + 1..]) else {
                writeln!(f, "{:04} ERROR: {} truncated", i, def.name)?;
                break;
            };
            let rendered: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
            if rendered.is_empty() {
                writeln!(f, "{:04} {}", i, def.name)?;
            } else {
                writeln!(f, "{:04} {} {}", i, def.name, rendered.join(" "))?;
            }
            i += 1 + read;
        }
        Ok(())
    }
}

/// コンパイル結果。VM はこれ 1 つから構築される。
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}
