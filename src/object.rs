// パス: src/object.rs
// 役割: VM が扱う実行時値と、その表示（inspect）・ハッシュキー化を定義する
// 意図: コンパイラの定数プールと VM スタックで同じ値表現を共有する
// 関連ファイル: src/vm/mod.rs, src/builtins.rs, src/repl/printer.rs
//! 実行時値
//!
//! - 配列・ハッシュ・関数などのヒープ値は `Rc` で共有し、スタック操作を安価に保つ。
//! - ハッシュは `BTreeMap` に格納し、表示順を決定的にする。

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::builtins::Builtin;
use crate::code::Instructions;

#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    Str(Rc<str>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<BTreeMap<HashKey, HashPair>>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
}

/// ハッシュのキーとして使える値。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
}

/// 表示用に元のキー値を保持したハッシュ要素。
#[derive(Clone, Debug)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// コンパイル済み関数本体。
#[derive(Debug, Default)]
pub struct CompiledFunction {
    pub instructions: Rc<Instructions>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// 関数と捕捉した自由変数の組。
#[derive(Debug)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Str(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// REPL が表示する正準テキスト。
    pub fn inspect(&self) -> String {
        self.to_string()
    }

    /// 条件分岐での真偽。`false` と `null` のみ偽。
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// ハッシュキーに変換する。キーにできない型は `None`。
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(i) => Some(HashKey::Integer(*i)),
            Value::Boolean(b) => Some(HashKey::Boolean(*b)),
            Value::Str(s) => Some(HashKey::Str(Rc::clone(s))),
            _ => None,
        }
    }

    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }
}

/// `==` / `!=` の比較。スカラーと文字列は値で、その他のヒープ値は同一性で比べる。
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Hash(pairs) => {
                let parts: Vec<String> = pairs
                    .values()
                    .map(|p| format!("{}: {}", p.key, p.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::CompiledFunction(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Value::Closure(cl) => write!(f, "Closure[{:p}]", Rc::as_ptr(cl)),
            Value::Builtin(_) => f.write_str("builtin function"),
        }
    }
}
