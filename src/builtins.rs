// パス: src/builtins.rs
// 役割: 組み込み関数の一覧と実装を集約する
// 意図: コンパイラ（シンボル定義）と VM（呼び出し）で同じ並び順を共有する
// 関連ファイル: src/compiler/mod.rs, src/vm/mod.rs, src/object.rs
//! 組み込み関数モジュール
//!
//! - `BUILTINS` の添字がそのまま `OpGetBuiltin` のオペランドになる。並び順を変えないこと。
//! - 引数エラーは実行時エラーとして VM へ返す。
//! - `puts` はプロセスの標準出力ではなく、VM のコンソールバッファへ書き込む。

use std::fmt;
use std::rc::Rc;

use crate::errors::RuntimeError;
use crate::object::Value;

/// 組み込み関数のシグネチャ。第 2 引数は `puts` の出力先。
pub type BuiltinFn = fn(&[Value], &mut String) -> Result<Value, RuntimeError>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

/// 言語が標準で提供する組み込み関数の一覧。
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

fn check_arity(args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::new(
            "VM020",
            format!(
                "wrong number of arguments. got={}, want={}",
                args.len(),
                want
            ),
        ));
    }
    Ok(())
}

fn expect_array<'v>(name: &str, arg: &'v Value) -> Result<&'v Rc<Vec<Value>>, RuntimeError> {
    match arg {
        Value::Array(items) => Ok(items),
        other => Err(RuntimeError::new(
            "VM021",
            format!(
                "argument to `{}` must be ARRAY, got {}",
                name,
                other.type_name()
            ),
        )),
    }
}

fn builtin_len(args: &[Value], _console: &mut String) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Integer(s.len() as i64)),
        Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
        other => Err(RuntimeError::new(
            "VM021",
            format!("argument to `len` not supported, got {}", other.type_name()),
        )),
    }
}

fn builtin_puts(args: &[Value], console: &mut String) -> Result<Value, RuntimeError> {
    for arg in args {
        console.push_str(&arg.inspect());
        console.push('\n');
    }
    Ok(Value::Null)
}

fn builtin_first(args: &[Value], _console: &mut String) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let items = expect_array("first", &args[0])?;
    Ok(items.first().cloned().unwrap_or(Value::Null))
}

fn builtin_last(args: &[Value], _console: &mut String) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let items = expect_array("last", &args[0])?;
    Ok(items.last().cloned().unwrap_or(Value::Null))
}

fn builtin_rest(args: &[Value], _console: &mut String) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let items = expect_array("rest", &args[0])?;
    if items.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::array(items[1..].to_vec()))
}

fn builtin_push(args: &[Value], _console: &mut String) -> Result<Value, RuntimeError> {
    check_arity(args, 2)?;
    let items = expect_array("push", &args[0])?;
    let mut out = Vec::with_capacity(items.len() + 1);
    out.extend(items.iter().cloned());
    out.push(args[1].clone());
    Ok(Value::array(out))
}
