// パス: src/vm/frame.rs
// 役割: 関数呼び出し 1 回分の実行位置とスタック基点を保持する
// 意図: VM 本体から呼び出し管理の細部を切り離す
// 関連ファイル: src/vm/mod.rs, src/object.rs

use std::rc::Rc;

use crate::code::Instructions;
use crate::object::Closure;

#[derive(Debug)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    /// 引数・ローカル変数領域の先頭（スタック上の位置）。
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Rc<Instructions> {
        &self.closure.func.instructions
    }
}
