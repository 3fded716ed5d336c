// パス: src/compiler/symbol_table.rs
// 役割: 名前解決用のスコープ付きシンボル表
// 意図: グローバル・ローカル・組み込み・自由変数の区別をコンパイラから分離する
// 関連ファイル: src/compiler/mod.rs, src/builtins.rs

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    Function,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// 1 スコープ分のシンボル表。外側のスコープを所有して入れ子を表現する。
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `outer` を外側に持つ新しいスコープを作る。
    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// 内側スコープを外し、外側のシンボル表を返す。
    pub fn take_outer(&mut self) -> Option<SymbolTable> {
        self.outer.take().map(|b| *b)
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// 関数自身の名前（再帰呼び出し用）を定義する。
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// 名前を解決する。外側スコープのローカル変数は自由変数として取り込む。
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol {
            name: name.into(),
            scope,
            index,
        }
    }

    #[test]
    /// グローバルとローカルで添字が独立に採番される。
    fn define_assigns_scope_and_index() {
        let mut global = SymbolTable::new();
        assert_eq!(global.define("a"), sym("a", SymbolScope::Global, 0));
        assert_eq!(global.define("b"), sym("b", SymbolScope::Global, 1));
        let mut local = SymbolTable::new_enclosed(global);
        assert_eq!(local.define("c"), sym("c", SymbolScope::Local, 0));
        assert_eq!(local.resolve("a"), Some(sym("a", SymbolScope::Global, 0)));
        assert_eq!(local.resolve("missing"), None);
    }

    #[test]
    fn builtins_resolve_from_any_depth() {
        let mut global = SymbolTable::new();
        global.define_builtin(3, "last");
        let first = SymbolTable::new_enclosed(global);
        let mut second = SymbolTable::new_enclosed(first);
        assert_eq!(
            second.resolve("last"),
            Some(sym("last", SymbolScope::Builtin, 3))
        );
        assert!(second.free_symbols().is_empty());
    }

    #[test]
    /// 外側関数のローカルは内側で自由変数になり、元のシンボルが記録される。
    fn outer_locals_become_free_symbols() {
        let mut global = SymbolTable::new();
        global.define("g");
        let mut first = SymbolTable::new_enclosed(global);
        first.define("a");
        let mut second = SymbolTable::new_enclosed(first);
        second.define("b");

        assert_eq!(second.resolve("g"), Some(sym("g", SymbolScope::Global, 0)));
        assert_eq!(second.resolve("a"), Some(sym("a", SymbolScope::Free, 0)));
        assert_eq!(second.resolve("b"), Some(sym("b", SymbolScope::Local, 0)));
        assert_eq!(second.free_symbols(), &[sym("a", SymbolScope::Local, 0)]);
    }

    #[test]
    fn function_name_is_shadowed_by_later_definition() {
        let mut global = SymbolTable::new();
        global.define_function_name("f");
        assert_eq!(global.resolve("f"), Some(sym("f", SymbolScope::Function, 0)));
        global.define("f");
        assert_eq!(global.resolve("f"), Some(sym("f", SymbolScope::Global, 0)));
    }

    #[test]
    fn take_outer_restores_enclosing_scope() {
        let mut global = SymbolTable::new();
        global.define("x");
        let mut local = SymbolTable::new_enclosed(global);
        let mut restored = local.take_outer().expect("outer");
        assert!(local.take_outer().is_none());
        assert!(restored.take_outer().is_none());
        assert_eq!(restored.resolve("x").map(|s| s.index), Some(0));
    }
}
