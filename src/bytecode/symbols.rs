//! Symbol resolution: nested lexical scopes assigning each name a stable
//! slot index.

use std::collections::HashMap;

/// Where a symbol lives, which decides the load/store opcode for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Top-level binding, addressed into the globals array.
    Global,
    /// Frame-relative binding inside a function.
    Local,
    /// Entry in the fixed builtin table.
    Builtin,
    /// Captured from an enclosing function into a closure.
    Free,
    /// The function currently being compiled, for self-reference.
    Function,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope, linked to its enclosing scope.
///
/// `free_symbols` records, in capture order, the enclosing-scope symbols
/// this scope reaches for; their position is the `GetFree` index.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `outer` in a fresh inner scope.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Tear down this scope and hand back its enclosing scope.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|boxed| *boxed)
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Number of Local definitions in this scope; the compiled function's
    /// `num_locals`.
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    /// Bind a name in this scope at the next free index.
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
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Register a builtin at its fixed table index.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind the name of the function whose body is being compiled, so the
    /// body can call itself via `CurrentClosure`.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Record a capture of `original` from the enclosing scope; later
    /// resolutions of the name in this scope hit the cached Free symbol.
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

    /// Look a name up through the scope chain. Globals and builtins pass
    /// through untouched; anything else found in an outer scope is
    /// registered here as a Free capture.
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
