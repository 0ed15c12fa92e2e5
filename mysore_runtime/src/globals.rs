//! The global symbol table.
//!
//! Globals live in rooted value cells so a global holding a heap object
//! is always a collector root. The cell list is append-only and every
//! cell is boxed, so cell addresses handed out to the evaluator and the
//! code generator stay valid for the life of the table.

use mysore_core::Obj;
use mysore_gc::Value;
use rustc_hash::FxHashMap;

/// Name → rooted cell mapping for the top-level scope.
///
/// The first write to an unknown name at the top level creates its cell;
/// a declaration with no initializer creates the cell holding null.
#[derive(Default)]
pub struct Globals {
    /// The cells. Boxed for address stability; never removed.
    cells: Vec<Box<Value>>,
    /// Name → index into `cells`.
    symbols: FxHashMap<String, usize>,
}

impl Globals {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to a name, if any.
    pub fn get(&self, name: &str) -> Option<Obj> {
        self.symbols.get(name).map(|&index| self.cells[index].get())
    }

    /// Whether a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Bind a name, creating its cell on first use.
    pub fn set(&mut self, name: &str, value: Obj) {
        let cell = self.cell_mut(name);
        cell.set(value);
    }

    /// The address of a name's stored word, for symbol-table reads.
    /// Returns `None` for unbound names.
    pub fn address_of(&mut self, name: &str) -> Option<*mut Obj> {
        let &index = self.symbols.get(name)?;
        Some(self.cells[index].address())
    }

    /// The cell for a name, created holding null if absent. The pointer
    /// stays valid for the life of the table; writes through it must use
    /// [`Value::set`] so root transitions hold.
    pub fn cell_ptr(&mut self, name: &str) -> *mut Value {
        self.cell_mut(name) as *mut Value
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn cell_mut(&mut self, name: &str) -> &mut Value {
        if let Some(&index) = self.symbols.get(name) {
            return &mut self.cells[index];
        }
        let index = self.cells.len();
        self.cells.push(Box::new(Value::new()));
        self.symbols.insert(name.to_string(), index);
        &mut self.cells[index]
    }
}

impl std::fmt::Debug for Globals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Globals")
            .field("bindings", &self.symbols.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::string_new;
    use mysore_gc::{collect, heap_stats};

    #[test]
    fn test_first_write_creates_global() {
        let mut globals = Globals::new();
        assert!(!globals.contains("x"));
        globals.set("x", Obj::from_integer(5));
        assert!(globals.contains("x"));
        assert_eq!(globals.get("x").unwrap().as_integer(), 5);
    }

    #[test]
    fn test_addresses_are_stable_across_growth() {
        let mut globals = Globals::new();
        globals.set("first", Obj::from_integer(1));
        let addr = globals.address_of("first").unwrap();
        for i in 0..100 {
            globals.set(&format!("g{}", i), Obj::from_integer(i));
        }
        assert_eq!(globals.address_of("first").unwrap(), addr);
        assert_eq!(unsafe { *addr }.as_integer(), 1);
    }

    #[test]
    fn test_globals_root_heap_values() {
        let mut globals = Globals::new();
        globals.set("s", string_new("persistent"));
        let before = heap_stats().live_objects;
        collect();
        // Neither the string nor the root slot was swept.
        assert_eq!(heap_stats().live_objects, before);
        assert!(globals.get("s").unwrap().needs_gc());
    }
}
