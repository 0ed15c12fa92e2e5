//! The interpreter context: scopes, the return signal, and tier
//! statistics.

use mysore_core::{Obj, RuntimeError};
use mysore_parser::Statements;
use mysore_runtime::Globals;
use rustc_hash::FxHashMap;
use std::cell::Cell;

/// Interpreted entries of a declaration before the code generator is
/// invoked for it.
pub const DEFAULT_COMPILE_THRESHOLD: u32 = 10;

/// One activation's name bindings: name → address of the storage the
/// name currently means. Entries point into caller argument arrays,
/// closure bound-variable slots, instance-variable slots, or context
/// cells: all storage that outlives the frame.
pub type SymbolTable = FxHashMap<String, *mut Obj>;

/// Execution counters, in the spirit of a dispatch-statistics block.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpStats {
    /// Closure/method bodies actually run by the tree walker.
    pub tree_walk_entries: u64,
    /// Entries that found compiled code from the interpreted path and
    /// dispatched to it.
    pub compiled_dispatches: u64,
    /// Successful code-generator invocations.
    pub compilations: u64,
}

/// The interpreter context.
///
/// One per driver; lives for the whole session. Holds the global symbol
/// table, the stack of local frames, the return signal, and the tier
/// configuration.
pub struct Context {
    /// Top-level bindings, in rooted cells.
    pub globals: Globals,
    /// Stack of local frames. Raw pointers: each frame is owned by the
    /// invocation that pushed it and outlives its stack entry.
    symbols: Vec<*mut SymbolTable>,
    /// Value carried by an executing `return`.
    pub ret_val: Obj,
    /// Set by `return`; statement blocks stop as soon as they see it.
    pub is_returning: bool,
    /// Interpreted entries before a declaration is handed to the code
    /// generator.
    pub compile_threshold: u32,
    /// Tier counters.
    pub stats: InterpStats,
}

impl Context {
    /// Create a context and register this interpreter's trampolines as
    /// the thread's trampoline provider.
    pub fn new() -> Self {
        mysore_runtime::trampolines::set_trampoline_provider(
            crate::trampoline::closure_trampoline,
        );
        Self {
            globals: Globals::new(),
            symbols: Vec::new(),
            ret_val: Obj::NULL,
            is_returning: false,
            compile_threshold: DEFAULT_COMPILE_THRESHOLD,
            stats: InterpStats::default(),
        }
    }

    /// Interpret a top-level statement block.
    ///
    /// The return signal is cleared afterwards so a stray top-level
    /// `return` cannot poison later blocks in the same session.
    pub fn interpret(&mut self, block: &Statements) -> Result<(), RuntimeError> {
        let result = crate::eval::interpret_statements(self, block);
        self.ret_val = Obj::NULL;
        self.is_returning = false;
        result
    }

    /// Resolve a name to the address of its storage: the top local
    /// frame first, then the globals. Bound variables of the running
    /// closure are already in the top frame, so deeper frames are never
    /// consulted.
    pub fn lookup_symbol(&mut self, name: &str) -> Option<*mut Obj> {
        if let Some(&frame) = self.symbols.last() {
            if let Some(&address) = unsafe { (*frame).get(name) } {
                return Some(address);
            }
        }
        self.globals.address_of(name)
    }

    /// Assign to a name. A resolved local is written through its
    /// binding; anything else goes to the globals, where the first
    /// write creates the cell.
    pub fn set_symbol(&mut self, name: &str, value: Obj) {
        if let Some(&frame) = self.symbols.last() {
            if let Some(&address) = unsafe { (*frame).get(name) } {
                unsafe { *address = value };
                return;
            }
        }
        self.globals.set(name, value);
    }

    /// Bind a name in the top frame to externally-owned storage.
    ///
    /// # Panics
    ///
    /// Panics when no frame is active; top-level code has no local
    /// bindings.
    pub fn bind(&mut self, name: &str, address: *mut Obj) {
        let frame = *self
            .symbols
            .last()
            .expect("binding a local with no active frame");
        unsafe {
            (*frame).insert(name.to_string(), address);
        }
    }

    /// Push a local frame.
    ///
    /// # Safety
    ///
    /// The frame and every address later bound into it must stay valid
    /// until the matching [`pop_symbols`](Self::pop_symbols).
    pub unsafe fn push_symbols(&mut self, frame: *mut SymbolTable) {
        self.symbols.push(frame);
    }

    /// Pop the top local frame. Must pair with a push, including on
    /// early (returning) exits.
    pub fn pop_symbols(&mut self) {
        self.symbols
            .pop()
            .expect("popping a frame that was never pushed");
    }

    /// Depth of the local-frame stack.
    pub fn frame_depth(&self) -> usize {
        self.symbols.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// The current context
// =============================================================================

thread_local! {
    static CURRENT: Cell<*mut Context> = const { Cell::new(std::ptr::null_mut()) };
}

/// Publish the context for trampolines.
///
/// Trampolines have fixed native signatures and cannot take the context
/// as an argument, so the evaluator stores it here immediately before
/// any dispatch that may reach one. Single-threaded by design; a
/// threaded port would key this by worker.
#[inline]
pub fn make_current(context: &mut Context) {
    CURRENT.with(|slot| slot.set(context as *mut Context));
}

/// The published context.
///
/// # Panics
///
/// Panics if no dispatch has published a context on this thread.
pub fn current_context() -> *mut Context {
    let context = CURRENT.with(|slot| slot.get());
    assert!(
        !context.is_null(),
        "trampoline entered before any interpreter dispatch"
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_symbol_creates_global() {
        let mut context = Context::new();
        context.set_symbol("g", Obj::from_integer(4));
        assert_eq!(context.globals.get("g").unwrap().as_integer(), 4);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut context = Context::new();
        context.set_symbol("x", Obj::from_integer(1));

        let mut frame = SymbolTable::default();
        let mut local = Obj::from_integer(2);
        unsafe { context.push_symbols(&mut frame) };
        context.bind("x", &mut local);

        let address = context.lookup_symbol("x").unwrap();
        assert_eq!(unsafe { *address }.as_integer(), 2);

        context.set_symbol("x", Obj::from_integer(9));
        assert_eq!(local.as_integer(), 9);
        // The global is untouched.
        assert_eq!(context.globals.get("x").unwrap().as_integer(), 1);

        context.pop_symbols();
        let address = context.lookup_symbol("x").unwrap();
        assert_eq!(unsafe { *address }.as_integer(), 1);
    }
}
