//! Class and method metadata.

use mysore_core::{CompiledMethod, Selector};
use mysore_parser::ClosureDecl;
use std::cell::Cell;
use std::rc::Rc;

/// A MysoreScript class.
///
/// Classes are created once (by a class declaration or at built-in
/// initialization), leaked, and never reclaimed. Everything that refers
/// to a class (object headers, the class table, subclass links) relies
/// on that immortality.
pub struct Class {
    /// The superclass, for single inheritance.
    pub superclass: Option<&'static Class>,
    /// The class name.
    pub name: &'static str,
    /// Methods defined directly on this class.
    pub methods: Vec<Method>,
    /// Names of the indexed instance variables, in slot order. Only the
    /// variables this class declares itself; instances are sized by this
    /// list.
    pub ivar_names: Vec<&'static str>,
}

impl Class {
    /// Number of indexed instance-variable slots.
    #[inline]
    pub fn ivar_count(&self) -> usize {
        self.ivar_names.len()
    }

    /// Find a method defined directly on this class.
    pub fn own_method(&self, selector: Selector) -> Option<&Method> {
        self.methods.iter().find(|m| m.selector == selector)
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass.map(|s| s.name))
            .field("methods", &self.methods.len())
            .field("ivars", &self.ivar_names)
            .finish()
    }
}

/// Method metadata.
pub struct Method {
    /// The interned selector this method answers to.
    pub selector: Selector,
    /// Number of declared parameters.
    pub args: usize,
    /// The native entry point: a trampoline until the declaration is
    /// compiled, the compiled entry afterwards. Always callable.
    pub function: Cell<CompiledMethod>,
    /// The declaring AST node. Built-in methods have none.
    pub ast: Option<Rc<ClosureDecl>>,
}

impl Method {
    /// The current entry point.
    #[inline]
    pub fn function(&self) -> CompiledMethod {
        self.function.get()
    }

    /// Swap in a new entry point. Monotonic: called once, at tier-up.
    #[inline]
    pub fn set_function(&self, entry: CompiledMethod) {
        self.function.set(entry);
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("selector", &self.selector)
            .field("args", &self.args)
            .finish()
    }
}
