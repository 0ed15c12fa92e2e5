//! Cache of compiled code, keyed by declaration identity.
//!
//! Entry stubs recover the declaring node from a closure object or a
//! method table and look its code up here. Entries are inserted once,
//! when compilation succeeds, and never evicted: the compiled-entry swap
//! is monotonic.

use crate::bytecode::CodeObject;
use mysore_parser::ClosureDecl;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CODE_CACHE: RefCell<FxHashMap<usize, Rc<CodeObject>>> =
        RefCell::new(FxHashMap::default());
}

/// Insert compiled code for a declaration.
pub fn insert(decl: *const ClosureDecl, code: Rc<CodeObject>) {
    CODE_CACHE.with(|cache| {
        cache.borrow_mut().insert(decl as usize, code);
    });
}

/// The compiled code for a declaration, if any.
pub fn lookup(decl: *const ClosureDecl) -> Option<Rc<CodeObject>> {
    CODE_CACHE.with(|cache| cache.borrow().get(&(decl as usize)).cloned())
}

/// Whether a declaration has compiled code.
pub fn contains(decl: *const ClosureDecl) -> bool {
    CODE_CACHE.with(|cache| cache.borrow().contains_key(&(decl as usize)))
}
