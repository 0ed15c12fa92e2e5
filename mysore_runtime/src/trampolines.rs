//! Trampoline provider registration.
//!
//! Trampolines are defined by the interpreter (they re-enter the tree
//! walker), but the code generator also needs them: compiled code that
//! constructs a closure from a not-yet-compiled declaration must install
//! the trampoline of its arity as the entry point. The interpreter
//! registers a provider here during context setup, and everyone below it
//! in the crate graph fetches trampolines through the provider.

use mysore_core::ClosureInvoke;
use std::cell::Cell;

thread_local! {
    static PROVIDER: Cell<Option<fn(usize) -> ClosureInvoke>> = const { Cell::new(None) };
}

/// Register the trampoline provider. Called by the interpreter before
/// any code generation can happen.
pub fn set_trampoline_provider(provider: fn(usize) -> ClosureInvoke) {
    PROVIDER.with(|slot| slot.set(Some(provider)));
}

/// The closure trampoline for an arity.
///
/// # Panics
///
/// Panics if no interpreter has registered a provider on this thread.
pub fn closure_trampoline(arity: usize) -> ClosureInvoke {
    PROVIDER.with(|slot| {
        let provider = slot
            .get()
            .expect("no interpreter context has been created on this thread");
        provider(arity)
    })
}
