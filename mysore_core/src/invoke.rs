//! Opaque native entry points.
//!
//! A closure or method is always called through a function pointer of a
//! fixed-arity native signature, whether the target is a trampoline back
//! into the tree-walking interpreter or a compiled entry produced by the
//! code generator. Because the arity is only known at the call site, the
//! pointer is stored type-erased and cast to the concrete signature by
//! the call adapters in `mysore_runtime`.

/// Type-erased entry point for a closure.
///
/// The concrete signature is
/// `unsafe extern "C" fn(*mut Closure, Obj, ..., Obj) -> Obj`
/// with between 0 and 10 trailing `Obj` arguments.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureInvoke(*const ());

impl ClosureInvoke {
    /// Wrap a raw entry point.
    ///
    /// # Safety
    ///
    /// `entry` must be a function of the closure native convention for
    /// some arity between 0 and 10.
    #[inline]
    pub const unsafe fn from_raw(entry: *const ()) -> Self {
        ClosureInvoke(entry)
    }

    /// The raw entry point.
    #[inline]
    pub const fn as_raw(self) -> *const () {
        self.0
    }
}

/// Type-erased entry point for a method.
///
/// The concrete signature is
/// `unsafe extern "C" fn(Obj, Selector, Obj, ..., Obj) -> Obj`
/// with between 0 and 10 trailing `Obj` arguments.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledMethod(*const ());

impl CompiledMethod {
    /// Wrap a raw entry point.
    ///
    /// # Safety
    ///
    /// `entry` must be a function of the method native convention for
    /// some arity between 0 and 10.
    #[inline]
    pub const unsafe fn from_raw(entry: *const ()) -> Self {
        CompiledMethod(entry)
    }

    /// The raw entry point.
    #[inline]
    pub const fn as_raw(self) -> *const () {
        self.0
    }
}

// Entry points reference immutable code, never data; sharing them across
// threads is sound even though the runtime itself is single-threaded.
unsafe impl Send for ClosureInvoke {}
unsafe impl Sync for ClosureInvoke {}
unsafe impl Send for CompiledMethod {}
unsafe impl Sync for CompiledMethod {}
