//! Fixed-arity native call adapters.
//!
//! Closures and methods are invoked through type-erased entry points
//! ([`ClosureInvoke`], [`CompiledMethod`]); the adapters here recover
//! the concrete signature from the argument count and make the indirect
//! call. One signature exists per arity from 0 to 10: the same shapes
//! the trampolines and the code generator's entry stubs expose.

use crate::object::Closure;
use mysore_core::{ClosureInvoke, CompiledMethod, Obj, Selector, MAX_ARITY};
use std::mem::transmute;

/// Call a closure entry point with the given arguments.
///
/// # Safety
///
/// `invoke` must be an entry of the closure native convention whose
/// arity equals `args.len()`, and `closure` must be a live closure
/// object consistent with it.
pub unsafe fn call_compiled_closure(
    invoke: ClosureInvoke,
    closure: *mut Closure,
    args: &[Obj],
) -> Obj {
    debug_assert!(args.len() <= MAX_ARITY, "arity checked before dispatch");
    let f = invoke.as_raw();
    let a = args;
    unsafe {
        match args.len() {
            0 => transmute::<*const (), unsafe extern "C" fn(*mut Closure) -> Obj>(f)(closure),
            1 => transmute::<*const (), unsafe extern "C" fn(*mut Closure, Obj) -> Obj>(f)(
                closure, a[0],
            ),
            2 => transmute::<*const (), unsafe extern "C" fn(*mut Closure, Obj, Obj) -> Obj>(f)(
                closure, a[0], a[1],
            ),
            3 => transmute::<*const (), unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj) -> Obj>(
                f,
            )(closure, a[0], a[1], a[2]),
            4 => transmute::<
                *const (),
                unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3]),
            5 => transmute::<
                *const (),
                unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3], a[4]),
            6 => transmute::<
                *const (),
                unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3], a[4], a[5]),
            7 => transmute::<
                *const (),
                unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3], a[4], a[5], a[6]),
            8 => transmute::<
                *const (),
                unsafe extern "C" fn(*mut Closure, Obj, Obj, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]),
            9 => transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut Closure,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                ) -> Obj,
            >(f)(closure, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8]),
            10 => transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut Closure,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                ) -> Obj,
            >(f)(
                closure, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8], a[9],
            ),
            _ => unreachable!("arity above the trampoline cap"),
        }
    }
}

/// Call a method entry point with the given receiver, selector, and
/// arguments.
///
/// # Safety
///
/// `method` must be an entry of the method native convention whose arity
/// equals `args.len()`, and `receiver` must be a value its class accepts.
pub unsafe fn call_compiled_method(
    method: CompiledMethod,
    receiver: Obj,
    selector: Selector,
    args: &[Obj],
) -> Obj {
    debug_assert!(args.len() <= MAX_ARITY, "arity checked before dispatch");
    let f = method.as_raw();
    let (r, s, a) = (receiver, selector, args);
    unsafe {
        match args.len() {
            0 => transmute::<*const (), unsafe extern "C" fn(Obj, Selector) -> Obj>(f)(r, s),
            1 => transmute::<*const (), unsafe extern "C" fn(Obj, Selector, Obj) -> Obj>(f)(
                r, s, a[0],
            ),
            2 => transmute::<*const (), unsafe extern "C" fn(Obj, Selector, Obj, Obj) -> Obj>(f)(
                r, s, a[0], a[1],
            ),
            3 => transmute::<*const (), unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj) -> Obj>(
                f,
            )(r, s, a[0], a[1], a[2]),
            4 => transmute::<
                *const (),
                unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3]),
            5 => transmute::<
                *const (),
                unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3], a[4]),
            6 => transmute::<
                *const (),
                unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3], a[4], a[5]),
            7 => transmute::<
                *const (),
                unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3], a[4], a[5], a[6]),
            8 => transmute::<
                *const (),
                unsafe extern "C" fn(Obj, Selector, Obj, Obj, Obj, Obj, Obj, Obj, Obj, Obj) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]),
            9 => transmute::<
                *const (),
                unsafe extern "C" fn(
                    Obj,
                    Selector,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                ) -> Obj,
            >(f)(r, s, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8]),
            10 => transmute::<
                *const (),
                unsafe extern "C" fn(
                    Obj,
                    Selector,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                    Obj,
                ) -> Obj,
            >(f)(
                r, s, a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8], a[9],
            ),
            _ => unreachable!("arity above the trampoline cap"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn sum2(_closure: *mut Closure, a: Obj, b: Obj) -> Obj {
        Obj::from_integer(a.as_integer() + b.as_integer())
    }

    unsafe extern "C" fn echo_selector(_receiver: Obj, selector: Selector) -> Obj {
        selector.as_obj()
    }

    #[test]
    fn test_closure_adapter_dispatches_by_arity() {
        let invoke = unsafe { ClosureInvoke::from_raw(sum2 as *const ()) };
        let args = [Obj::from_integer(2), Obj::from_integer(40)];
        let result =
            unsafe { call_compiled_closure(invoke, std::ptr::null_mut(), &args) };
        assert_eq!(result.as_integer(), 42);
    }

    #[test]
    fn test_method_adapter_passes_selector() {
        let entry = unsafe { CompiledMethod::from_raw(echo_selector as *const ()) };
        let selector = Selector::from_raw(9);
        let result =
            unsafe { call_compiled_method(entry, Obj::from_integer(1), selector, &[]) };
        assert_eq!(result.as_integer(), 9);
    }
}
