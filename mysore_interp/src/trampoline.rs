//! Trampolines: the native entry points of not-yet-compiled code.
//!
//! Every closure object and method table entry is installed with the
//! trampoline of its arity, so callers always go through a function
//! pointer whether the target is compiled or not. A trampoline packs
//! its fixed argument list into an array, recovers the declaring AST
//! (from the closure object, or by selector resolution for methods),
//! and re-enters the interpreter through the thread-local current
//! context. Errors cannot cross the native signature as `Result`, so
//! they are raised into the pending slot and null is returned.

use crate::closure::{interpret_closure, interpret_method};
use crate::context::current_context;
use mysore_core::{ClosureInvoke, CompiledMethod, Obj, Selector};
use mysore_runtime::{pending, resolve_method, Closure};

fn enter_closure(closure: *mut Closure, args: &mut [Obj]) -> Obj {
    let context = unsafe { &mut *current_context() };
    let decl = unsafe { &*(*closure).ast };
    match interpret_closure(context, decl, closure, args) {
        Ok(value) => value,
        Err(error) => {
            pending::raise(error);
            Obj::NULL
        }
    }
}

fn enter_method(receiver: Obj, cmd: Selector, args: &mut [Obj]) -> Obj {
    let context = unsafe { &mut *current_context() };
    let method = match resolve_method(receiver, cmd) {
        Ok(method) => method,
        Err(error) => {
            pending::raise(error);
            return Obj::NULL;
        }
    };
    let decl = method
        .ast
        .as_ref()
        .expect("trampoline installed on a native method")
        .clone();
    match interpret_method(context, &decl, method, receiver, cmd, args) {
        Ok(value) => value,
        Err(error) => {
            pending::raise(error);
            Obj::NULL
        }
    }
}

// =============================================================================
// Closure trampolines, arities 0 through 10
// =============================================================================

unsafe extern "C" fn closure_trampoline0(c: *mut Closure) -> Obj {
    enter_closure(c, &mut [])
}
unsafe extern "C" fn closure_trampoline1(c: *mut Closure, o0: Obj) -> Obj {
    enter_closure(c, &mut [o0])
}
unsafe extern "C" fn closure_trampoline2(c: *mut Closure, o0: Obj, o1: Obj) -> Obj {
    enter_closure(c, &mut [o0, o1])
}
unsafe extern "C" fn closure_trampoline3(c: *mut Closure, o0: Obj, o1: Obj, o2: Obj) -> Obj {
    enter_closure(c, &mut [o0, o1, o2])
}
unsafe extern "C" fn closure_trampoline4(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3])
}
unsafe extern "C" fn closure_trampoline5(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4])
}
unsafe extern "C" fn closure_trampoline6(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4, o5])
}
unsafe extern "C" fn closure_trampoline7(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4, o5, o6])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn closure_trampoline8(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4, o5, o6, o7])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn closure_trampoline9(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
    o8: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4, o5, o6, o7, o8])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn closure_trampoline10(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
    o8: Obj,
    o9: Obj,
) -> Obj {
    enter_closure(c, &mut [o0, o1, o2, o3, o4, o5, o6, o7, o8, o9])
}

// =============================================================================
// Method trampolines, arities 0 through 10
// =============================================================================

unsafe extern "C" fn method_trampoline0(s: Obj, cmd: Selector) -> Obj {
    enter_method(s, cmd, &mut [])
}
unsafe extern "C" fn method_trampoline1(s: Obj, cmd: Selector, o0: Obj) -> Obj {
    enter_method(s, cmd, &mut [o0])
}
unsafe extern "C" fn method_trampoline2(s: Obj, cmd: Selector, o0: Obj, o1: Obj) -> Obj {
    enter_method(s, cmd, &mut [o0, o1])
}
unsafe extern "C" fn method_trampoline3(s: Obj, cmd: Selector, o0: Obj, o1: Obj, o2: Obj) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2])
}
unsafe extern "C" fn method_trampoline4(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3])
}
unsafe extern "C" fn method_trampoline5(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_trampoline6(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4, o5])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_trampoline7(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4, o5, o6])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_trampoline8(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4, o5, o6, o7])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_trampoline9(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
    o8: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4, o5, o6, o7, o8])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_trampoline10(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
    o7: Obj,
    o8: Obj,
    o9: Obj,
) -> Obj {
    enter_method(s, cmd, &mut [o0, o1, o2, o3, o4, o5, o6, o7, o8, o9])
}

// =============================================================================
// Arity-indexed access
// =============================================================================

/// The closure trampoline for an arity.
pub fn closure_trampoline(arity: usize) -> ClosureInvoke {
    let entry: *const () = match arity {
        0 => closure_trampoline0 as *const (),
        1 => closure_trampoline1 as *const (),
        2 => closure_trampoline2 as *const (),
        3 => closure_trampoline3 as *const (),
        4 => closure_trampoline4 as *const (),
        5 => closure_trampoline5 as *const (),
        6 => closure_trampoline6 as *const (),
        7 => closure_trampoline7 as *const (),
        8 => closure_trampoline8 as *const (),
        9 => closure_trampoline9 as *const (),
        10 => closure_trampoline10 as *const (),
        _ => unreachable!("arity above the trampoline cap"),
    };
    unsafe { ClosureInvoke::from_raw(entry) }
}

/// The method trampoline for an arity.
pub fn method_trampoline(arity: usize) -> CompiledMethod {
    let entry: *const () = match arity {
        0 => method_trampoline0 as *const (),
        1 => method_trampoline1 as *const (),
        2 => method_trampoline2 as *const (),
        3 => method_trampoline3 as *const (),
        4 => method_trampoline4 as *const (),
        5 => method_trampoline5 as *const (),
        6 => method_trampoline6 as *const (),
        7 => method_trampoline7 as *const (),
        8 => method_trampoline8 as *const (),
        9 => method_trampoline9 as *const (),
        10 => method_trampoline10 as *const (),
        _ => unreachable!("arity above the trampoline cap"),
    };
    unsafe { CompiledMethod::from_raw(entry) }
}
