//! Fixed-arity entry stubs for compiled code.
//!
//! One stub per arity and convention, mirroring the interpreter's
//! trampolines: each packs its fixed argument list into an array,
//! recovers the declaration (from the closure object, or by selector
//! resolution for methods), fetches its code from the cache, and runs
//! the executor. Installing one of these as a closure's `invoke` or a
//! method's `function` is what "compiled" means to every caller.

use crate::code_cache;
use crate::executor::{execute, EntryFrame};
use mysore_core::{ClosureInvoke, CompiledMethod, Obj, Selector};
use mysore_runtime::{resolve_method, Closure};
use std::rc::Rc;

fn run_closure(closure: *mut Closure, args: &[Obj]) -> Obj {
    let decl = unsafe { (*closure).ast };
    let code = code_cache::lookup(decl).expect("compiled entry installed without cached code");
    execute(&code, &EntryFrame::Closure(closure), args)
}

fn run_method(receiver: Obj, cmd: Selector, args: &[Obj]) -> Obj {
    let method = resolve_method(receiver, cmd)
        .expect("compiled method entry reached without a resolvable method");
    let decl = method
        .ast
        .as_ref()
        .expect("compiled method entry installed on a native method");
    let code = code_cache::lookup(Rc::as_ptr(decl))
        .expect("compiled entry installed without cached code");
    execute(&code, &EntryFrame::Method { receiver, cmd }, args)
}

// =============================================================================
// Closure entry stubs, arities 0 through 10
// =============================================================================

unsafe extern "C" fn closure_entry0(c: *mut Closure) -> Obj {
    run_closure(c, &[])
}
unsafe extern "C" fn closure_entry1(c: *mut Closure, o0: Obj) -> Obj {
    run_closure(c, &[o0])
}
unsafe extern "C" fn closure_entry2(c: *mut Closure, o0: Obj, o1: Obj) -> Obj {
    run_closure(c, &[o0, o1])
}
unsafe extern "C" fn closure_entry3(c: *mut Closure, o0: Obj, o1: Obj, o2: Obj) -> Obj {
    run_closure(c, &[o0, o1, o2])
}
unsafe extern "C" fn closure_entry4(c: *mut Closure, o0: Obj, o1: Obj, o2: Obj, o3: Obj) -> Obj {
    run_closure(c, &[o0, o1, o2, o3])
}
unsafe extern "C" fn closure_entry5(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
) -> Obj {
    run_closure(c, &[o0, o1, o2, o3, o4])
}
unsafe extern "C" fn closure_entry6(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
) -> Obj {
    run_closure(c, &[o0, o1, o2, o3, o4, o5])
}
unsafe extern "C" fn closure_entry7(
    c: *mut Closure,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
    o6: Obj,
) -> Obj {
    run_closure(c, &[o0, o1, o2, o3, o4, o5, o6])
}
unsafe extern "C" fn closure_entry8(
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
    run_closure(c, &[o0, o1, o2, o3, o4, o5, o6, o7])
}
unsafe extern "C" fn closure_entry9(
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
    run_closure(c, &[o0, o1, o2, o3, o4, o5, o6, o7, o8])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn closure_entry10(
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
    run_closure(c, &[o0, o1, o2, o3, o4, o5, o6, o7, o8, o9])
}

// =============================================================================
// Method entry stubs, arities 0 through 10
// =============================================================================

unsafe extern "C" fn method_entry0(s: Obj, cmd: Selector) -> Obj {
    run_method(s, cmd, &[])
}
unsafe extern "C" fn method_entry1(s: Obj, cmd: Selector, o0: Obj) -> Obj {
    run_method(s, cmd, &[o0])
}
unsafe extern "C" fn method_entry2(s: Obj, cmd: Selector, o0: Obj, o1: Obj) -> Obj {
    run_method(s, cmd, &[o0, o1])
}
unsafe extern "C" fn method_entry3(s: Obj, cmd: Selector, o0: Obj, o1: Obj, o2: Obj) -> Obj {
    run_method(s, cmd, &[o0, o1, o2])
}
unsafe extern "C" fn method_entry4(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
) -> Obj {
    run_method(s, cmd, &[o0, o1, o2, o3])
}
unsafe extern "C" fn method_entry5(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
) -> Obj {
    run_method(s, cmd, &[o0, o1, o2, o3, o4])
}
unsafe extern "C" fn method_entry6(
    s: Obj,
    cmd: Selector,
    o0: Obj,
    o1: Obj,
    o2: Obj,
    o3: Obj,
    o4: Obj,
    o5: Obj,
) -> Obj {
    run_method(s, cmd, &[o0, o1, o2, o3, o4, o5])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_entry7(
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
    run_method(s, cmd, &[o0, o1, o2, o3, o4, o5, o6])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_entry8(
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
    run_method(s, cmd, &[o0, o1, o2, o3, o4, o5, o6, o7])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_entry9(
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
    run_method(s, cmd, &[o0, o1, o2, o3, o4, o5, o6, o7, o8])
}
#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn method_entry10(
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
    run_method(s, cmd, &[o0, o1, o2, o3, o4, o5, o6, o7, o8, o9])
}

// =============================================================================
// Arity-indexed access
// =============================================================================

/// The compiled-closure entry for an arity.
pub fn closure_entry(arity: usize) -> ClosureInvoke {
    let entry: *const () = match arity {
        0 => closure_entry0 as *const (),
        1 => closure_entry1 as *const (),
        2 => closure_entry2 as *const (),
        3 => closure_entry3 as *const (),
        4 => closure_entry4 as *const (),
        5 => closure_entry5 as *const (),
        6 => closure_entry6 as *const (),
        7 => closure_entry7 as *const (),
        8 => closure_entry8 as *const (),
        9 => closure_entry9 as *const (),
        10 => closure_entry10 as *const (),
        _ => unreachable!("arity above the entry-stub cap"),
    };
    unsafe { ClosureInvoke::from_raw(entry) }
}

/// The compiled-method entry for an arity.
pub fn method_entry(arity: usize) -> CompiledMethod {
    let entry: *const () = match arity {
        0 => method_entry0 as *const (),
        1 => method_entry1 as *const (),
        2 => method_entry2 as *const (),
        3 => method_entry3 as *const (),
        4 => method_entry4 as *const (),
        5 => method_entry5 as *const (),
        6 => method_entry6 as *const (),
        7 => method_entry7 as *const (),
        8 => method_entry8 as *const (),
        9 => method_entry9 as *const (),
        10 => method_entry10 as *const (),
        _ => unreachable!("arity above the entry-stub cap"),
    };
    unsafe { CompiledMethod::from_raw(entry) }
}
