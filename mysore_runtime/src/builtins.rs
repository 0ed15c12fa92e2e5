//! Built-in classes and their native methods.
//!
//! `String`, `SmallInteger`, and `Closure` exist before any script runs.
//! Their methods are ordinary native entries of the method calling
//! convention, the same shape compiled script methods have, so
//! dispatch never distinguishes built-in from user code.
//!
//! The class structures are leaked once per thread, matching the
//! thread-local class table.

use crate::class::{Class, Method};
use crate::object::{string_bytes, StringObj};
use crate::selectors::lookup_selector;
use mysore_core::{CompiledMethod, Obj, Selector};
use std::cell::Cell;
use std::io::Write;

thread_local! {
    static STRING_CLASS: &'static Class = Box::leak(Box::new(make_string_class()));
    static SMALL_INT_CLASS: &'static Class = Box::leak(Box::new(make_small_int_class()));
    static CLOSURE_CLASS: &'static Class = Box::leak(Box::new(make_closure_class()));
}

/// The class of string objects.
pub fn string_class() -> &'static Class {
    STRING_CLASS.with(|class| *class)
}

/// The class of small integers. No objects carry it in a header; it is
/// the answer `isa` gives for tagged integer words.
pub fn small_int_class() -> &'static Class {
    SMALL_INT_CLASS.with(|class| *class)
}

/// The class of closure objects.
pub fn closure_class() -> &'static Class {
    CLOSURE_CLASS.with(|class| *class)
}

fn native_method(name: &str, args: usize, entry: *const ()) -> Method {
    Method {
        selector: lookup_selector(name),
        args,
        function: Cell::new(unsafe { CompiledMethod::from_raw(entry) }),
        ast: None,
    }
}

fn make_string_class() -> Class {
    Class {
        superclass: None,
        name: "String",
        methods: vec![
            native_method("length", 0, string_length as *const ()),
            native_method("charAt", 1, string_char_at as *const ()),
            native_method("dump", 0, string_dump as *const ()),
        ],
        ivar_names: Vec::new(),
    }
}

fn make_small_int_class() -> Class {
    Class {
        superclass: None,
        name: "SmallInteger",
        methods: vec![native_method("dump", 0, int_dump as *const ())],
        ivar_names: Vec::new(),
    }
}

fn make_closure_class() -> Class {
    Class {
        superclass: None,
        name: "Closure",
        methods: Vec::new(),
        ivar_names: Vec::new(),
    }
}

// =============================================================================
// Native method bodies
// =============================================================================

unsafe extern "C" fn string_length(receiver: Obj, _cmd: Selector) -> Obj {
    // The length field is already a small integer.
    unsafe { (*receiver.as_ptr::<StringObj>()).length }
}

unsafe extern "C" fn string_char_at(receiver: Obj, _cmd: Selector, index: Obj) -> Obj {
    if !index.is_integer() {
        return Obj::NULL;
    }
    let bytes = unsafe { string_bytes(receiver.as_ptr::<StringObj>()) };
    let index = index.as_integer();
    if index < 0 || index as usize >= bytes.len() {
        return Obj::NULL;
    }
    Obj::from_integer(bytes[index as usize] as i64)
}

unsafe extern "C" fn string_dump(receiver: Obj, _cmd: Selector) -> Obj {
    let bytes = unsafe { string_bytes(receiver.as_ptr::<StringObj>()) };
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let _ = stdout.write_all(bytes);
    let _ = stdout.flush();
    receiver
}

unsafe extern "C" fn int_dump(receiver: Obj, _cmd: Selector) -> Obj {
    println!("{}", receiver.as_integer());
    receiver
}
