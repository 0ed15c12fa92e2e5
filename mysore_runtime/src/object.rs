//! Raw heap object layouts and accessors.
//!
//! Every heap object starts with a class pointer. Variable-sized state
//! (string bytes, closure bound variables, instance variables) trails
//! the fixed header, so layouts are `#[repr(C)]` and access goes through
//! raw pointers. All objects live in the conservative heap of
//! `mysore_gc` and are reclaimed by collection, never dropped.

use crate::builtins::{small_int_class, string_class};
use crate::class::Class;
use mysore_core::{ClosureInvoke, Obj};
use mysore_gc::gc_alloc;
use mysore_parser::ClosureDecl;

/// Common object header: just the class pointer. Instance variables
/// follow as consecutive `Obj` slots.
#[repr(C)]
pub struct Object {
    /// The object's class.
    pub isa: *const Class,
}

/// A string object: `{ isa, length, bytes… }`. The length is stored as a
/// small integer so the slot scans cleanly.
#[repr(C)]
pub struct StringObj {
    /// The object's class (always the String class).
    pub isa: *const Class,
    /// Byte length, as a small integer.
    pub length: Obj,
}

/// A closure object: `{ isa, parameters, ast, invoke, bound_vars… }`.
///
/// `ast` borrows the declaring node; whoever executes the program keeps
/// the AST alive for at least as long as any closure created from it
/// (the REPL retains every accepted statement block for the session).
#[repr(C)]
pub struct Closure {
    /// The object's class (always the Closure class).
    pub isa: *const Class,
    /// Parameter count, as a small integer.
    pub parameters: Obj,
    /// The declaring AST node.
    pub ast: *const ClosureDecl,
    /// Current entry point: trampoline or compiled code.
    pub invoke: ClosureInvoke,
}

// =============================================================================
// Class resolution
// =============================================================================

/// The class of a value: the built-in small-integer class for tagged
/// integers, otherwise the header's class pointer.
///
/// # Safety
///
/// `obj` must be a small integer or a live heap object; null has no
/// class.
#[inline]
pub unsafe fn isa(obj: Obj) -> &'static Class {
    if obj.is_integer() {
        small_int_class()
    } else {
        debug_assert!(obj.needs_gc(), "isa of null or malformed word");
        unsafe { &*(*obj.as_ptr::<Object>()).isa }
    }
}

// =============================================================================
// Strings
// =============================================================================

/// Allocate a string object holding a copy of `text`.
pub fn string_new(text: &str) -> Obj {
    let size = std::mem::size_of::<StringObj>() + text.len();
    let ptr = gc_alloc(size) as *mut StringObj;
    unsafe {
        (*ptr).isa = string_class();
        (*ptr).length = Obj::from_integer(text.len() as i64);
        let bytes = (ptr as *mut u8).add(std::mem::size_of::<StringObj>());
        std::ptr::copy_nonoverlapping(text.as_ptr(), bytes, text.len());
    }
    Obj::from_ptr(ptr)
}

/// The byte contents of a string object.
///
/// # Safety
///
/// `string` must point to a live string object.
pub unsafe fn string_bytes<'a>(string: *const StringObj) -> &'a [u8] {
    unsafe {
        let len = (*string).length.as_integer() as usize;
        let bytes = (string as *const u8).add(std::mem::size_of::<StringObj>());
        std::slice::from_raw_parts(bytes, len)
    }
}

// =============================================================================
// Instances
// =============================================================================

/// Allocate a zero-initialized instance of `class`: a header plus one
/// slot per indexed instance variable.
pub fn instance_new(class: &'static Class) -> Obj {
    let size = std::mem::size_of::<Object>() + class.ivar_count() * std::mem::size_of::<Obj>();
    let ptr = gc_alloc(size) as *mut Object;
    unsafe { (*ptr).isa = class };
    Obj::from_ptr(ptr)
}

/// The instance-variable region of an object, starting immediately
/// after the header.
///
/// # Safety
///
/// `obj` must be a live heap object with at least the header.
#[inline]
pub unsafe fn instance_ivars(obj: Obj) -> *mut Obj {
    unsafe { (obj.as_ptr::<u8>()).add(std::mem::size_of::<Object>()) as *mut Obj }
}

// =============================================================================
// Closures
// =============================================================================

/// Allocate a closure object with room for `bound_count` bound-variable
/// slots. The header fields other than `isa` are zeroed; the caller
/// fills them before the closure escapes.
pub fn closure_alloc(bound_count: usize) -> *mut Closure {
    let size = std::mem::size_of::<Closure>() + bound_count * std::mem::size_of::<Obj>();
    let ptr = gc_alloc(size) as *mut Closure;
    unsafe { (*ptr).isa = crate::builtins::closure_class() };
    ptr
}

/// The bound-variable region of a closure object.
///
/// # Safety
///
/// `closure` must point to a live closure object.
#[inline]
pub unsafe fn closure_bound_vars(closure: *mut Closure) -> *mut Obj {
    unsafe { (closure as *mut u8).add(std::mem::size_of::<Closure>()) as *mut Obj }
}

/// Whether a value is a closure object.
pub fn is_closure(obj: Obj) -> bool {
    obj.needs_gc() && unsafe { (*obj.as_ptr::<Object>()).isa } == crate::builtins::closure_class()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let s = string_new("hello");
        assert!(s.needs_gc());
        unsafe {
            assert_eq!(isa(s).name, "String");
            let ptr = s.as_ptr::<StringObj>();
            assert_eq!((*ptr).length.as_integer(), 5);
            assert_eq!(string_bytes(ptr), b"hello");
        }
    }

    #[test]
    fn test_empty_string() {
        let s = string_new("");
        unsafe {
            assert_eq!(string_bytes(s.as_ptr::<StringObj>()), b"");
        }
    }

    #[test]
    fn test_isa_of_integer() {
        let n = Obj::from_integer(7);
        unsafe {
            assert_eq!(isa(n).name, "SmallInteger");
        }
    }

    #[test]
    fn test_instance_layout() {
        let class: &'static Class = Box::leak(Box::new(Class {
            superclass: None,
            name: "Point",
            methods: Vec::new(),
            ivar_names: vec!["x", "y"],
        }));
        let obj = instance_new(class);
        unsafe {
            assert_eq!(isa(obj).name, "Point");
            let ivars = instance_ivars(obj);
            // Zero-initialized slots read as null.
            assert!((*ivars).is_null());
            assert!((*ivars.add(1)).is_null());
            *ivars = Obj::from_integer(3);
            assert_eq!((*ivars).as_integer(), 3);
        }
    }

    #[test]
    fn test_closure_alloc() {
        let closure = closure_alloc(2);
        assert!(is_closure(Obj::from_ptr(closure)));
        unsafe {
            let bound = closure_bound_vars(closure);
            assert!((*bound).is_null());
            *bound.add(1) = Obj::from_integer(9);
            assert_eq!((*bound.add(1)).as_integer(), 9);
        }
    }
}
