//! Class table and method resolution.
//!
//! The class table is thread-local, like the heap and the interpreter's
//! current-context pointer: the runtime is single-threaded, and classes
//! hold interior-mutable method entries that must not cross threads.
//! Classes are leaked on registration and live until process exit.

use crate::class::{Class, Method};
use crate::object::isa;
use mysore_core::{CompiledMethod, Obj, RuntimeError, Selector};
use rustc_hash::FxHashMap;
use std::cell::RefCell;

thread_local! {
    static CLASS_TABLE: RefCell<FxHashMap<String, &'static Class>> =
        RefCell::new(FxHashMap::default());
}

/// Register a class under a name. Re-registration replaces the previous
/// entry: the last writer wins, and existing instances keep their old
/// class pointer.
pub fn register_class(name: &str, class: &'static Class) {
    CLASS_TABLE.with(|table| {
        table.borrow_mut().insert(name.to_string(), class);
    });
}

/// Look up a registered class.
pub fn lookup_class(name: &str) -> Option<&'static Class> {
    CLASS_TABLE.with(|table| table.borrow().get(name).copied())
}

/// Resolve a selector against a class: the receiver's class first, then
/// each superclass in turn. The most-derived definition wins.
pub fn method_for_selector(class: &'static Class, selector: Selector) -> Option<&'static Method> {
    let mut current = Some(class);
    while let Some(class) = current {
        if let Some(method) = class.own_method(selector) {
            return Some(method);
        }
        current = class.superclass;
    }
    None
}

/// Resolve a selector against a receiver, or produce the dispatch error
/// naming the class and selector. Null has no class and answers nothing.
pub fn resolve_method(receiver: Obj, selector: Selector) -> Result<&'static Method, RuntimeError> {
    let not_found = |class: &str| RuntimeError::SelectorNotFound {
        class: class.to_string(),
        selector: crate::selectors::selector_name(selector)
            .unwrap_or_else(|| format!("#{}", selector.raw())),
    };
    if receiver.is_null() {
        return Err(not_found("null"));
    }
    let class = unsafe { isa(receiver) };
    method_for_selector(class, selector).ok_or_else(|| not_found(class.name))
}

/// Resolve a selector against a receiver and return the method's current
/// entry point.
pub fn compiled_method_for_selector(
    receiver: Obj,
    selector: Selector,
) -> Result<CompiledMethod, RuntimeError> {
    resolve_method(receiver, selector).map(|method| method.function())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::lookup_selector;
    use mysore_core::CompiledMethod;
    use std::cell::Cell;

    fn leak(class: Class) -> &'static Class {
        Box::leak(Box::new(class))
    }

    fn stub_method(selector: Selector) -> Method {
        Method {
            selector,
            args: 0,
            function: Cell::new(unsafe { CompiledMethod::from_raw(std::ptr::null()) }),
            ast: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let class = leak(Class {
            superclass: None,
            name: "RegistryTestA",
            methods: Vec::new(),
            ivar_names: Vec::new(),
        });
        register_class("RegistryTestA", class);
        assert!(lookup_class("RegistryTestA").is_some());
        assert!(lookup_class("RegistryTestMissing").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let first = leak(Class {
            superclass: None,
            name: "RegistryTestB",
            methods: Vec::new(),
            ivar_names: Vec::new(),
        });
        let second = leak(Class {
            superclass: None,
            name: "RegistryTestB",
            methods: Vec::new(),
            ivar_names: vec!["x"],
        });
        register_class("RegistryTestB", first);
        register_class("RegistryTestB", second);
        assert_eq!(lookup_class("RegistryTestB").unwrap().ivar_count(), 1);
    }

    #[test]
    fn test_most_derived_method_wins() {
        let speak = lookup_selector("registryTestSpeak");
        let graze = lookup_selector("registryTestGraze");

        let base = leak(Class {
            superclass: None,
            name: "RegistryTestBase",
            methods: vec![stub_method(speak), stub_method(graze)],
            ivar_names: Vec::new(),
        });
        let derived = leak(Class {
            superclass: Some(base),
            name: "RegistryTestDerived",
            methods: vec![stub_method(speak)],
            ivar_names: Vec::new(),
        });

        // The override shadows the base definition.
        let found = method_for_selector(derived, speak).unwrap();
        assert!(std::ptr::eq(found, &derived.methods[0]));

        // Unshadowed selectors resolve up the chain.
        let found = method_for_selector(derived, graze).unwrap();
        assert!(std::ptr::eq(found, &base.methods[1]));

        // Base instances never see the override.
        let found = method_for_selector(base, speak).unwrap();
        assert!(std::ptr::eq(found, &base.methods[0]));

        assert!(method_for_selector(derived, lookup_selector("registryTestMissing")).is_none());
    }
}
