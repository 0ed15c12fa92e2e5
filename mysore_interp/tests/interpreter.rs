//! End-to-end interpreter tests: parse source, interpret it, observe
//! the resulting globals.

use mysore_core::{Obj, RuntimeError};
use mysore_interp::Context;
use mysore_parser::{parse, Statements};

/// Parse and interpret a program, returning the context and the AST.
/// The AST must stay alive as long as the context: closures and method
/// tables borrow their declaring nodes.
fn run(source: &str) -> (Context, Statements) {
    let block = parse(source).expect("parse failure");
    let mut context = Context::new();
    context.interpret(&block).expect("runtime failure");
    (context, block)
}

fn global_int(context: &Context, name: &str) -> i64 {
    let value = context
        .globals
        .get(name)
        .unwrap_or_else(|| panic!("no global '{}'", name));
    assert!(value.is_integer(), "global '{}' is not an integer", name);
    value.as_integer()
}

#[test]
fn test_arithmetic_precedence() {
    let (context, _ast) = run("var x = 2 + 3 * 4;");
    assert_eq!(global_int(&context, "x"), 14);
}

#[test]
fn test_division_and_comparison() {
    let (context, _ast) = run("var q = 17 / 5; var lt = 3 < 4; var ge = 3 >= 4;");
    assert_eq!(global_int(&context, "q"), 3);
    assert_eq!(global_int(&context, "lt"), 1);
    assert_eq!(global_int(&context, "ge"), 0);
}

#[test]
fn test_decl_without_initializer_creates_null_global() {
    let (context, _ast) = run("var empty;");
    let value = context.globals.get("empty").expect("global not created");
    assert!(value.is_null());
}

#[test]
fn test_truthiness_rules() {
    let (context, _ast) = run(
        "var fromZero = 0; var fromInt = 0; var fromNull = 0; var nil;\n\
         if (0) { fromZero = 1; }\n\
         if (7) { fromInt = 1; }\n\
         if (nil) { fromNull = 1; }\n\
         var fromString = 0;\n\
         if (\"\") { fromString = 1; }",
    );
    assert_eq!(global_int(&context, "fromZero"), 0);
    assert_eq!(global_int(&context, "fromInt"), 1);
    assert_eq!(global_int(&context, "fromNull"), 0);
    // Even an empty string is a non-null object, hence true.
    assert_eq!(global_int(&context, "fromString"), 1);
}

#[test]
fn test_while_loop() {
    let (context, _ast) = run("var n = 0; var sum = 0; while (n < 10) { n = n + 1; sum = sum + n; }");
    assert_eq!(global_int(&context, "sum"), 55);
}

#[test]
fn test_early_return() {
    let (context, _ast) = run(
        "fun f(a) { if (a) { return 1; } return 2; }\n\
         var r0 = f(0);\n\
         var r1 = f(1);",
    );
    assert_eq!(global_int(&context, "r0"), 2);
    assert_eq!(global_int(&context, "r1"), 1);
}

#[test]
fn test_return_short_circuits_block() {
    let (context, _ast) = run("var g = 0; fun f() { return 1; g = 5; } var r = f();");
    assert_eq!(global_int(&context, "r"), 1);
    // The statement after the return never ran.
    assert_eq!(global_int(&context, "g"), 0);
}

#[test]
fn test_fall_off_function_returns_null() {
    let (context, _ast) = run("fun f() { var x = 1; } var r = f();");
    assert!(context.globals.get("r").unwrap().is_null());
}

#[test]
fn test_constant_string_is_cached_by_identity() {
    // The same literal node evaluated on different iterations yields
    // the identical object, observable through pointer equality.
    let (context, _ast) = run(
        "var first = 0; var t = 0; var n = 0;\n\
         while (n < 3) { t = \"hi\"; if (n == 0) { first = t; } n = n + 1; }\n\
         var same = first == t;",
    );
    assert_eq!(global_int(&context, "same"), 1);
}

#[test]
fn test_cache_survives_reinterpretation() {
    let block = parse("x = \"hello\";").expect("parse failure");
    let mut context = Context::new();
    context.interpret(&block).unwrap();
    let first = context.globals.get("x").unwrap();
    context.interpret(&block).unwrap();
    let second = context.globals.get("x").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_capture_is_by_value_at_creation() {
    let (context, _ast) = run(
        "var x = 1;\n\
         fun f() { return x; }\n\
         x = 100;\n\
         var r = f();",
    );
    // f captured x when it was declared, before the reassignment.
    assert_eq!(global_int(&context, "r"), 1);
}

#[test]
fn test_closure_counter_uses_its_own_slot() {
    let (context, _ast) = run(
        "fun make(start) {\n\
             var counter = start;\n\
             fun inc() { counter = counter + 1; return counter; }\n\
             return inc;\n\
         }\n\
         var a = make(10);\n\
         var r1 = a();\n\
         var r2 = a();\n\
         var b = make(10);\n\
         var r3 = b();",
    );
    // Mutation persists in the closure object across its invocations…
    assert_eq!(global_int(&context, "r1"), 11);
    assert_eq!(global_int(&context, "r2"), 12);
    // …but each construction captures afresh.
    assert_eq!(global_int(&context, "r3"), 11);
}

#[test]
fn test_recursion_through_self_capture() {
    let (context, _ast) = run(
        "fun fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); }\n\
         var r = fact(6);",
    );
    assert_eq!(global_int(&context, "r"), 720);
}

#[test]
fn test_method_dispatch_and_override() {
    let (context, _ast) = run(
        "class Animal { fun noise() { return 1; } fun kind() { return 10; } }\n\
         class Cow Animal { fun noise() { return 2; } }\n\
         var a = new Animal;\n\
         var c = new Cow;\n\
         var an = a.noise();\n\
         var cn = c.noise();\n\
         var ck = c.kind();",
    );
    assert_eq!(global_int(&context, "an"), 1);
    // The override wins on the subclass…
    assert_eq!(global_int(&context, "cn"), 2);
    // …and unshadowed selectors resolve up the chain.
    assert_eq!(global_int(&context, "ck"), 10);
}

#[test]
fn test_instance_variables_are_per_instance() {
    let (context, _ast) = run(
        "class Box { var v; fun put(x) { v = x; return 0; } fun take() { return v; } }\n\
         var a = new Box;\n\
         var b = new Box;\n\
         a.put(1);\n\
         b.put(2);\n\
         var ra = a.take();\n\
         var rb = b.take();",
    );
    assert_eq!(global_int(&context, "ra"), 1);
    assert_eq!(global_int(&context, "rb"), 2);
}

#[test]
fn test_self_binding_in_methods() {
    let (context, _ast) = run(
        "class Box { var v; fun put(x) { v = x; return 0; } fun take() { return v; } \
          fun doubled() { return self.take() * 2; } }\n\
         var box = new Box;\n\
         box.put(21);\n\
         var r = box.doubled();",
    );
    assert_eq!(global_int(&context, "r"), 42);
}

#[test]
fn test_operator_expands_to_method_on_objects() {
    let (context, _ast) = run(
        "class Vec { var v;\n\
             fun put(n) { v = n; return 0; }\n\
             fun get() { return v; }\n\
             fun add(o) { var r = new Vec; r.put(v + o.get()); return r; }\n\
         }\n\
         var a = new Vec; a.put(1);\n\
         var b = new Vec; b.put(2);\n\
         var c = a + b;\n\
         var r = c.get();",
    );
    assert_eq!(global_int(&context, "r"), 3);
}

#[test]
fn test_string_builtin_methods() {
    let (context, _ast) = run("var s = \"hi\"; var n = s.length(); var c = s.charAt(1);");
    assert_eq!(global_int(&context, "n"), 2);
    assert_eq!(global_int(&context, "c"), i64::from(b'i'));
}

#[test]
fn test_object_comparisons_are_identity() {
    let (context, _ast) = run(
        "class Thing { }\n\
         var a = new Thing;\n\
         var b = new Thing;\n\
         var c = a;\n\
         var eqSame = a == c;\n\
         var eqOther = a == b;\n\
         var neOther = a != b;",
    );
    assert_eq!(global_int(&context, "eqSame"), 1);
    assert_eq!(global_int(&context, "eqOther"), 0);
    assert_eq!(global_int(&context, "neOther"), 1);
}

// =============================================================================
// Errors
// =============================================================================

fn run_err(source: &str) -> RuntimeError {
    let block = parse(source).expect("parse failure");
    let mut context = Context::new();
    context
        .interpret(&block)
        .expect_err("expected a runtime failure")
}

#[test]
fn test_unbound_variable_error() {
    assert!(matches!(
        run_err("var x = missing;"),
        RuntimeError::UnboundName(name) if name == "missing"
    ));
}

#[test]
fn test_unknown_class_error() {
    assert!(matches!(
        run_err("var x = new Ghost;"),
        RuntimeError::UnknownClass(name) if name == "Ghost"
    ));
}

#[test]
fn test_selector_not_found_error() {
    assert!(matches!(
        run_err("var s = \"x\"; s.reverse();"),
        RuntimeError::SelectorNotFound { selector, .. } if selector == "reverse"
    ));
}

#[test]
fn test_calling_non_closure_error() {
    assert!(matches!(run_err("var x = 4; x(1);"), RuntimeError::NotAClosure));
}

#[test]
fn test_division_by_zero_error() {
    assert!(matches!(
        run_err("var z = 0; var x = 1 / z;"),
        RuntimeError::DivisionByZero
    ));
}

#[test]
fn test_ten_argument_call() {
    let (context, _ast) = run(
        "fun big(a, b, c, d, e, f, g, h, i, j) {\n\
             return a + b + c + d + e + f + g + h + i + j;\n\
         }\n\
         var r = big(1, 2, 3, 4, 5, 6, 7, 8, 9, 10);",
    );
    assert_eq!(global_int(&context, "r"), 55);
}

#[test]
fn test_too_many_arguments_error() {
    assert!(matches!(
        run_err("fun f(a) { return a; } f(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11);"),
        RuntimeError::ArityExceeded { count: 11 }
    ));
}

#[test]
fn test_too_many_parameters_error() {
    assert!(matches!(
        run_err("fun f(a, b, c, d, e, g, h, i, j, k, l) { return 0; }"),
        RuntimeError::ArityExceeded { count: 11 }
    ));
}

#[test]
fn test_arity_mismatch_error() {
    assert!(matches!(
        run_err("fun f(a) { return a; } f(1, 2);"),
        RuntimeError::ArityMismatch {
            expected: 1,
            found: 2
        }
    ));
}

#[test]
fn test_error_inside_callee_propagates() {
    assert!(matches!(
        run_err("fun f(d) { return 1 / d; } f(0);"),
        RuntimeError::DivisionByZero
    ));
}

#[test]
fn test_closure_over_unbound_name_fails_at_declaration() {
    // Captures are copied when the closure is constructed, so a free
    // name that resolves nowhere fails right there, not at the call.
    assert!(matches!(
        run_err("fun f() { return mystery; }"),
        RuntimeError::UnboundName(name) if name == "mystery"
    ));
}

#[test]
fn test_context_usable_after_error() {
    let mut context = Context::new();
    let bad = parse("var x = missing;").unwrap();
    assert!(context.interpret(&bad).is_err());
    let good = parse("var y = 3;").unwrap();
    context.interpret(&good).unwrap();
    assert_eq!(context.globals.get("y").unwrap().as_integer(), 3);
    assert_eq!(context.frame_depth(), 0);
}

// =============================================================================
// Collector integration
// =============================================================================

#[test]
fn test_collection_preserves_globals() {
    let (context, _ast) = run(
        "class Junk { var j; }\n\
         var keep = \"kept\";\n\
         var n = 0;\n\
         var t;\n\
         while (n < 100) { t = new Junk; n = n + 1; }",
    );
    let before = mysore_gc::heap_stats().live_objects;
    mysore_gc::collect();
    let after = mysore_gc::heap_stats().live_objects;
    // The abandoned instances were reclaimed…
    assert!(after < before);
    // …while rooted globals survived.
    let kept = context.globals.get("keep").unwrap();
    assert!(kept.needs_gc());
    unsafe {
        let bytes = mysore_runtime::string_bytes(kept.as_ptr());
        assert_eq!(bytes, b"kept");
    }
    assert!(context.globals.get("t").unwrap().needs_gc());
}

#[test]
fn test_obj_remains_word_sized() {
    assert_eq!(std::mem::size_of::<Obj>(), std::mem::size_of::<usize>());
}
