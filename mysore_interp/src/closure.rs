//! Closure construction and interpreted invocation, with the tiered
//! handoff.
//!
//! Bound variables are captured **by value** when the closure object is
//! constructed; each invocation binds their names to slots inside the
//! closure object itself, so mutations persist across calls of that
//! object but are never visible to the scope that was captured.

use crate::context::{make_current, Context, SymbolTable};
use crate::eval::interpret_statements;
use crate::trampoline;
use mysore_compiler::{compile_closure, compile_method};
use mysore_core::{CompiledMethod, Obj, RuntimeError, Selector, MAX_ARITY};
use mysore_parser::ClosureDecl;
use mysore_runtime::{
    call_compiled_closure, call_compiled_method, closure_alloc, closure_bound_vars,
    instance_ivars, isa, take_pending, Closure, Method,
};
use std::rc::Rc;

/// Construct a closure object from a declaration.
///
/// Runs capture analysis, allocates the object with one trailing slot
/// per bound variable, installs the compiled entry if the declaration
/// already has one (trampoline otherwise), binds the closure's own name
/// in the current scope, and then copies the current values of the
/// bound variables. Binding the name first is what lets a closure
/// capture itself for recursion.
pub fn evaluate_closure_decl(
    context: &mut Context,
    decl: &Rc<ClosureDecl>,
) -> Result<Obj, RuntimeError> {
    let arity = decl.arity();
    if arity > MAX_ARITY {
        return Err(RuntimeError::ArityExceeded { count: arity });
    }
    let bound_vars = decl.bound_vars();
    let closure = closure_alloc(bound_vars.len());
    unsafe {
        (*closure).parameters = Obj::from_integer(arity as i64);
        (*closure).ast = Rc::as_ptr(decl);
        (*closure).invoke = decl
            .compiled()
            .unwrap_or_else(|| trampoline::closure_trampoline(arity));
    }
    let object = Obj::from_ptr(closure);
    context.set_symbol(&decl.name, object);
    let slots = unsafe { closure_bound_vars(closure) };
    for (index, name) in bound_vars.iter().enumerate() {
        let address = context
            .lookup_symbol(name)
            .ok_or_else(|| RuntimeError::UnboundName(name.clone()))?;
        unsafe { *slots.add(index) = *address };
    }
    Ok(object)
}

/// Interpreted entry for a closure: the tiered protocol, then the tree
/// walker.
pub fn interpret_closure(
    context: &mut Context,
    decl: &ClosureDecl,
    closure: *mut Closure,
    args: &mut [Obj],
) -> Result<Obj, RuntimeError> {
    decl.check();

    // Tier check: the entry that reaches the threshold compiles, and
    // any entry that sees compiled code runs it and returns directly.
    let count = decl.bump_execution_count();
    if count == context.compile_threshold {
        if let Some(entry) = compile_closure(decl, &mut context.globals) {
            context.stats.compilations += 1;
            decl.set_compiled(entry);
            unsafe { (*closure).invoke = entry };
        }
    }
    if let Some(entry) = decl.compiled() {
        context.stats.compiled_dispatches += 1;
        make_current(context);
        let result = unsafe { call_compiled_closure(entry, closure, args) };
        return match take_pending() {
            Some(error) => Err(error),
            None => Ok(result),
        };
    }

    context.stats.tree_walk_entries += 1;
    let mut frame = SymbolTable::default();
    unsafe { context.push_symbols(&mut frame) };

    // Parameters alias the caller's argument array; bound variables
    // alias the slots inside the closure object.
    for (index, parameter) in decl.parameters.iter().enumerate() {
        context.bind(parameter, &mut args[index]);
    }
    let slots = unsafe { closure_bound_vars(closure) };
    for (index, name) in decl.bound_vars().iter().enumerate() {
        context.bind(name, unsafe { slots.add(index) });
    }

    let result = interpret_statements(context, &decl.body);
    finish_invocation(context, result)
}

/// Interpreted entry for a method.
pub fn interpret_method(
    context: &mut Context,
    decl: &Rc<ClosureDecl>,
    method: &Method,
    mut receiver: Obj,
    cmd: Selector,
    args: &mut [Obj],
) -> Result<Obj, RuntimeError> {
    decl.check();
    let class = unsafe { isa(receiver) };

    let count = decl.bump_execution_count();
    if count == context.compile_threshold {
        if let Some(entry) = compile_method(decl, class, &mut context.globals) {
            context.stats.compilations += 1;
            method.set_function(entry);
            // The declaration-level cache is shared with the closure
            // path; a declaration is only ever one of the two.
            decl.set_compiled(unsafe {
                mysore_core::ClosureInvoke::from_raw(entry.as_raw())
            });
        }
    }
    if let Some(compiled) = decl.compiled() {
        context.stats.compiled_dispatches += 1;
        make_current(context);
        let entry = unsafe { CompiledMethod::from_raw(compiled.as_raw()) };
        let result = unsafe { call_compiled_method(entry, receiver, cmd, args) };
        return match take_pending() {
            Some(error) => Err(error),
            None => Ok(result),
        };
    }

    context.stats.tree_walk_entries += 1;
    let mut frame = SymbolTable::default();
    unsafe { context.push_symbols(&mut frame) };

    for (index, parameter) in decl.parameters.iter().enumerate() {
        context.bind(parameter, &mut args[index]);
    }
    // The receiver and selector get context cells on this native frame.
    let mut cmd_obj = cmd.as_obj();
    context.bind("self", &mut receiver);
    context.bind("cmd", &mut cmd_obj);
    // Instance variables of the receiver's class bind to their slots
    // inside the receiver.
    if receiver.needs_gc() {
        let ivars = unsafe { instance_ivars(receiver) };
        for (index, name) in class.ivar_names.iter().enumerate() {
            context.bind(name, unsafe { ivars.add(index) });
        }
    }

    let result = interpret_statements(context, &decl.body);
    finish_invocation(context, result)
}

/// Epilogue shared by both invocation forms: collect the return value,
/// clear the return signal, and pop the frame. Error exits pop too, so
/// the frame referencing this native stack never outlives it.
fn finish_invocation(
    context: &mut Context,
    result: Result<(), RuntimeError>,
) -> Result<Obj, RuntimeError> {
    let ret_val = context.ret_val;
    context.ret_val = Obj::NULL;
    context.is_returning = false;
    context.pop_symbols();
    result.map(|()| ret_val)
}
