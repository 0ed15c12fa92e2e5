//! The AST evaluator.

use crate::closure::evaluate_closure_decl;
use crate::context::{make_current, Context};
use crate::trampoline;
use mysore_core::{Obj, RuntimeError, MAX_ARITY};
use mysore_parser::ast::{ClassDecl, ExprKind, StmtKind};
use mysore_parser::{Expr, Statements, Stmt};
use mysore_runtime::{
    call_compiled_closure, call_compiled_method, instance_new, is_closure, lookup_class,
    lookup_selector, register_class, resolve_method, string_new, take_pending, Class, Closure,
    Method,
};
use std::cell::Cell;
use std::rc::Rc;

/// Interpret a statement block: each statement in order, stopping as
/// soon as a `return` has fired.
pub fn interpret_statements(
    context: &mut Context,
    block: &Statements,
) -> Result<(), RuntimeError> {
    for stmt in &block.statements {
        if context.is_returning {
            return Ok(());
        }
        interpret_stmt(context, stmt)?;
    }
    Ok(())
}

fn interpret_stmt(context: &mut Context, stmt: &Stmt) -> Result<(), RuntimeError> {
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            evaluate(context, expr)?;
        }
        StmtKind::Decl { name, init } => {
            // Even a null initializer goes through the assignment so a
            // top-level declaration always materializes its global cell.
            let value = match init {
                Some(init) => evaluate(context, init)?,
                None => Obj::NULL,
            };
            context.set_symbol(name, value);
        }
        StmtKind::Assign { target, value } => {
            let value = evaluate(context, value)?;
            context.set_symbol(target, value);
        }
        StmtKind::If { condition, body } => {
            if evaluate(context, condition)?.is_truthy() {
                interpret_statements(context, body)?;
            }
        }
        StmtKind::While { condition, body } => {
            // The loop header itself never consults the return signal;
            // the contained block stops early and the condition decides
            // whether the body is entered again.
            while evaluate(context, condition)?.is_truthy() {
                interpret_statements(context, body)?;
            }
        }
        StmtKind::Return(expr) => {
            context.ret_val = evaluate(context, expr)?;
            context.is_returning = true;
        }
        StmtKind::Class(decl) => {
            interpret_class(context, decl)?;
        }
    }
    Ok(())
}

/// Evaluate an expression, with constant-expression caching: the first
/// successful evaluation of a constant expression stores its result on
/// the node, and every later evaluation returns that same object.
pub fn evaluate(context: &mut Context, expr: &Expr) -> Result<Obj, RuntimeError> {
    let cached = expr.cached();
    if !cached.is_null() {
        return Ok(cached);
    }
    let result = evaluate_expr(context, expr)?;
    if expr.is_constant_expression() {
        expr.store_cache(result);
    }
    Ok(result)
}

fn evaluate_expr(context: &mut Context, expr: &Expr) -> Result<Obj, RuntimeError> {
    match &expr.kind {
        ExprKind::Number(value) => Ok(Obj::from_integer(*value)),
        ExprKind::StringLit(text) => Ok(string_new(text)),
        ExprKind::Var(name) => {
            let address = context
                .lookup_symbol(name)
                .ok_or_else(|| RuntimeError::UnboundName(name.clone()))?;
            Ok(unsafe { *address })
        }
        ExprKind::BinOp { op, lhs, rhs } => {
            let lhs = evaluate(context, lhs)?;
            let rhs = evaluate(context, rhs)?;
            // Comparisons work on untagged words even for objects; only
            // arithmetic on non-integers becomes a message send.
            if op.is_comparison() || (lhs.is_integer() && rhs.is_integer()) {
                let value = op.apply_integers(lhs.untagged(), rhs.untagged())?;
                Ok(Obj::from_integer(value))
            } else {
                let selector =
                    lookup_selector(op.method_name().expect("arithmetic operator"));
                let method = resolve_method(lhs, selector)?;
                check_arity(method.args, 1)?;
                make_current(context);
                let result = unsafe {
                    call_compiled_method(method.function(), lhs, selector, &[rhs])
                };
                drain_pending(result)
            }
        }
        ExprKind::Call {
            callee,
            method,
            arguments,
        } => {
            // The callee first, then the arguments left to right, into
            // a fixed-capacity window sized by the trampoline cap.
            let callee = evaluate(context, callee)?;
            if arguments.len() > MAX_ARITY {
                return Err(RuntimeError::ArityExceeded {
                    count: arguments.len(),
                });
            }
            let mut args = [Obj::NULL; MAX_ARITY];
            for (index, argument) in arguments.iter().enumerate() {
                args[index] = evaluate(context, argument)?;
            }
            let args = &mut args[..arguments.len()];

            match method {
                None => {
                    if !is_closure(callee) {
                        return Err(RuntimeError::NotAClosure);
                    }
                    let closure = callee.as_ptr::<Closure>();
                    let expected =
                        unsafe { (*closure).parameters }.as_integer() as usize;
                    check_arity(expected, args.len())?;
                    make_current(context);
                    let invoke = unsafe { (*closure).invoke };
                    let result =
                        unsafe { call_compiled_closure(invoke, closure, args) };
                    drain_pending(result)
                }
                Some(name) => {
                    let selector = lookup_selector(name);
                    let method = resolve_method(callee, selector)?;
                    check_arity(method.args, args.len())?;
                    make_current(context);
                    let result = unsafe {
                        call_compiled_method(method.function(), callee, selector, args)
                    };
                    drain_pending(result)
                }
            }
        }
        ExprKind::New(class_name) => {
            let class = lookup_class(class_name)
                .ok_or_else(|| RuntimeError::UnknownClass(class_name.clone()))?;
            Ok(instance_new(class))
        }
        ExprKind::Closure(decl) => evaluate_closure_decl(context, decl),
    }
}

#[inline]
fn check_arity(expected: usize, found: usize) -> Result<(), RuntimeError> {
    if expected == found {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch { expected, found })
    }
}

/// Turn an error raised across a native boundary back into a `Result`.
#[inline]
fn drain_pending(result: Obj) -> Result<Obj, RuntimeError> {
    match take_pending() {
        Some(error) => Err(error),
        None => Ok(result),
    }
}

// =============================================================================
// Class declarations
// =============================================================================

fn interpret_class(context: &mut Context, decl: &ClassDecl) -> Result<(), RuntimeError> {
    let superclass = match &decl.superclass {
        Some(name) => Some(
            lookup_class(name).ok_or_else(|| RuntimeError::UnknownClass(name.clone()))?,
        ),
        None => None,
    };

    let mut methods = Vec::with_capacity(decl.methods.len());
    for method_decl in &decl.methods {
        let arity = method_decl.arity();
        if arity > MAX_ARITY {
            return Err(RuntimeError::ArityExceeded { count: arity });
        }
        methods.push(Method {
            selector: lookup_selector(&method_decl.name),
            args: arity,
            function: Cell::new(trampoline::method_trampoline(arity)),
            ast: Some(Rc::clone(method_decl)),
        });
    }

    // The class table persists for the process; everything it owns is
    // leaked deliberately.
    let ivar_names: Vec<&'static str> = decl
        .ivars
        .iter()
        .map(|name| &*Box::leak(name.clone().into_boxed_str()))
        .collect();
    let class = Box::leak(Box::new(Class {
        superclass,
        name: Box::leak(decl.name.clone().into_boxed_str()),
        methods,
        ivar_names,
    }));
    register_class(&decl.name, class);
    Ok(())
}
