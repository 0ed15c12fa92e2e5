//! The register-machine executor for compiled bodies.
//!
//! Runs a [`CodeObject`] against a frame of registers. Unlike the tree
//! walker it needs no interpreter context: globals were resolved to cell
//! addresses at compile time, and calls go through the same native
//! entry points every caller uses. A failure raises into the pending
//! slot and unwinds by returning null through the native convention.

use crate::bytecode::{CaptureSource, CodeObject, Insn};
use mysore_core::{Obj, RuntimeError, Selector};
use mysore_runtime::{
    call_compiled_closure, call_compiled_method, closure_alloc, closure_bound_vars, has_pending,
    instance_ivars, instance_new, is_closure, lookup_selector, pending, resolve_method,
    trampolines, Closure,
};
use smallvec::{smallvec, SmallVec};
use std::rc::Rc;

/// The implicit state a compiled body receives from its entry stub.
pub enum EntryFrame {
    /// Closure code: the invoked closure object.
    Closure(*mut Closure),
    /// Method code: the receiver and the selector it was sent.
    Method {
        /// The receiver.
        receiver: Obj,
        /// The selector, for `cmd`.
        cmd: Selector,
    },
}

/// Execute a compiled body. Returns the result, or null with a pending
/// error recorded.
pub fn execute(code: &CodeObject, frame: &EntryFrame, args: &[Obj]) -> Obj {
    let mut regs: SmallVec<[Obj; 32]> = smallvec![Obj::NULL; code.register_count as usize];
    regs[..args.len()].copy_from_slice(args);

    let mut pc = 0usize;
    loop {
        let insn = code.instructions[pc];
        pc += 1;
        match insn {
            Insn::LoadConst { dst, index } => {
                regs[dst as usize] = code.constant(index);
            }
            Insn::LoadNull { dst } => {
                regs[dst as usize] = Obj::NULL;
            }
            Insn::Move { dst, src } => {
                regs[dst as usize] = regs[src as usize];
            }
            Insn::LoadGlobal { dst, index } => {
                regs[dst as usize] = unsafe { (*code.globals[index as usize]).get() };
            }
            Insn::StoreGlobal { index, src } => unsafe {
                let cell = code.globals[index as usize];
                (*cell).set(regs[src as usize]);
            },
            Insn::LoadBound { dst, index } => {
                let closure = frame_closure(frame);
                regs[dst as usize] =
                    unsafe { *closure_bound_vars(closure).add(index as usize) };
            }
            Insn::StoreBound { index, src } => {
                let closure = frame_closure(frame);
                unsafe {
                    *closure_bound_vars(closure).add(index as usize) = regs[src as usize];
                }
            }
            Insn::LoadSelf { dst } => {
                regs[dst as usize] = frame_receiver(frame);
            }
            Insn::LoadCmd { dst } => {
                regs[dst as usize] = frame_cmd(frame).as_obj();
            }
            Insn::LoadIvar { dst, slot } => {
                let receiver = frame_receiver(frame);
                regs[dst as usize] =
                    unsafe { *instance_ivars(receiver).add(slot as usize) };
            }
            Insn::StoreIvar { slot, src } => {
                let receiver = frame_receiver(frame);
                unsafe {
                    *instance_ivars(receiver).add(slot as usize) = regs[src as usize];
                }
            }
            Insn::BinOp { op, dst, lhs, rhs } => {
                let l = regs[lhs as usize];
                let r = regs[rhs as usize];
                if op.is_comparison() || (l.is_integer() && r.is_integer()) {
                    match op.apply_integers(l.untagged(), r.untagged()) {
                        Ok(value) => regs[dst as usize] = Obj::from_integer(value),
                        Err(error) => return fail(error),
                    }
                } else {
                    let selector =
                        lookup_selector(op.method_name().expect("arithmetic operator"));
                    let method = match resolve_method(l, selector) {
                        Ok(method) => method,
                        Err(error) => return fail(error),
                    };
                    if method.args != 1 {
                        return fail(RuntimeError::ArityMismatch {
                            expected: method.args,
                            found: 1,
                        });
                    }
                    let result =
                        unsafe { call_compiled_method(method.function(), l, selector, &[r]) };
                    if has_pending() {
                        return Obj::NULL;
                    }
                    regs[dst as usize] = result;
                }
            }
            Insn::Jump { target } => {
                pc = target as usize;
            }
            Insn::JumpIfFalse { cond, target } => {
                if !regs[cond as usize].is_truthy() {
                    pc = target as usize;
                }
            }
            Insn::CallClosure {
                dst,
                callee,
                first_arg,
                argc,
            } => {
                let target = regs[callee as usize];
                if !is_closure(target) {
                    return fail(RuntimeError::NotAClosure);
                }
                let closure = target.as_ptr::<Closure>();
                let expected = unsafe { (*closure).parameters }.as_integer() as usize;
                if expected != argc as usize {
                    return fail(RuntimeError::ArityMismatch {
                        expected,
                        found: argc as usize,
                    });
                }
                let window = &regs[first_arg as usize..first_arg as usize + argc as usize];
                let invoke = unsafe { (*closure).invoke };
                let result = unsafe { call_compiled_closure(invoke, closure, window) };
                if has_pending() {
                    return Obj::NULL;
                }
                regs[dst as usize] = result;
            }
            Insn::CallMethod {
                dst,
                receiver,
                selector,
                first_arg,
                argc,
            } => {
                let target = regs[receiver as usize];
                let method = match resolve_method(target, selector) {
                    Ok(method) => method,
                    Err(error) => return fail(error),
                };
                if method.args != argc as usize {
                    return fail(RuntimeError::ArityMismatch {
                        expected: method.args,
                        found: argc as usize,
                    });
                }
                let window = &regs[first_arg as usize..first_arg as usize + argc as usize];
                let result =
                    unsafe { call_compiled_method(method.function(), target, selector, window) };
                if has_pending() {
                    return Obj::NULL;
                }
                regs[dst as usize] = result;
            }
            Insn::New { dst, class } => {
                regs[dst as usize] = instance_new(class);
            }
            Insn::MakeClosure { dst, index } => {
                let template = &code.templates[index as usize];
                let decl = &template.decl;
                let closure = closure_alloc(decl.bound_vars().len());
                unsafe {
                    (*closure).parameters = Obj::from_integer(decl.arity() as i64);
                    (*closure).ast = Rc::as_ptr(decl);
                    (*closure).invoke = decl
                        .compiled()
                        .unwrap_or_else(|| trampolines::closure_trampoline(decl.arity()));
                }
                // Bind the closure before copying captures so it can
                // capture itself for recursion.
                regs[dst as usize] = Obj::from_ptr(closure);
                let bound = unsafe { closure_bound_vars(closure) };
                for (slot, source) in template.captures.iter().enumerate() {
                    let value = match *source {
                        CaptureSource::Local(reg) => regs[reg as usize],
                        CaptureSource::Bound(outer) => unsafe {
                            *closure_bound_vars(frame_closure(frame)).add(outer as usize)
                        },
                        CaptureSource::Ivar(ivar_slot) => unsafe {
                            *instance_ivars(frame_receiver(frame)).add(ivar_slot as usize)
                        },
                        CaptureSource::Selfv => frame_receiver(frame),
                        CaptureSource::Cmd => frame_cmd(frame).as_obj(),
                        CaptureSource::Global(cell) => unsafe {
                            (*code.globals[cell as usize]).get()
                        },
                    };
                    unsafe { *bound.add(slot) = value };
                }
            }
            Insn::Return { src } => return regs[src as usize],
            Insn::ReturnNull => return Obj::NULL,
        }
    }
}

fn fail(error: RuntimeError) -> Obj {
    pending::raise(error);
    Obj::NULL
}

fn frame_closure(frame: &EntryFrame) -> *mut Closure {
    match frame {
        EntryFrame::Closure(closure) => *closure,
        EntryFrame::Method { .. } => unreachable!("bound-variable access in method code"),
    }
}

fn frame_receiver(frame: &EntryFrame) -> Obj {
    match frame {
        EntryFrame::Method { receiver, .. } => *receiver,
        EntryFrame::Closure(_) => unreachable!("receiver access in closure code"),
    }
}

fn frame_cmd(frame: &EntryFrame) -> Selector {
    match frame {
        EntryFrame::Method { cmd, .. } => *cmd,
        EntryFrame::Closure(_) => unreachable!("selector access in closure code"),
    }
}
