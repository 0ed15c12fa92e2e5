//! Tree-walking interpreter and tiered-execution protocol.
//!
//! # Architecture
//!
//! ```text
//!  Statements ──interpret──▶ evaluator (eval)
//!                              │
//!                 dispatch through native entry points
//!                              │
//!        ┌─────────────────────┴──────────────────────┐
//!        ▼                                            ▼
//!  trampolines (this crate)                 compiled entries
//!  re-enter interpret_closure /             (mysore_compiler)
//!  interpret_method via the                 run the bytecode
//!  thread-local current context             executor
//! ```
//!
//! Every closure and method starts life behind a trampoline of its
//! arity. The first `compile_threshold` interpreted entries run the
//! tree walker; the entry that reaches the threshold invokes the code
//! generator, installs the compiled entry in the declaration, the
//! closure object, and (for methods) the method table, and from then on
//! every path, the trampoline itself included, calls the compiled
//! code and returns its result directly.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod closure;
pub mod context;
pub mod eval;
pub mod trampoline;

pub use context::{Context, InterpStats, DEFAULT_COMPILE_THRESHOLD};
pub use eval::{evaluate, interpret_statements};
