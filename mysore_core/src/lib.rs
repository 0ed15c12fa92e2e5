//! Core value representation for the MysoreScript runtime.
//!
//! This crate defines the types shared by every other crate in the
//! workspace:
//!
//! - [`Obj`]: the tagged machine word that every MysoreScript value is
//!   encoded in (small integer, heap pointer, or null)
//! - [`Selector`]: an interned handle for a method name
//! - [`Span`]: byte range into a source buffer
//! - [`RuntimeError`]: the runtime error taxonomy
//! - [`ClosureInvoke`] / [`CompiledMethod`]: opaque native entry points
//!   for closures and methods
//!
//! Everything here is representation only; allocation lives in
//! `mysore_gc` and the object model in `mysore_runtime`.

pub mod error;
pub mod invoke;
pub mod obj;
pub mod selector;
pub mod span;

pub use error::{RuntimeError, MAX_ARITY};
pub use invoke::{ClosureInvoke, CompiledMethod};
pub use obj::{Obj, INTEGER_BITS, MAX_SMALL_INT, MIN_SMALL_INT};
pub use selector::Selector;
pub use span::Span;

/// Runtime version string, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
