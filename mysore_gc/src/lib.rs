//! Conservative heap and root management for the MysoreScript runtime.
//!
//! # Architecture
//!
//! The heap is a registry of raw, zero-initialized, 8-byte-aligned blocks.
//! Object references are always block base addresses, so a conservative
//! scan only needs an exact registry lookup per candidate word:
//!
//! - **Collectable blocks** hold language objects (strings, closures,
//!   instances). They are reclaimed by [`collect`] when unreachable.
//! - **Uncollectable blocks** are roots: the collector marks outward from
//!   every word they contain and never frees them on its own. They back
//!   the value cells used for globals and constant-expression caches,
//!   and must be released with [`uncollectable_free`].
//!
//! [`collect`] marks from the uncollectable set, scans each marked block
//! word by word for further block addresses, and sweeps whatever stayed
//! unmarked. Native stack frames are *not* scanned, so collections run
//! only from the driver's quiescent points (between top-level statement
//! blocks), never from inside an allocation.
//!
//! The heap is thread-local, like the interpreter's current-context
//! pointer: the runtime is single-threaded by design, and keeping the
//! heap per-thread makes that explicit.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod cell;
pub mod config;
pub mod heap;
pub mod stats;

pub use cell::Value;
pub use config::GcConfig;
pub use heap::{
    collect, collect_if_needed, gc_alloc, heap_stats, init_heap, uncollectable_alloc,
    uncollectable_free,
};
pub use stats::HeapStats;
