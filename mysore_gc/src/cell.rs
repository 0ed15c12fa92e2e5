//! GC-rooted value cells.

use crate::heap::{uncollectable_alloc, uncollectable_free};
use mysore_core::Obj;

/// A storage cell that keeps its contents visible to the collector.
///
/// Small integers and null hide inside the tag bits, so a cell holding
/// one needs no root. The moment a heap pointer is stored, the cell
/// mirrors it into an uncollectable slot that the mark phase treats as a
/// root; when the value goes back to a hidden kind, the root is released.
/// Globals and constant-expression caches are built from these cells.
pub struct Value {
    /// The current value, read directly by the interpreter.
    object: Obj,
    /// Root slot mirroring `object`, present exactly while
    /// `object.needs_gc()` holds.
    holder: *mut Obj,
}

impl Value {
    /// A cell holding null.
    #[inline]
    pub fn new() -> Self {
        Value {
            object: Obj::NULL,
            holder: std::ptr::null_mut(),
        }
    }

    /// A cell holding `initial`.
    pub fn with(initial: Obj) -> Self {
        let mut cell = Value::new();
        cell.set(initial);
        cell
    }

    /// The held value.
    #[inline]
    pub fn get(&self) -> Obj {
        self.object
    }

    /// Store a value, creating, updating, or releasing the root slot as
    /// the tagged kind changes.
    pub fn set(&mut self, value: Obj) {
        match (self.object.needs_gc(), value.needs_gc()) {
            (true, false) => {
                debug_assert!(!self.holder.is_null());
                uncollectable_free(self.holder as *mut u8);
                self.holder = std::ptr::null_mut();
            }
            (false, true) => {
                debug_assert!(self.holder.is_null());
                self.holder = uncollectable_alloc(std::mem::size_of::<Obj>()) as *mut Obj;
                unsafe { *self.holder = value };
            }
            (true, true) => {
                unsafe { *self.holder = value };
            }
            (false, false) => {}
        }
        self.object = value;
    }

    /// Address of the stored word, for read access through symbol
    /// tables. Writes must go through [`set`](Self::set) so the root
    /// stays in sync.
    #[inline]
    pub fn address(&mut self) -> *mut Obj {
        &mut self.object
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::new()
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if self.object.needs_gc() {
            debug_assert!(!self.holder.is_null());
            uncollectable_free(self.holder as *mut u8);
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Value").field(&self.object).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{collect, gc_alloc, heap_stats};

    fn heap_obj() -> Obj {
        Obj::from_ptr(gc_alloc(16))
    }

    #[test]
    fn test_cell_roots_heap_values() {
        let before = heap_stats().live_objects;
        let mut cell = Value::new();
        cell.set(heap_obj());
        // Object plus its root slot.
        assert_eq!(heap_stats().live_objects, before + 2);
        collect();
        assert_eq!(heap_stats().live_objects, before + 2);
        assert!(cell.get().needs_gc());
    }

    #[test]
    fn test_cell_releases_root_on_integer() {
        let before = heap_stats().live_objects;
        let mut cell = Value::new();
        cell.set(heap_obj());
        cell.set(Obj::from_integer(3));
        collect();
        // Root slot freed, object swept.
        assert_eq!(heap_stats().live_objects, before);
        assert_eq!(cell.get().as_integer(), 3);
    }

    #[test]
    fn test_cell_interleaved_kinds() {
        let before = heap_stats().live_objects;
        let mut cell = Value::new();

        cell.set(Obj::from_integer(1));
        cell.set(heap_obj());
        let first = cell.get();
        collect();
        assert!(heap_stats().live_objects > before);

        // Heap-to-heap keeps the same root slot; the first object dies.
        cell.set(heap_obj());
        collect();
        assert_eq!(heap_stats().live_objects, before + 2);
        assert_ne!(cell.get(), first);

        cell.set(Obj::NULL);
        collect();
        assert_eq!(heap_stats().live_objects, before);
    }

    #[test]
    fn test_cell_drop_releases_root() {
        let before = heap_stats().live_objects;
        {
            let mut cell = Value::new();
            cell.set(heap_obj());
        }
        collect();
        assert_eq!(heap_stats().live_objects, before);
    }
}
