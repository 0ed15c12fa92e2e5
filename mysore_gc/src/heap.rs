//! Block registry, allocation, and the mark-sweep cycle.

use crate::config::GcConfig;
use crate::stats::HeapStats;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::RefCell;

bitflags! {
    /// Per-block state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct BlockFlags: u8 {
        /// Reached during the current mark phase.
        const MARKED = 1 << 0;
        /// Acts as a root; never swept, freed only explicitly.
        const UNCOLLECTABLE = 1 << 1;
    }
}

/// Registry entry for one heap block.
#[derive(Debug, Clone, Copy)]
struct Block {
    /// Allocation size in bytes, rounded up to a word multiple.
    size: usize,
    flags: BlockFlags,
}

/// The heap: a registry of raw blocks plus counters.
struct Heap {
    /// Block base address → block metadata.
    blocks: FxHashMap<usize, Block>,
    config: GcConfig,

    // Counters behind `HeapStats` snapshots.
    total_allocated: u64,
    live_bytes: usize,
    collections: u64,
    allocated_since_collect: usize,
}

impl Heap {
    fn new(config: GcConfig) -> Self {
        Self {
            blocks: FxHashMap::with_capacity_and_hasher(
                config.registry_capacity,
                Default::default(),
            ),
            config,
            total_allocated: 0,
            live_bytes: 0,
            collections: 0,
            allocated_since_collect: 0,
        }
    }

    fn alloc(&mut self, size: usize, flags: BlockFlags) -> *mut u8 {
        // Word-align so the block can be scanned as a whole number of
        // words and its address survives the pointer tag test.
        let size = round_up(size.max(8));
        let layout = layout_for(size);
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        self.blocks.insert(ptr as usize, Block { size, flags });
        self.total_allocated += size as u64;
        self.live_bytes += size;
        self.allocated_since_collect += size;
        ptr
    }

    fn free(&mut self, addr: usize) {
        let block = self
            .blocks
            .remove(&addr)
            .expect("freeing an address the heap does not own");
        self.live_bytes -= block.size;
        unsafe { dealloc(addr as *mut u8, layout_for(block.size)) };
    }

    /// One full mark-sweep cycle. Returns the number of bytes reclaimed.
    fn collect(&mut self) -> usize {
        // Mark phase: roots are the uncollectable blocks.
        let mut worklist: Vec<usize> = Vec::new();
        for (&addr, block) in self.blocks.iter_mut() {
            if block.flags.contains(BlockFlags::UNCOLLECTABLE) {
                block.flags.insert(BlockFlags::MARKED);
                worklist.push(addr);
            } else {
                block.flags.remove(BlockFlags::MARKED);
            }
        }
        while let Some(addr) = worklist.pop() {
            let size = self.blocks[&addr].size;
            for offset in (0..size).step_by(std::mem::size_of::<usize>()) {
                // Conservative: any word that decodes as an untagged,
                // non-null address of a registered block keeps it alive.
                let word = unsafe { *((addr + offset) as *const usize) };
                if word == 0 || word & 7 != 0 {
                    continue;
                }
                if let Some(target) = self.blocks.get_mut(&word) {
                    if !target.flags.contains(BlockFlags::MARKED) {
                        target.flags.insert(BlockFlags::MARKED);
                        worklist.push(word);
                    }
                }
            }
        }

        // Sweep phase.
        let dead: Vec<usize> = self
            .blocks
            .iter()
            .filter(|(_, b)| !b.flags.contains(BlockFlags::MARKED))
            .map(|(&addr, _)| addr)
            .collect();
        let mut reclaimed = 0;
        for addr in dead {
            reclaimed += self.blocks[&addr].size;
            self.free(addr);
        }

        self.collections += 1;
        self.allocated_since_collect = 0;
        reclaimed
    }

    fn stats(&self) -> HeapStats {
        HeapStats {
            total_allocated: self.total_allocated,
            heap_bytes: self.live_bytes as u64,
            live_objects: self.blocks.len() as u64,
            collections: self.collections,
        }
    }
}

#[inline]
fn round_up(size: usize) -> usize {
    (size + 7) & !7
}

#[inline]
fn layout_for(size: usize) -> Layout {
    // Size is always a non-zero word multiple by construction.
    Layout::from_size_align(size, 8).expect("heap block layout")
}

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::new(GcConfig::default()));
}

/// Install a heap configuration.
///
/// Must run before the first allocation to take full effect; a heap that
/// has already allocated keeps its registry but adopts the new
/// thresholds.
pub fn init_heap(config: GcConfig) {
    HEAP.with(|heap| heap.borrow_mut().config = config);
}

/// Allocate a zero-initialized, collector-visible block.
pub fn gc_alloc(size: usize) -> *mut u8 {
    HEAP.with(|heap| heap.borrow_mut().alloc(size, BlockFlags::empty()))
}

/// Allocate a zero-initialized block that the collector treats as a
/// permanent root. Must be released with [`uncollectable_free`].
pub fn uncollectable_alloc(size: usize) -> *mut u8 {
    HEAP.with(|heap| heap.borrow_mut().alloc(size, BlockFlags::UNCOLLECTABLE))
}

/// Release an uncollectable block.
///
/// # Panics
///
/// Panics if `ptr` is not the base of a live uncollectable block.
pub fn uncollectable_free(ptr: *mut u8) {
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        let addr = ptr as usize;
        assert!(
            heap.blocks
                .get(&addr)
                .is_some_and(|b| b.flags.contains(BlockFlags::UNCOLLECTABLE)),
            "uncollectable_free on a non-root block"
        );
        heap.free(addr);
    });
}

/// Run a full collection. Returns the number of bytes reclaimed.
///
/// Only safe to call from quiescent points: no interpreter frame may hold
/// the sole reference to a live object in a native stack slot, because
/// the stack is not scanned.
pub fn collect() -> usize {
    HEAP.with(|heap| heap.borrow_mut().collect())
}

/// Collect if allocation since the last cycle crossed the configured
/// threshold. Returns the bytes reclaimed, or zero when no cycle ran.
pub fn collect_if_needed() -> usize {
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        if heap.allocated_since_collect >= heap.config.collect_threshold {
            heap.collect()
        } else {
            0
        }
    })
}

/// Snapshot the heap counters.
pub fn heap_stats() -> HeapStats {
    HEAP.with(|heap| heap.borrow().stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_aligned() {
        let ptr = gc_alloc(24);
        assert_eq!(ptr as usize & 7, 0);
        for i in 0..24 {
            assert_eq!(unsafe { *ptr.add(i) }, 0);
        }
    }

    #[test]
    fn test_collect_reclaims_unreachable() {
        let before = heap_stats().live_objects;
        let _orphan = gc_alloc(32);
        assert_eq!(heap_stats().live_objects, before + 1);
        collect();
        assert_eq!(heap_stats().live_objects, before);
    }

    #[test]
    fn test_roots_survive_and_trace() {
        let before = heap_stats().live_objects;

        // An object reachable only through an uncollectable slot.
        let obj = gc_alloc(16);
        let root = uncollectable_alloc(8) as *mut usize;
        unsafe { *root = obj as usize };
        collect();
        assert_eq!(heap_stats().live_objects, before + 2);

        // Objects trace transitively: obj -> second.
        let second = gc_alloc(16);
        unsafe { *(obj as *mut usize) = second as usize };
        collect();
        assert_eq!(heap_stats().live_objects, before + 3);

        // Dropping the root frees the whole chain.
        unsafe { *root = 0 };
        uncollectable_free(root as *mut u8);
        collect();
        assert_eq!(heap_stats().live_objects, before);
    }

    #[test]
    fn test_tagged_words_are_not_pointers() {
        let before = heap_stats().live_objects;
        let obj = gc_alloc(16);
        let root = uncollectable_alloc(8) as *mut usize;
        // A small-integer-tagged copy of the address must not keep the
        // object alive.
        unsafe { *root = (obj as usize) | 1 };
        collect();
        assert_eq!(heap_stats().live_objects, before + 1);
        uncollectable_free(root as *mut u8);
    }

    #[test]
    #[should_panic(expected = "non-root block")]
    fn test_free_requires_root() {
        let ptr = gc_alloc(8);
        uncollectable_free(ptr);
    }
}
