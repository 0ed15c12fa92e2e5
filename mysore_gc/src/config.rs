//! Heap configuration parameters.

/// Configuration for the heap.
///
/// # Example
///
/// ```ignore
/// use mysore_gc::GcConfig;
///
/// let config = GcConfig {
///     registry_capacity: 4096,
///     ..Default::default()
/// };
/// mysore_gc::init_heap(config);
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Initial capacity of the block registry, in blocks.
    ///
    /// Sized generously up front to keep the registry from rehashing
    /// during the first bursts of allocation.
    ///
    /// Default: 1024
    pub registry_capacity: usize,

    /// Bytes allocated since the last collection before
    /// `collect_if_needed` performs one.
    ///
    /// Default: 1 MiB
    pub collect_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 1024,
            collect_threshold: 1024 * 1024,
        }
    }
}
