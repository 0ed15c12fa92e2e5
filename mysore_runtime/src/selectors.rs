//! Selector interning.
//!
//! Method names intern to small non-zero integers so dispatch compares
//! one word. Interning is monotonic: a name is assigned a selector once
//! and keeps it for the life of the process.

use mysore_core::Selector;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

struct SelectorTable {
    /// Name → selector.
    by_name: FxHashMap<String, Selector>,
    /// Selector (1-based) → name, for diagnostics.
    names: Vec<String>,
}

impl SelectorTable {
    fn new() -> Self {
        Self {
            by_name: FxHashMap::default(),
            names: Vec::new(),
        }
    }
}

static SELECTORS: OnceLock<RwLock<SelectorTable>> = OnceLock::new();

fn table() -> &'static RwLock<SelectorTable> {
    SELECTORS.get_or_init(|| RwLock::new(SelectorTable::new()))
}

/// Intern a method name.
///
/// Equal names always return equal selectors; the result is never the
/// zero (invalid) selector.
pub fn lookup_selector(name: &str) -> Selector {
    // Fast path: already interned.
    if let Some(&selector) = table().read().by_name.get(name) {
        return selector;
    }
    let mut guard = table().write();
    // Racing interners may have won; re-check under the write lock.
    if let Some(&selector) = guard.by_name.get(name) {
        return selector;
    }
    guard.names.push(name.to_string());
    let selector = Selector::from_raw(guard.names.len() as u32);
    guard.by_name.insert(name.to_string(), selector);
    selector
}

/// The name a selector was interned from, for error messages.
pub fn selector_name(selector: Selector) -> Option<String> {
    let index = selector.raw().checked_sub(1)? as usize;
    table().read().names.get(index).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let a = lookup_selector("testSelectorAlpha");
        let b = lookup_selector("testSelectorAlpha");
        assert_eq!(a, b);
        assert!(a.is_valid());
    }

    #[test]
    fn test_distinct_names_distinct_selectors() {
        let a = lookup_selector("testSelectorBeta");
        let b = lookup_selector("testSelectorGamma");
        assert_ne!(a, b);
    }

    #[test]
    fn test_selector_name_round_trip() {
        let sel = lookup_selector("testSelectorDelta");
        assert_eq!(selector_name(sel).as_deref(), Some("testSelectorDelta"));
    }

    #[test]
    fn test_invalid_selector_has_no_name() {
        assert_eq!(selector_name(Selector::from_raw(0)), None);
    }
}
