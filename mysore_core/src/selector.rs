//! Interned method-name handles.

use crate::Obj;

/// An interned handle for a method name.
///
/// Selectors are small non-zero integers assigned monotonically by the
/// selector table in `mysore_runtime`. Equal names always intern to equal
/// selectors, so method dispatch compares a single integer instead of a
/// string.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(u32);

impl Selector {
    /// Reconstruct from a raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Selector(raw)
    }

    /// The raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Selectors are never zero; zero marks an invalid handle.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Box the selector as a small integer, for binding `cmd` inside a
    /// method body.
    #[inline]
    pub const fn as_obj(self) -> Obj {
        Obj::from_integer(self.0 as i64)
    }
}
