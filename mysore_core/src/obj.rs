//! Tagged object words and the small-integer encoding.
//!
//! Every MysoreScript value is a single machine word. The low three bits
//! carry the tag:
//!
//! ```text
//! ┌────────────────────────────────────────────┬─────┐
//! │ 61-bit signed integer payload              │ ..1 │  small integer
//! ├────────────────────────────────────────────┼─────┤
//! │ 8-byte-aligned heap address (non-zero)     │ 000 │  object pointer
//! ├────────────────────────────────────────────┴─────┤
//! │ all zero                                         │  null
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Only untagged heap pointers are visible to the garbage collector; small
//! integers and null hide from it inside the tag bits.

/// Width of the integer payload: a machine word minus the three tag bits.
pub const INTEGER_BITS: u32 = usize::BITS - 3;

/// Largest value representable as a small integer.
pub const MAX_SMALL_INT: i64 = (1 << (INTEGER_BITS - 1)) - 1;

/// Smallest value representable as a small integer.
pub const MIN_SMALL_INT: i64 = -(1 << (INTEGER_BITS - 1));

/// A tagged MysoreScript value.
///
/// `Obj` is `Copy` and exactly one word wide, so it can be stored in raw
/// heap slots, passed through fixed-signature native entry points, and
/// scanned conservatively by the collector.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Obj(usize);

impl Obj {
    /// The null value.
    pub const NULL: Obj = Obj(0);

    /// Reconstruct a value from its raw word.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Obj(raw)
    }

    /// The raw word.
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Check for null.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check the small-integer tag.
    #[inline]
    pub const fn is_integer(self) -> bool {
        (self.0 & 1) == 1
    }

    /// Encode a small integer.
    ///
    /// Values outside the 61-bit range wrap: the shift into the payload
    /// discards the high bits, giving two's-complement wraparound at
    /// [`INTEGER_BITS`] bits.
    #[inline]
    pub const fn from_integer(value: i64) -> Self {
        Obj(((value as usize) << 3) | 1)
    }

    /// Decode a small integer with an arithmetic shift, preserving sign.
    ///
    /// Debug-asserts that the integer tag is present; release builds
    /// decode whatever word is there.
    #[inline]
    pub fn as_integer(self) -> i64 {
        debug_assert!(self.is_integer(), "as_integer on a non-integer word");
        (self.0 as isize >> 3) as i64
    }

    /// Decode the word as an integer without checking the tag.
    ///
    /// Used by comparison operators, which untag both operands regardless
    /// of kind so that pointer identity degrades to integer equality.
    #[inline]
    pub const fn untagged(self) -> i64 {
        (self.0 as isize >> 3) as i64
    }

    /// Whether this value is a heap pointer the collector must see.
    #[inline]
    pub const fn needs_gc(self) -> bool {
        self.0 != 0 && (self.0 & 7) == 0
    }

    /// The truthiness rule: any value other than null and small-integer
    /// zero is true. Clearing the tag bits makes both of those zero.
    #[inline]
    pub const fn is_truthy(self) -> bool {
        (self.0 & !7) != 0
    }

    /// Wrap a heap pointer.
    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        let obj = Obj(ptr as usize);
        debug_assert!(obj.is_null() || obj.needs_gc(), "misaligned heap pointer");
        obj
    }

    /// View the word as a heap pointer.
    ///
    /// Debug-asserts that this is a non-null untagged pointer.
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        debug_assert!(self.needs_gc(), "as_ptr on a non-pointer word");
        self.0 as *mut T
    }
}

impl Default for Obj {
    #[inline]
    fn default() -> Self {
        Obj::NULL
    }
}

impl std::fmt::Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else if self.is_integer() {
            write!(f, "Int({})", self.as_integer())
        } else if self.needs_gc() {
            write!(f, "Ptr({:#x})", self.0)
        } else {
            write!(f, "Raw({:#x})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_round_trip() {
        for n in [0i64, 1, -1, 42, -42, 1 << 40, -(1 << 40)] {
            let v = Obj::from_integer(n);
            assert!(v.is_integer());
            assert!(!v.needs_gc());
            assert_eq!(v.as_integer(), n);
        }
    }

    #[test]
    fn test_integer_round_trip_extremes() {
        for n in [MAX_SMALL_INT, MIN_SMALL_INT, MAX_SMALL_INT - 1, MIN_SMALL_INT + 1] {
            assert_eq!(Obj::from_integer(n).as_integer(), n);
        }
    }

    #[test]
    fn test_integer_wraps_at_61_bits() {
        assert_eq!(Obj::from_integer(MAX_SMALL_INT + 1).as_integer(), MIN_SMALL_INT);
        assert_eq!(Obj::from_integer(MIN_SMALL_INT - 1).as_integer(), MAX_SMALL_INT);
    }

    #[test]
    fn test_null() {
        assert!(Obj::NULL.is_null());
        assert!(!Obj::NULL.is_integer());
        assert!(!Obj::NULL.needs_gc());
        assert!(!Obj::NULL.is_truthy());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Obj::from_integer(0).is_truthy());
        assert!(Obj::from_integer(1).is_truthy());
        assert!(Obj::from_integer(-1).is_truthy());
        // Any aligned non-null pointer is true.
        let word = 0x1000usize;
        assert!(Obj::from_raw(word).is_truthy());
    }

    #[test]
    fn test_needs_gc() {
        assert!(Obj::from_raw(0x1000).needs_gc());
        assert!(!Obj::from_raw(0x1001).needs_gc());
        assert!(!Obj::from_integer(512).needs_gc());
    }
}
