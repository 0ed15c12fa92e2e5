//! Error carriage across native-convention boundaries.
//!
//! Trampolines and compiled entries have fixed native signatures
//! returning a bare `Obj`, so a failure inside them cannot propagate as
//! a `Result`. Instead the failing frame records the error here and
//! returns null; the evaluator drains the slot after every dispatch that
//! can cross such a boundary and resumes normal `?` propagation.

use mysore_core::RuntimeError;
use std::cell::RefCell;

thread_local! {
    static PENDING: RefCell<Option<RuntimeError>> = const { RefCell::new(None) };
}

/// Record an error. The first error wins; later ones raised while
/// unwinding through outer native frames are dropped.
pub fn raise(error: RuntimeError) {
    PENDING.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    });
}

/// Take the pending error, leaving the slot empty.
pub fn take_pending() -> Option<RuntimeError> {
    PENDING.with(|slot| slot.borrow_mut().take())
}

/// Whether an error is pending.
pub fn has_pending() -> bool {
    PENDING.with(|slot| slot.borrow().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        assert!(take_pending().is_none());
        raise(RuntimeError::DivisionByZero);
        raise(RuntimeError::NotAClosure);
        assert_eq!(take_pending(), Some(RuntimeError::DivisionByZero));
        assert!(!has_pending());
    }
}
