//! Runtime error taxonomy.
//!
//! Every error here is fatal to the current top-level evaluation: the
//! evaluator propagates it outward, the REPL reports it and reprompts,
//! and the file driver exits non-zero. Nothing is caught inside the
//! language.

use std::fmt;

/// Maximum number of arguments a call may pass, and parameters a
/// declaration may take. One native trampoline exists per arity, so the
/// cap is fixed.
pub const MAX_ARITY: usize = 10;

/// An error raised during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A variable reference did not resolve in any scope.
    UnboundName(String),
    /// A call passed more than [`MAX_ARITY`] arguments, or a declaration
    /// took more than [`MAX_ARITY`] parameters. Raised before dispatch.
    ArityExceeded {
        /// The offending argument or parameter count.
        count: usize,
    },
    /// Method lookup failed on the receiver's class chain. Raised at
    /// dispatch time.
    SelectorNotFound {
        /// Name of the receiver's class.
        class: String,
        /// The method name that failed to resolve.
        selector: String,
    },
    /// A non-closure value was called as a closure.
    NotAClosure,
    /// A closure or method was called with the wrong number of
    /// arguments. Raised before dispatch so every indirect call matches
    /// its fixed-arity native signature.
    ArityMismatch {
        /// Parameters the callee declares.
        expected: usize,
        /// Arguments the call supplied.
        found: usize,
    },
    /// `new` named a class that is not registered.
    UnknownClass(String),
    /// Integer division by zero.
    DivisionByZero,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnboundName(name) => {
                write!(f, "unbound variable '{}'", name)
            }
            RuntimeError::ArityExceeded { count } => {
                write!(f, "{} arguments exceeds the maximum of {}", count, MAX_ARITY)
            }
            RuntimeError::SelectorNotFound { class, selector } => {
                write!(f, "class '{}' does not respond to '{}'", class, selector)
            }
            RuntimeError::NotAClosure => {
                write!(f, "called value is not a closure")
            }
            RuntimeError::ArityMismatch { expected, found } => {
                write!(f, "call takes {} arguments but {} were given", expected, found)
            }
            RuntimeError::UnknownClass(name) => {
                write!(f, "unknown class '{}'", name)
            }
            RuntimeError::DivisionByZero => {
                write!(f, "division by zero")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::UnboundName("x".to_string());
        assert_eq!(err.to_string(), "unbound variable 'x'");

        let err = RuntimeError::SelectorNotFound {
            class: "String".to_string(),
            selector: "reverse".to_string(),
        };
        assert_eq!(err.to_string(), "class 'String' does not respond to 'reverse'");
    }
}
