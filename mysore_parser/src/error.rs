//! Syntax errors with source positions.

use mysore_core::Span;
use std::fmt;

/// A syntax error at a span of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// What the parser expected or rejected.
    pub message: String,
    /// Where in the source.
    pub span: Span,
}

impl SyntaxError {
    /// Create a new syntax error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Resolve the error's start offset to a 1-based line and column in
    /// `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = (self.span.start as usize).min(source.len());
        let mut line = 1;
        let mut line_start = 0;
        for (i, byte) in source.bytes().enumerate().take(offset) {
            if byte == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        (line, offset - line_start + 1)
    }

    /// Render in the driver's diagnostic format.
    pub fn render(&self, source: &str) -> String {
        let (line, col) = self.line_col(source);
        format!("line {}, col {}: syntax error", line, col)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error: {}", self.message)
    }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_resolution() {
        let source = "var x = 1;\nvar y = ;\n";
        let err = SyntaxError::new("unexpected ';'", Span::new(19, 20));
        assert_eq!(err.line_col(source), (2, 9));
        assert_eq!(err.render(source), "line 2, col 9: syntax error");
    }

    #[test]
    fn test_line_col_first_line() {
        let err = SyntaxError::new("x", Span::new(4, 5));
        assert_eq!(err.line_col("abcdef"), (1, 5));
    }
}
