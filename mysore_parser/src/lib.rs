//! Lexer, recursive-descent parser, and AST model for MysoreScript.
//!
//! The AST defined here is more than a parse tree: closure declarations
//! carry the mutable per-declaration state the execution tiers need
//! (capture analysis results, execution counter, cached compiled entry),
//! and every expression node carries a constant-expression cache cell.
//! The evaluator and the code generator both consume these nodes.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{ClosureDecl, Expr, ExprKind, Statements, Stmt, StmtKind};
pub use error::SyntaxError;
pub use parser::{parse, Parser};
