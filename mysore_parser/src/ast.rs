//! AST node model.
//!
//! Nodes are built once by the parser and then shared: the evaluator
//! walks them, closures and methods keep references to their declaring
//! [`ClosureDecl`], and the code generator lowers them. Two pieces of
//! mutable state live on the nodes themselves:
//!
//! - every expression carries a constant-expression cache cell, filled on
//!   the first successful evaluation of a constant expression;
//! - every closure declaration carries its capture-analysis results
//!   (memoized), an execution counter, and the cached compiled entry
//!   point once the declaration has been compiled.

use mysore_core::{ClosureInvoke, Obj, RuntimeError, Span};
use mysore_gc::Value;
use rustc_hash::FxHashSet;
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

// =============================================================================
// Statements
// =============================================================================

/// A block of statements.
#[derive(Debug, Default)]
pub struct Statements {
    /// The statements, in source order.
    pub statements: Vec<Stmt>,
}

impl Statements {
    /// Create a block.
    #[must_use]
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    /// Collect the names declared and read anywhere in this block.
    pub fn collect_var_uses(&self, decls: &mut FxHashSet<String>, uses: &mut FxHashSet<String>) {
        for stmt in &self.statements {
            stmt.collect_var_uses(decls, uses);
        }
    }
}

/// A statement node.
#[derive(Debug)]
pub struct Stmt {
    /// The statement kind.
    pub kind: StmtKind,
    /// Source span.
    pub span: Span,
}

impl Stmt {
    /// Create a new statement.
    #[must_use]
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    fn collect_var_uses(&self, decls: &mut FxHashSet<String>, uses: &mut FxHashSet<String>) {
        match &self.kind {
            StmtKind::Expr(expr) => expr.collect_var_uses(decls, uses),
            StmtKind::Decl { name, init } => {
                if let Some(init) = init {
                    init.collect_var_uses(decls, uses);
                }
                decls.insert(name.clone());
            }
            StmtKind::Assign { target, value } => {
                // The target counts as a read: assigning to an outer name
                // inside a closure captures it.
                uses.insert(target.clone());
                value.collect_var_uses(decls, uses);
            }
            StmtKind::If { condition, body } | StmtKind::While { condition, body } => {
                condition.collect_var_uses(decls, uses);
                body.collect_var_uses(decls, uses);
            }
            StmtKind::Return(expr) => expr.collect_var_uses(decls, uses),
            // Classes may not be declared inside closures, so their
            // bodies never contribute to capture analysis.
            StmtKind::Class(_) => {}
        }
    }
}

/// Statement kinds.
#[derive(Debug)]
pub enum StmtKind {
    /// Expression evaluated for its effect; the result is discarded.
    Expr(Rc<Expr>),
    /// `var name;` or `var name = init;`
    Decl {
        /// The declared name.
        name: String,
        /// Optional initializer.
        init: Option<Rc<Expr>>,
    },
    /// `target = value;`
    Assign {
        /// The assigned variable.
        target: String,
        /// The assigned expression.
        value: Rc<Expr>,
    },
    /// `if (condition) { body }`: MysoreScript has no else clause.
    If {
        /// The condition.
        condition: Rc<Expr>,
        /// The body, run when the condition is true.
        body: Statements,
    },
    /// `while (condition) { body }`
    While {
        /// The condition, re-evaluated before every iteration.
        condition: Rc<Expr>,
        /// The loop body.
        body: Statements,
    },
    /// `return expr;`
    Return(Rc<Expr>),
    /// A class declaration.
    Class(ClassDecl),
}

/// A class declaration: instance variables and methods, with optional
/// single inheritance.
#[derive(Debug)]
pub struct ClassDecl {
    /// The class name.
    pub name: String,
    /// The superclass name, if one was written.
    pub superclass: Option<String>,
    /// Instance-variable names, in declaration order.
    pub ivars: Vec<String>,
    /// Method declarations.
    pub methods: Vec<Rc<ClosureDecl>>,
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Debug)]
pub struct Expr {
    /// The expression kind.
    pub kind: ExprKind,
    /// Source span.
    pub span: Span,
    /// Cached result for constant expressions, held in a rooted cell so
    /// a cached heap object survives collection.
    cache: RefCell<Value>,
}

impl Expr {
    /// Create a new expression.
    #[must_use]
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            cache: RefCell::new(Value::new()),
        }
    }

    /// Whether this expression's value depends only on literals.
    ///
    /// Constant expressions are evaluated once and cached; the cached
    /// object is returned by identity thereafter.
    pub fn is_constant_expression(&self) -> bool {
        match &self.kind {
            ExprKind::Number(_) | ExprKind::StringLit(_) => true,
            ExprKind::BinOp { lhs, rhs, .. } => {
                lhs.is_constant_expression() && rhs.is_constant_expression()
            }
            _ => false,
        }
    }

    /// The cached value, or null if nothing has been cached.
    #[inline]
    pub fn cached(&self) -> Obj {
        self.cache.borrow().get()
    }

    /// Store a value in the constant-expression cache.
    pub fn store_cache(&self, value: Obj) {
        self.cache.borrow_mut().set(value);
    }

    /// Collect the names declared and read in this expression.
    pub fn collect_var_uses(&self, decls: &mut FxHashSet<String>, uses: &mut FxHashSet<String>) {
        match &self.kind {
            ExprKind::Number(_) | ExprKind::StringLit(_) | ExprKind::New(_) => {}
            ExprKind::Var(name) => {
                uses.insert(name.clone());
            }
            ExprKind::BinOp { lhs, rhs, .. } => {
                lhs.collect_var_uses(decls, uses);
                rhs.collect_var_uses(decls, uses);
            }
            ExprKind::Call {
                callee, arguments, ..
            } => {
                callee.collect_var_uses(decls, uses);
                for arg in arguments {
                    arg.collect_var_uses(decls, uses);
                }
            }
            ExprKind::Closure(decl) => {
                // A nested closure reads its own bound variables from the
                // enclosing scope and declares its own name there.
                for bound in decl.bound_vars() {
                    uses.insert(bound.clone());
                }
                decls.insert(decl.name.clone());
            }
        }
    }
}

/// Expression kinds.
#[derive(Debug)]
pub enum ExprKind {
    /// Integer literal.
    Number(i64),
    /// String literal.
    StringLit(String),
    /// Variable reference.
    Var(String),
    /// Binary operation.
    BinOp {
        /// The operator.
        op: BinOpKind,
        /// Left operand, evaluated first.
        lhs: Rc<Expr>,
        /// Right operand.
        rhs: Rc<Expr>,
    },
    /// Closure call `callee(args)` or method call `callee.method(args)`.
    Call {
        /// The callee (closure value or method receiver).
        callee: Rc<Expr>,
        /// The method name for a method call; `None` for a closure call.
        method: Option<String>,
        /// Argument expressions, evaluated left to right.
        arguments: Vec<Rc<Expr>>,
    },
    /// `new ClassName`
    New(String),
    /// A closure declaration expression.
    Closure(Rc<ClosureDecl>),
}

// =============================================================================
// Binary operators
// =============================================================================

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl BinOpKind {
    /// Comparisons always work on untagged words; arithmetic falls back
    /// to a method call when an operand is not a small integer.
    #[inline]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOpKind::Eq | BinOpKind::Ne | BinOpKind::Lt | BinOpKind::Gt | BinOpKind::Le | BinOpKind::Ge
        )
    }

    /// The method name an arithmetic operator expands to for non-integer
    /// operands.
    pub const fn method_name(self) -> Option<&'static str> {
        match self {
            BinOpKind::Mul => Some("mul"),
            BinOpKind::Div => Some("div"),
            BinOpKind::Add => Some("add"),
            BinOpKind::Sub => Some("sub"),
            _ => None,
        }
    }

    /// Apply the operator to untagged integer operands.
    ///
    /// Arithmetic wraps; re-tagging truncates the result to 61 bits.
    /// Comparisons yield 0 or 1.
    pub fn apply_integers(self, lhs: i64, rhs: i64) -> Result<i64, RuntimeError> {
        Ok(match self {
            BinOpKind::Mul => lhs.wrapping_mul(rhs),
            BinOpKind::Div => {
                if rhs == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                lhs.wrapping_div(rhs)
            }
            BinOpKind::Add => lhs.wrapping_add(rhs),
            BinOpKind::Sub => lhs.wrapping_sub(rhs),
            BinOpKind::Eq => (lhs == rhs) as i64,
            BinOpKind::Ne => (lhs != rhs) as i64,
            BinOpKind::Lt => (lhs < rhs) as i64,
            BinOpKind::Gt => (lhs > rhs) as i64,
            BinOpKind::Le => (lhs <= rhs) as i64,
            BinOpKind::Ge => (lhs >= rhs) as i64,
        })
    }
}

// =============================================================================
// Closure declarations
// =============================================================================

/// Capture-analysis results for one closure declaration.
#[derive(Debug)]
pub struct CaptureInfo {
    /// Names declared anywhere inside the body.
    pub decls: FxHashSet<String>,
    /// Free variables: used in the body, neither declared there nor a
    /// parameter. The order here is fixed once computed and assigns the
    /// bound-variable slot indices in every closure object created from
    /// this declaration.
    pub bound_vars: Vec<String>,
}

/// A closure declaration: a function, method, or true closure.
///
/// The declaration node owns the execution state shared by every closure
/// object created from it: the interpreted-entry counter and, once the
/// code generator has run, the compiled entry point.
#[derive(Debug)]
pub struct ClosureDecl {
    /// The closure's name; bound in the declaring scope.
    pub name: String,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// The body.
    pub body: Statements,
    /// Source span of the declaration.
    pub span: Span,

    /// Memoized capture analysis.
    capture: OnceCell<CaptureInfo>,
    /// Number of interpreted entries so far.
    execution_count: Cell<u32>,
    /// Compiled entry point, once the compile threshold has been reached.
    compiled: Cell<Option<ClosureInvoke>>,
}

impl ClosureDecl {
    /// Create a new declaration.
    #[must_use]
    pub fn new(name: String, parameters: Vec<String>, body: Statements, span: Span) -> Self {
        Self {
            name,
            parameters,
            body,
            span,
            capture: OnceCell::new(),
            execution_count: Cell::new(0),
            compiled: Cell::new(None),
        }
    }

    /// Number of parameters.
    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Run capture analysis, or return the memoized result.
    ///
    /// `bound_vars = uses − decls − parameters`, computed over the whole
    /// body including nested closures (which report their own bound set
    /// as uses and their name as a declaration).
    pub fn check(&self) -> &CaptureInfo {
        self.capture.get_or_init(|| {
            let mut decls = FxHashSet::default();
            let mut uses = FxHashSet::default();
            self.body.collect_var_uses(&mut decls, &mut uses);
            let mut bound_vars: Vec<String> = uses
                .into_iter()
                .filter(|name| !decls.contains(name) && !self.parameters.contains(name))
                .collect();
            // Hash-set iteration order is arbitrary; sorting pins the
            // slot assignment.
            bound_vars.sort();
            CaptureInfo { decls, bound_vars }
        })
    }

    /// The bound-variable list, in slot order.
    #[inline]
    pub fn bound_vars(&self) -> &[String] {
        &self.check().bound_vars
    }

    /// Record one interpreted entry; returns the new count.
    #[inline]
    pub fn bump_execution_count(&self) -> u32 {
        let count = self.execution_count.get() + 1;
        self.execution_count.set(count);
        count
    }

    /// Number of interpreted entries so far.
    #[inline]
    pub fn execution_count(&self) -> u32 {
        self.execution_count.get()
    }

    /// The compiled entry point, if compilation has happened.
    #[inline]
    pub fn compiled(&self) -> Option<ClosureInvoke> {
        self.compiled.get()
    }

    /// Install the compiled entry point. The swap is monotonic: a
    /// compiled entry is never retired.
    #[inline]
    pub fn set_compiled(&self, entry: ClosureInvoke) {
        self.compiled.set(Some(entry));
    }
}
