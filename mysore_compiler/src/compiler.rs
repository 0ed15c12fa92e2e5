//! AST-to-bytecode lowering.
//!
//! One pass over the body. Parameters and declared locals get fixed
//! registers; subexpressions use a stack-disciplined temporary area
//! above them, so call arguments land in consecutive registers for
//! free. Anything the generator cannot express makes the whole
//! declaration bail out to the interpreter permanently: the tiered
//! protocol attempts compilation exactly once.

use crate::bytecode::{CaptureSource, ClosureTemplate, CodeObject, Insn, Reg};
use crate::code_cache;
use crate::entry;
use mysore_core::{ClosureInvoke, CompiledMethod, MAX_ARITY};
use mysore_gc::Value;
use mysore_parser::ast::{ExprKind, StmtKind};
use mysore_parser::{ClosureDecl, Expr, Statements, Stmt};
use mysore_runtime::{lookup_class, lookup_selector, string_new, Class, Globals};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Compile a declaration as a closure body.
///
/// Returns the fixed-arity closure entry point, or `None` when the body
/// cannot be lowered: the caller then stays on the interpreted path.
pub fn compile_closure(decl: &ClosureDecl, globals: &mut Globals) -> Option<ClosureInvoke> {
    let arity = decl.arity();
    if arity > MAX_ARITY {
        return None;
    }
    if code_cache::lookup(decl).is_none() {
        let code = FnCompiler::new(decl, BodyKind::Closure, globals).lower()?;
        code_cache::insert(decl, Rc::new(code));
    }
    Some(entry::closure_entry(arity))
}

/// Compile a declaration as a method body of `class`.
///
/// The class supplies the instance-variable slot layout; it is the
/// receiver's class at the triggering call, exactly what the dispatch
/// that crossed the threshold saw.
pub fn compile_method(
    decl: &ClosureDecl,
    class: &'static Class,
    globals: &mut Globals,
) -> Option<CompiledMethod> {
    let arity = decl.arity();
    if arity > MAX_ARITY {
        return None;
    }
    if code_cache::lookup(decl).is_none() {
        let code = FnCompiler::new(decl, BodyKind::Method { class }, globals).lower()?;
        code_cache::insert(decl, Rc::new(code));
    }
    Some(entry::method_entry(arity))
}

// =============================================================================
// Name resolution
// =============================================================================

/// What kind of body is being lowered; decides how non-local names
/// resolve.
enum BodyKind {
    /// Free names come from bound-variable slots, then globals.
    Closure,
    /// Free names come from `self`, `cmd`, and the instance variables of
    /// the receiver's class, then globals.
    Method {
        /// The receiver's class at the triggering call.
        class: &'static Class,
    },
}

/// Where a name lives, from the compiled frame's point of view.
#[derive(Clone, Copy)]
enum Place {
    Local(Reg),
    Bound(u16),
    Ivar(u16),
    Selfv,
    Cmd,
    Global(u16),
}

/// Lowering failed; the declaration stays interpreted.
struct Bail;

type Lower<T> = Result<T, Bail>;

// =============================================================================
// Function compiler
// =============================================================================

struct FnCompiler<'a> {
    decl: &'a ClosureDecl,
    kind: BodyKind,
    globals: &'a mut Globals,

    /// Name → fixed register for parameters and declared locals.
    locals: FxHashMap<String, Reg>,
    /// First free temporary register.
    next_reg: Reg,
    /// Highest register ever used.
    high_water: Reg,

    code: Vec<Insn>,
    constants: Vec<Value>,
    templates: Vec<ClosureTemplate>,
    global_cells: Vec<*mut Value>,
    global_index: FxHashMap<String, u16>,
}

impl<'a> FnCompiler<'a> {
    fn new(decl: &'a ClosureDecl, kind: BodyKind, globals: &'a mut Globals) -> Self {
        let mut locals = FxHashMap::default();
        let mut next_reg: Reg = 0;
        for param in &decl.parameters {
            locals.insert(param.clone(), next_reg);
            next_reg += 1;
        }
        // Every declared name in the body gets a fixed register. A
        // declaration shadowing a parameter reuses the parameter's
        // register, matching the interpreter's single frame map.
        let mut declared: Vec<&String> = decl.check().decls.iter().collect();
        declared.sort();
        for name in declared {
            if !locals.contains_key(name.as_str()) {
                locals.insert(name.clone(), next_reg);
                next_reg += 1;
            }
        }
        Self {
            decl,
            kind,
            globals,
            locals,
            next_reg,
            high_water: next_reg,
            code: Vec::new(),
            constants: Vec::new(),
            templates: Vec::new(),
            global_cells: Vec::new(),
            global_index: FxHashMap::default(),
        }
    }

    fn lower(mut self) -> Option<CodeObject> {
        let decl = self.decl;
        match self.compile_block(&decl.body) {
            Ok(()) => {}
            Err(Bail) => return None,
        }
        self.code.push(Insn::ReturnNull);
        Some(CodeObject {
            name: self.decl.name.clone(),
            instructions: self.code.into_boxed_slice(),
            constants: self.constants,
            globals: self.global_cells,
            templates: self.templates,
            register_count: self.high_water,
            arity: self.decl.arity(),
        })
    }

    // =========================================================================
    // Registers and tables
    // =========================================================================

    fn alloc_temp(&mut self) -> Reg {
        let reg = self.next_reg;
        self.next_reg += 1;
        if self.next_reg > self.high_water {
            self.high_water = self.next_reg;
        }
        reg
    }

    fn emit(&mut self, insn: Insn) {
        self.code.push(insn);
    }

    fn add_constant(&mut self, value: mysore_core::Obj) -> u16 {
        let index = self.constants.len() as u16;
        self.constants.push(Value::with(value));
        index
    }

    fn global_cell(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.global_index.get(name) {
            return index;
        }
        let index = self.global_cells.len() as u16;
        self.global_cells.push(self.globals.cell_ptr(name));
        self.global_index.insert(name.to_string(), index);
        index
    }

    fn resolve(&mut self, name: &str) -> Lower<Place> {
        if let Some(&reg) = self.locals.get(name) {
            return Ok(Place::Local(reg));
        }
        match &self.kind {
            // In a closure body every free name is a bound variable:
            // its value was copied into the closure object at creation,
            // and reads and writes go to that slot, never to a global.
            BodyKind::Closure => {
                if let Some(slot) = self
                    .decl
                    .bound_vars()
                    .iter()
                    .position(|bound| bound == name)
                {
                    return Ok(Place::Bound(slot as u16));
                }
                Err(Bail)
            }
            // Method bodies have no bound variables; free names resolve
            // through the receiver, then the global table.
            BodyKind::Method { class } => {
                if name == "self" {
                    return Ok(Place::Selfv);
                }
                if name == "cmd" {
                    return Ok(Place::Cmd);
                }
                if let Some(slot) = class.ivar_names.iter().position(|ivar| *ivar == name) {
                    return Ok(Place::Ivar(slot as u16));
                }
                // Only globals that already exist are resolvable:
                // binding the cell of a name that might never be
                // defined would change what the interpreter reports.
                if self.globals.contains(name) {
                    return Ok(Place::Global(self.global_cell(name)));
                }
                Err(Bail)
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn compile_block(&mut self, block: &Statements) -> Lower<()> {
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Lower<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let save = self.next_reg;
                let dst = self.alloc_temp();
                self.compile_expr(expr, dst)?;
                self.next_reg = save;
                Ok(())
            }
            StmtKind::Decl { name, init } => {
                let reg = *self.locals.get(name).ok_or(Bail)?;
                match init {
                    Some(init) => self.compile_expr(init, reg)?,
                    None => self.emit(Insn::LoadNull { dst: reg }),
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => match self.resolve(target)? {
                Place::Local(reg) => self.compile_expr(value, reg),
                place => {
                    let save = self.next_reg;
                    let src = self.alloc_temp();
                    self.compile_expr(value, src)?;
                    match place {
                        Place::Bound(index) => self.emit(Insn::StoreBound { index, src }),
                        Place::Ivar(slot) => self.emit(Insn::StoreIvar { slot, src }),
                        Place::Global(index) => self.emit(Insn::StoreGlobal { index, src }),
                        // `self` and `cmd` are read-only here.
                        Place::Selfv | Place::Cmd => return Err(Bail),
                        Place::Local(_) => unreachable!(),
                    }
                    self.next_reg = save;
                    Ok(())
                }
            },
            StmtKind::If { condition, body } => {
                let save = self.next_reg;
                let cond = self.alloc_temp();
                self.compile_expr(condition, cond)?;
                self.next_reg = save;
                let branch = self.code.len();
                self.emit(Insn::JumpIfFalse { cond, target: 0 });
                self.compile_block(body)?;
                self.patch_jump(branch);
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let head = self.code.len() as u32;
                let save = self.next_reg;
                let cond = self.alloc_temp();
                self.compile_expr(condition, cond)?;
                self.next_reg = save;
                let exit = self.code.len();
                self.emit(Insn::JumpIfFalse { cond, target: 0 });
                self.compile_block(body)?;
                self.emit(Insn::Jump { target: head });
                self.patch_jump(exit);
                Ok(())
            }
            StmtKind::Return(expr) => {
                let save = self.next_reg;
                let src = self.alloc_temp();
                self.compile_expr(expr, src)?;
                self.emit(Insn::Return { src });
                self.next_reg = save;
                Ok(())
            }
            // Class declarations never appear inside closure bodies.
            StmtKind::Class(_) => Err(Bail),
        }
    }

    /// Point a forward branch at the current end of the stream.
    fn patch_jump(&mut self, at: usize) {
        let target = self.code.len() as u32;
        match &mut self.code[at] {
            Insn::Jump { target: slot } | Insn::JumpIfFalse { target: slot, .. } => {
                *slot = target;
            }
            _ => unreachable!("patching a non-jump"),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile_expr(&mut self, expr: &Expr, dst: Reg) -> Lower<()> {
        match &expr.kind {
            ExprKind::Number(value) => {
                let index = self.add_constant(mysore_core::Obj::from_integer(*value));
                self.emit(Insn::LoadConst { dst, index });
                Ok(())
            }
            ExprKind::StringLit(text) => {
                // Allocated once at compile time and rooted in the
                // constant pool; every execution returns the same object,
                // like the interpreter's constant-expression cache.
                let index = self.add_constant(string_new(text));
                self.emit(Insn::LoadConst { dst, index });
                Ok(())
            }
            ExprKind::Var(name) => {
                match self.resolve(name)? {
                    Place::Local(src) => {
                        if src != dst {
                            self.emit(Insn::Move { dst, src });
                        }
                    }
                    Place::Bound(index) => self.emit(Insn::LoadBound { dst, index }),
                    Place::Ivar(slot) => self.emit(Insn::LoadIvar { dst, slot }),
                    Place::Selfv => self.emit(Insn::LoadSelf { dst }),
                    Place::Cmd => self.emit(Insn::LoadCmd { dst }),
                    Place::Global(index) => self.emit(Insn::LoadGlobal { dst, index }),
                }
                Ok(())
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                let save = self.next_reg;
                let l = self.alloc_temp();
                let r = self.alloc_temp();
                self.compile_expr(lhs, l)?;
                self.compile_expr(rhs, r)?;
                self.emit(Insn::BinOp {
                    op: *op,
                    dst,
                    lhs: l,
                    rhs: r,
                });
                self.next_reg = save;
                Ok(())
            }
            ExprKind::Call {
                callee,
                method,
                arguments,
            } => {
                if arguments.len() > MAX_ARITY {
                    return Err(Bail);
                }
                let save = self.next_reg;
                let target = self.alloc_temp();
                self.compile_expr(callee, target)?;
                let first_arg = self.next_reg;
                for argument in arguments {
                    let reg = self.alloc_temp();
                    self.compile_expr(argument, reg)?;
                }
                let argc = arguments.len() as u8;
                match method {
                    Some(name) => {
                        let selector = lookup_selector(name);
                        self.emit(Insn::CallMethod {
                            dst,
                            receiver: target,
                            selector,
                            first_arg,
                            argc,
                        });
                    }
                    None => {
                        self.emit(Insn::CallClosure {
                            dst,
                            callee: target,
                            first_arg,
                            argc,
                        });
                    }
                }
                self.next_reg = save;
                Ok(())
            }
            ExprKind::New(class_name) => {
                // The class must exist by now; a class that appears
                // later keeps this declaration interpreted.
                let class = lookup_class(class_name).ok_or(Bail)?;
                self.emit(Insn::New { dst, class });
                Ok(())
            }
            ExprKind::Closure(inner) => self.compile_nested_closure(inner, dst),
        }
    }

    fn compile_nested_closure(&mut self, inner: &Rc<ClosureDecl>, dst: Reg) -> Lower<()> {
        if inner.arity() > MAX_ARITY {
            return Err(Bail);
        }
        // The declaration's name is a local of this body; the closure
        // object is written there first so its own captures can see it.
        let name_reg = *self.locals.get(&inner.name).ok_or(Bail)?;
        let mut captures = Vec::with_capacity(inner.bound_vars().len());
        for bound in inner.bound_vars() {
            let source = match self.resolve(bound)? {
                Place::Local(reg) => CaptureSource::Local(reg),
                Place::Bound(index) => CaptureSource::Bound(index),
                Place::Ivar(slot) => CaptureSource::Ivar(slot),
                Place::Selfv => CaptureSource::Selfv,
                Place::Cmd => CaptureSource::Cmd,
                Place::Global(index) => CaptureSource::Global(index),
            };
            captures.push(source);
        }
        let index = self.templates.len() as u16;
        self.templates.push(ClosureTemplate {
            decl: Rc::clone(inner),
            captures: captures.into_boxed_slice(),
        });
        self.emit(Insn::MakeClosure {
            dst: name_reg,
            index,
        });
        if dst != name_reg {
            self.emit(Insn::Move { dst, src: name_reg });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysore_parser::parse;

    fn first_closure(source: &str) -> Rc<ClosureDecl> {
        let block = parse(source).expect("parse failure");
        for stmt in &block.statements {
            if let StmtKind::Expr(expr) = &stmt.kind {
                if let ExprKind::Closure(decl) = &expr.kind {
                    return Rc::clone(decl);
                }
            }
        }
        panic!("no closure in source");
    }

    #[test]
    fn test_compiles_arithmetic_body() {
        let decl = first_closure("fun f(a, b) { return a + b * 2; }");
        let mut globals = Globals::new();
        assert!(compile_closure(&decl, &mut globals).is_some());
        let code = code_cache::lookup(Rc::as_ptr(&decl)).unwrap();
        assert_eq!(code.arity, 2);
        // Ends with the fall-off return.
        assert!(matches!(code.instructions.last(), Some(Insn::ReturnNull)));
    }

    #[test]
    fn test_free_names_become_bound_slots() {
        // `outer` is a bound variable, not a global: the generator
        // resolves it to a closure slot without consulting the table.
        let decl = first_closure("fun f() { return outer; }");
        let mut globals = Globals::new();
        assert!(compile_closure(&decl, &mut globals).is_some());
        assert_eq!(decl.bound_vars(), ["outer".to_string()]);
    }

    #[test]
    fn test_class_declaration_in_body_bails() {
        let decl = first_closure("fun f() { class Temp { } return 1; }");
        let mut globals = Globals::new();
        assert!(compile_closure(&decl, &mut globals).is_none());
    }

    #[test]
    fn test_unknown_class_bails() {
        let decl = first_closure("fun f() { return new NeverDeclared; }");
        let mut globals = Globals::new();
        assert!(compile_closure(&decl, &mut globals).is_none());
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let decl = first_closure("fun f(x) { return x; }");
        let mut globals = Globals::new();
        let first = compile_closure(&decl, &mut globals).unwrap();
        let code_before = code_cache::lookup(Rc::as_ptr(&decl)).unwrap();
        let second = compile_closure(&decl, &mut globals).unwrap();
        assert_eq!(first, second);
        let code_after = code_cache::lookup(Rc::as_ptr(&decl)).unwrap();
        assert!(Rc::ptr_eq(&code_before, &code_after));
    }
}
