//! Bytecode representation for compiled closures and methods.

use mysore_core::{Obj, Selector};
use mysore_gc::Value;
use mysore_parser::ast::BinOpKind;
use mysore_parser::ClosureDecl;
use mysore_runtime::Class;
use std::rc::Rc;

/// A virtual register index.
pub type Reg = u16;

/// One instruction of the register machine.
///
/// Argument windows for calls are contiguous: the compiler materializes
/// arguments in consecutive registers starting at `first_arg`.
#[derive(Debug, Clone, Copy)]
pub enum Insn {
    /// `dst = constants[index]`
    LoadConst {
        /// Destination register.
        dst: Reg,
        /// Constant-pool index.
        index: u16,
    },
    /// `dst = null`
    LoadNull {
        /// Destination register.
        dst: Reg,
    },
    /// `dst = src`
    Move {
        /// Destination register.
        dst: Reg,
        /// Source register.
        src: Reg,
    },
    /// `dst = *globals[index]`
    LoadGlobal {
        /// Destination register.
        dst: Reg,
        /// Global-cell table index.
        index: u16,
    },
    /// `*globals[index] = src`, with root maintenance.
    StoreGlobal {
        /// Global-cell table index.
        index: u16,
        /// Source register.
        src: Reg,
    },
    /// `dst = closure.bound_vars[index]`
    LoadBound {
        /// Destination register.
        dst: Reg,
        /// Bound-variable slot.
        index: u16,
    },
    /// `closure.bound_vars[index] = src`
    StoreBound {
        /// Bound-variable slot.
        index: u16,
        /// Source register.
        src: Reg,
    },
    /// `dst = self` (method code only).
    LoadSelf {
        /// Destination register.
        dst: Reg,
    },
    /// `dst = cmd` boxed as a small integer (method code only).
    LoadCmd {
        /// Destination register.
        dst: Reg,
    },
    /// `dst = self.ivars[slot]` (method code only).
    LoadIvar {
        /// Destination register.
        dst: Reg,
        /// Instance-variable slot.
        slot: u16,
    },
    /// `self.ivars[slot] = src` (method code only).
    StoreIvar {
        /// Instance-variable slot.
        slot: u16,
        /// Source register.
        src: Reg,
    },
    /// Full binary-operation semantics: integer fast path, untagged
    /// comparison, method fallback for arithmetic on objects.
    BinOp {
        /// The operator.
        op: BinOpKind,
        /// Destination register.
        dst: Reg,
        /// Left operand.
        lhs: Reg,
        /// Right operand.
        rhs: Reg,
    },
    /// Unconditional jump to an instruction index.
    Jump {
        /// Target instruction index.
        target: u32,
    },
    /// Jump when the register is false under the truthiness rule.
    JumpIfFalse {
        /// Condition register.
        cond: Reg,
        /// Target instruction index.
        target: u32,
    },
    /// Call the closure in `callee` with `argc` arguments starting at
    /// `first_arg`.
    CallClosure {
        /// Destination register for the result.
        dst: Reg,
        /// Register holding the closure.
        callee: Reg,
        /// First argument register.
        first_arg: Reg,
        /// Argument count.
        argc: u8,
    },
    /// Send `selector` to the receiver with `argc` arguments starting
    /// at `first_arg`.
    CallMethod {
        /// Destination register for the result.
        dst: Reg,
        /// Register holding the receiver.
        receiver: Reg,
        /// The selector to send.
        selector: Selector,
        /// First argument register.
        first_arg: Reg,
        /// Argument count.
        argc: u8,
    },
    /// Instantiate a class resolved at compile time.
    New {
        /// Destination register.
        dst: Reg,
        /// The class to instantiate.
        class: &'static Class,
    },
    /// Construct a closure object from `templates[index]`, store it in
    /// `dst`, then copy its captures out of the current frame.
    MakeClosure {
        /// Destination register (also the declaration's local binding).
        dst: Reg,
        /// Closure-template index.
        index: u16,
    },
    /// Return the value in `src`.
    Return {
        /// Source register.
        src: Reg,
    },
    /// Return null (appended to every body as the fall-off exit).
    ReturnNull,
}

/// Where a nested closure's capture is copied from at `MakeClosure`
/// time.
#[derive(Debug, Clone, Copy)]
pub enum CaptureSource {
    /// A register of the constructing frame.
    Local(Reg),
    /// A bound-variable slot of the constructing closure.
    Bound(u16),
    /// An instance-variable slot of `self` (method code only).
    Ivar(u16),
    /// The receiver itself (method code only).
    Selfv,
    /// The selector, boxed (method code only).
    Cmd,
    /// A global cell.
    Global(u16),
}

/// Recipe for constructing a closure object from compiled code.
#[derive(Debug)]
pub struct ClosureTemplate {
    /// The declaration the closure is created from.
    pub decl: Rc<ClosureDecl>,
    /// One source per bound-variable slot, in slot order.
    pub captures: Box<[CaptureSource]>,
}

/// A compiled body: instructions plus every table they index.
///
/// Code objects are immutable once built and live in the code cache for
/// the rest of the process.
pub struct CodeObject {
    /// The declaration's name, for diagnostics.
    pub name: String,
    /// The instruction stream.
    pub instructions: Box<[Insn]>,
    /// Constant pool. Cells root any heap constants (string literals
    /// are allocated once, at compile time).
    pub constants: Vec<Value>,
    /// Global cells referenced by index. Addresses are stable for the
    /// life of the global table.
    pub globals: Vec<*mut Value>,
    /// Templates for closures constructed inside this body.
    pub templates: Vec<ClosureTemplate>,
    /// Number of registers the frame needs.
    pub register_count: u16,
    /// Declared parameter count.
    pub arity: usize,
}

impl CodeObject {
    /// Read a constant.
    #[inline]
    pub fn constant(&self, index: u16) -> Obj {
        self.constants[index as usize].get()
    }
}

impl std::fmt::Debug for CodeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeObject")
            .field("name", &self.name)
            .field("instructions", &self.instructions.len())
            .field("registers", &self.register_count)
            .field("arity", &self.arity)
            .finish()
    }
}
