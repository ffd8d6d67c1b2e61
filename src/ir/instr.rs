//! The flat instruction form produced by control-flow graph lowering.
//!
//! Lowering flattens the structured operation tree into three-address style
//! instructions grouped into basic blocks: every instruction assigns the
//! value of one [`Rvalue`] to one [`Place`], and every block ends in exactly
//! one [`Terminator`]. Subexpression results are materialized into
//! temporaries in strict left-to-right order, so evaluation order is explicit
//! in the instruction sequence and the transfer functions never need to look
//! inside nested expressions.
//!
//! Each instruction keeps the [`OpId`] of the structured operation it was
//! lowered from; that id is what findings report.

use std::fmt;

use crate::ir::{
    ops::{BinOp, Callee, UnOp},
    types::{FieldId, FunctionId, Literal, OpId, TypeId, VarId},
};
use crate::utils::graph::NodeId;

/// A flat instruction: `dst = rvalue`.
#[derive(Debug, Clone)]
pub struct Instr {
    /// The structured operation this instruction was lowered from.
    pub op: OpId,
    /// Where the computed value is stored.
    pub dst: Place,
    /// The computation.
    pub rvalue: Rvalue,
}

/// An assignable location.
#[derive(Debug, Clone)]
pub enum Place {
    /// A variable slot.
    Var(VarId),
    /// A field of the object held by `base`.
    Field {
        /// Variable holding the object reference.
        base: VarId,
        /// The field written.
        field: FieldId,
    },
    /// An element of the array held by `base`.
    Elem {
        /// Variable holding the array reference.
        base: VarId,
        /// The element index; a non-literal index is an unknown index.
        index: Operand,
    },
}

/// An instruction operand: a variable read or an inline constant.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Reads a variable slot.
    Var(VarId),
    /// An inline constant.
    Literal(Literal),
}

impl Operand {
    /// Returns the variable this operand reads, if it is a variable read.
    #[must_use]
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            Operand::Var(v) => Some(*v),
            Operand::Literal(_) => None,
        }
    }

    /// Returns `true` if this operand is a constant index usable for precise
    /// element tracking.
    #[must_use]
    pub fn is_const_index(&self) -> bool {
        matches!(self, Operand::Literal(Literal::Int(_)))
    }
}

/// The right-hand side of an instruction.
#[derive(Debug, Clone)]
pub enum Rvalue {
    /// Copies an operand.
    Use(Operand),
    /// Loads a field from the object held by `base`.
    FieldLoad {
        /// Variable holding the object reference.
        base: VarId,
        /// The field read.
        field: FieldId,
    },
    /// Loads an element from the array held by `base`.
    ElemLoad {
        /// Variable holding the array reference.
        base: VarId,
        /// The element index.
        index: Operand,
    },
    /// Allocates a new object. The allocation site is the instruction's
    /// [`OpId`].
    New {
        /// The constructed type.
        ty: TypeId,
        /// Constructor arguments, already evaluated.
        args: Vec<Operand>,
    },
    /// Calls a function or external symbol.
    Call {
        /// The call target.
        callee: Callee,
        /// Arguments with their passing modes.
        args: Vec<CallArg>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnOp,
        /// The operand.
        operand: Operand,
    },
    /// Creates a closure over `function`, capturing the listed variables.
    Closure {
        /// The wrapped function.
        function: FunctionId,
        /// Captured variables; each one escapes.
        captures: Vec<VarId>,
    },
    /// The exception value bound at a catch entry. Opaque to the analyses.
    CaughtException,
}

/// A lowered call argument.
#[derive(Debug, Clone)]
pub enum CallArg {
    /// Passed by value.
    Value(Operand),
    /// Passed by reference; the callee may replace the variable's value.
    ByRef(VarId),
    /// Output argument; the callee assigns it.
    Out(VarId),
}

impl CallArg {
    /// Returns the variable this argument reads or writes, if any.
    #[must_use]
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            CallArg::Value(op) => op.as_var(),
            CallArg::ByRef(v) | CallArg::Out(v) => Some(*v),
        }
    }

    /// Returns `true` for by-ref and out arguments.
    #[must_use]
    pub fn is_writeback(&self) -> bool {
        matches!(self, CallArg::ByRef(_) | CallArg::Out(_))
    }
}

/// The terminator of a basic block.
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Unconditional jump.
    Jump(NodeId),
    /// Two-way conditional branch.
    Branch {
        /// The branch condition.
        condition: Operand,
        /// Target when the condition is true.
        true_target: NodeId,
        /// Target when the condition is false.
        false_target: NodeId,
    },
    /// Returns from the function.
    Return(Option<Operand>),
    /// Throws an exception; control transfers to the innermost handler, or
    /// out of the function if there is none.
    Throw(Operand),
    /// Ends a finally body; control continues along the recorded
    /// continuation edges.
    EndFinally,
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var(v) => write!(f, "{v}"),
            Place::Field { base, field } => write!(f, "{base}.{field}"),
            Place::Elem { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{v}"),
            Operand::Literal(lit) => write!(f, "{lit}"),
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Function(id) => write!(f, "{id}"),
            Callee::External(sym) => write!(f, "{sym}"),
        }
    }
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Value(op) => write!(f, "{op}"),
            CallArg::ByRef(v) => write!(f, "ref {v}"),
            CallArg::Out(v) => write!(f, "out {v}"),
        }
    }
}

impl fmt::Display for Rvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rvalue::Use(op) => write!(f, "{op}"),
            Rvalue::FieldLoad { base, field } => write!(f, "{base}.{field}"),
            Rvalue::ElemLoad { base, index } => write!(f, "{base}[{index}]"),
            Rvalue::New { ty, args } => {
                write!(f, "new {ty}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Rvalue::Call { callee, args } => {
                write!(f, "call {callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Rvalue::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Rvalue::Unary { op, operand } => write!(f, "{op}{operand}"),
            Rvalue::Closure { function, captures } => {
                write!(f, "closure {function} [")?;
                for (i, cap) in captures.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{cap}")?;
                }
                write!(f, "]")
            }
            Rvalue::CaughtException => write!(f, "caught-exception"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dst, self.rvalue)
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "jump {target}"),
            Terminator::Branch {
                condition,
                true_target,
                false_target,
            } => write!(f, "branch {condition} ? {true_target} : {false_target}"),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Return(Some(op)) => write!(f, "return {op}"),
            Terminator::Throw(op) => write!(f, "throw {op}"),
            Terminator::EndFinally => write!(f, "end-finally"),
        }
    }
}
