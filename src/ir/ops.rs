//! The structured operation tree of a function body.
//!
//! Function bodies are trees of statements and expressions, close in shape to
//! what a front end would produce from source: short-circuit operators,
//! `if`/`while`, `try`/`catch`/`finally`, `using`, closures. The control-flow
//! graph builder lowers this tree into flat per-block instructions; the tree
//! itself is never consumed by the dataflow analyses directly.
//!
//! Every node carries the [`OpId`] assigned by the function builder, which is
//! the identity findings refer back to.

use crate::ir::types::{FieldId, FunctionId, Literal, OpId, ParamMode, SymbolId, TypeId, VarId};

/// An expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Builder-assigned operation id.
    pub id: OpId,
    /// What the expression computes.
    pub kind: ExprKind,
}

/// The expression forms the IR supports.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A constant.
    Literal(Literal),
    /// Reads a parameter or local variable.
    Local(VarId),
    /// Loads a field from the object `base` evaluates to.
    FieldLoad {
        /// The object expression.
        base: Box<Expr>,
        /// The field being read.
        field: FieldId,
    },
    /// Loads an element from the array `base` evaluates to.
    ElemLoad {
        /// The array expression.
        base: Box<Expr>,
        /// The element index.
        index: Box<Expr>,
    },
    /// Allocates a new object. The node's [`OpId`] identifies the
    /// allocation site.
    New {
        /// The type being constructed.
        ty: TypeId,
        /// Constructor arguments, evaluated left to right.
        args: Vec<Expr>,
    },
    /// Calls a function or external symbol.
    Call {
        /// The call target.
        callee: Callee,
        /// Arguments with their passing modes, evaluated left to right.
        args: Vec<Arg>,
    },
    /// A binary operation on two evaluated operands.
    Binary {
        /// The operator.
        op: BinOp,
        /// Left operand, evaluated first.
        lhs: Box<Expr>,
        /// Right operand, evaluated second.
        rhs: Box<Expr>,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// Short-circuit conjunction: `rhs` is evaluated only when `lhs` is true.
    And {
        /// First operand.
        lhs: Box<Expr>,
        /// Conditionally evaluated second operand.
        rhs: Box<Expr>,
    },
    /// Short-circuit disjunction: `rhs` is evaluated only when `lhs` is false.
    Or {
        /// First operand.
        lhs: Box<Expr>,
        /// Conditionally evaluated second operand.
        rhs: Box<Expr>,
    },
    /// Null-coalescing: `rhs` is evaluated only when `lhs` is null.
    Coalesce {
        /// First operand.
        lhs: Box<Expr>,
        /// Fallback, evaluated only on null.
        rhs: Box<Expr>,
    },
    /// Creates a closure over the named function, capturing variables by
    /// reference. Captured variables escape the enclosing function.
    Closure {
        /// The function the closure wraps.
        function: FunctionId,
        /// Variables captured from the enclosing scope.
        captures: Vec<VarId>,
    },
}

/// A call argument with its passing mode.
///
/// `ByRef` and `Out` arguments must be plain variable reads
/// ([`ExprKind::Local`]); lowering rejects anything else.
#[derive(Debug, Clone)]
pub struct Arg {
    /// How the argument is passed.
    pub mode: ParamMode,
    /// The argument expression.
    pub expr: Expr,
}

/// A call target: either a function defined in the module or an interned
/// external symbol whose body is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Callee {
    /// A function defined in this module.
    Function(FunctionId),
    /// An external symbol; calls to it always take the conservative summary.
    External(SymbolId),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// String concatenation. Taint flows through both operands.
    Concat,
    /// Equality comparison.
    Eq,
    /// Inequality comparison.
    Ne,
    /// Less-than comparison.
    Lt,
    /// Less-or-equal comparison.
    Le,
    /// Greater-than comparison.
    Gt,
    /// Greater-or-equal comparison.
    Ge,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Concat => "++",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Neg,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Not => write!(f, "!"),
            UnOp::Neg => write!(f, "-"),
        }
    }
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// Builder-assigned operation id.
    pub id: OpId,
    /// What the statement does.
    pub kind: StmtKind,
}

/// The statement forms the IR supports.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Evaluates an expression for its effects and discards the result.
    Expr(Expr),
    /// Assigns a value to a variable, field, or array element.
    Assign {
        /// The assignment target.
        target: Target,
        /// The value, evaluated after the target's base expressions.
        value: Expr,
    },
    /// Two-way branch.
    If {
        /// The branch condition.
        condition: Expr,
        /// Statements executed when the condition is true.
        then_body: Vec<Stmt>,
        /// Statements executed when the condition is false.
        else_body: Vec<Stmt>,
    },
    /// Pre-tested loop.
    While {
        /// Re-evaluated before every iteration.
        condition: Expr,
        /// The loop body.
        body: Vec<Stmt>,
    },
    /// Returns from the function, optionally with a value.
    Return(Option<Expr>),
    /// Throws an exception value.
    Throw(Expr),
    /// A protected region with optional handlers and an optional finally.
    Try {
        /// The protected statements.
        body: Vec<Stmt>,
        /// Exception handlers, tried in order.
        catches: Vec<CatchClause>,
        /// The finally body, run on all paths out of the region.
        finally_body: Option<Vec<Stmt>>,
    },
    /// Resource-scoped region: binds `resource`, runs `body`, and calls
    /// `dispose` on the resource in an implicit finally.
    Using {
        /// The variable bound to the resource.
        resource: VarId,
        /// The resource initializer.
        init: Expr,
        /// The disposal callee invoked in the implicit finally.
        dispose: Callee,
        /// The scoped statements.
        body: Vec<Stmt>,
    },
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone)]
pub enum Target {
    /// A parameter or local variable.
    Var(VarId),
    /// A field of the object `base` evaluates to. Storing a reference into a
    /// field makes it escape.
    Field {
        /// The object expression.
        base: Expr,
        /// The field being written.
        field: FieldId,
    },
    /// An element of the array `base` evaluates to. Stores with a
    /// non-constant index are treated conservatively by the analyses.
    Elem {
        /// The array expression.
        base: Expr,
        /// The element index.
        index: Expr,
    },
}

/// One exception handler of a [`StmtKind::Try`].
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// The exception type this handler matches; `None` catches everything.
    pub exception_ty: Option<TypeId>,
    /// The variable the caught exception is bound to, if any.
    pub binding: Option<VarId>,
    /// The handler body.
    pub body: Vec<Stmt>,
}
