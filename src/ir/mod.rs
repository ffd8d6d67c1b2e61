//! Intermediate representation of the programs under analysis.
//!
//! Analyses in this crate never look at source text. Embedders translate
//! whatever frontend they have into this small structured IR and the rest of
//! the pipeline works from it. The representation has two layers:
//!
//! - A structured operation tree ([`Stmt`] / [`Expr`]) produced by the
//!   [`ModuleBuilder`] and [`FunctionBuilder`] fluent API. This is the input
//!   form: it keeps `if`/`while`/`try` nesting and short-circuit operators
//!   intact so control-flow lowering can see them.
//! - A flat instruction form ([`Instr`] / [`Terminator`]) produced by CFG
//!   construction in [`crate::analysis::cfg`]. Transfer functions consume
//!   this form: every operand is a variable or literal, every intermediate
//!   value lives in a compiler-introduced temporary.
//!
//! # Architecture
//!
//! - `types` - Dense id newtypes ([`FunctionId`], [`VarId`], [`OpId`], ...),
//!   literals, parameter modes
//! - `ops` - The structured statement/expression tree
//! - `instr` - The flat lowered instruction form
//! - `function` / `module` - Containers with interning tables for names,
//!   fields, external symbols, types, and tags
//! - `builder` - The fluent construction API
//!
//! # Operation identity
//!
//! Every tree node carries an [`OpId`], dense per function and assigned in
//! construction order. Lowering preserves these ids on the instructions it
//! emits, so analysis findings reported as `(FunctionId, OpId)` pairs point
//! back at the exact source operation the embedder built.

mod builder;
mod function;
mod instr;
mod module;
mod ops;
mod types;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use function::{Function, Param, VarInfo};
pub use instr::{CallArg, Instr, Operand, Place, Rvalue, Terminator};
pub use module::Module;
pub use ops::{Arg, BinOp, Callee, CatchClause, Expr, ExprKind, Stmt, StmtKind, Target, UnOp};
pub use types::{
    FieldId, FunctionId, Literal, OpId, OpRef, ParamMode, SymbolId, TagId, TypeId, VarId, VarKind,
};

/// Well-known tag marking a callee as free of effects on its arguments.
///
/// Passing a tracked value to a tagged callee neither escapes it nor
/// invalidates what the caller knows about it. Embedders opt a callee in by
/// interning this tag with [`ModuleBuilder::tag`] and attaching it via
/// [`ModuleBuilder::tag_symbol`] or [`ModuleBuilder::tag_function`].
pub const PURE_TAG: &str = "pure";
