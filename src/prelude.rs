//! # flowscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types from the flowscope library. Import it to get quick access to the
//! essentials: building a module, writing rules, and running a session.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all flowscope operations
pub use crate::Error;

/// The result type used throughout flowscope
pub use crate::Result;

// ================================================================================================
// Building Programs
// ================================================================================================

/// The fluent builders every module starts from
pub use crate::ir::{FunctionBuilder, ModuleBuilder};

/// The finished, immutable program representation
pub use crate::ir::{Function, Module};

/// Dense ids naming functions, variables, operations, and interned names
pub use crate::ir::{FieldId, FunctionId, OpId, SymbolId, TagId, TypeId, VarId};

/// A module-wide reference to one operation in one function
pub use crate::ir::OpRef;

/// Expression and callee forms used when building function bodies
pub use crate::ir::{Arg, Callee, Expr, Literal};

/// Well-known tag marking a callee as free of effects on its arguments
pub use crate::ir::PURE_TAG;

// ================================================================================================
// Rules and Matching
// ================================================================================================

/// Name patterns resolved against a module's interned callees and types
pub use crate::analysis::{CalleeSpec, TypeSpec};

/// Source to sink taint tracking rules
pub use crate::analysis::TaintRule;

/// Where a tainted value entered the program
pub use crate::analysis::taint::TaintOrigin;

/// Three-valued object property rules
pub use crate::analysis::{PropertyRule, PropertyValue, PropertyValues};

/// The stock hazard evaluator: flag if any property slot might be flagged
pub use crate::analysis::worst_case;

// ================================================================================================
// Sessions and Findings
// ================================================================================================

/// The parallel analysis session over one module
pub use crate::session::{Session, SessionReport, SessionStats};

/// Per-session resource bounds
pub use crate::session::AnalysisConfig;

/// What a session reports: classified findings and explained skips
pub use crate::session::{Classification, Finding, SkipRecord};

/// Cooperative cancellation checked at every solver step
pub use crate::utils::CancellationToken;

// ================================================================================================
// Analysis Infrastructure
// ================================================================================================

/// Control flow graphs and the concurrent per-session store
pub use crate::analysis::{Cfg, CfgStore};

/// The call graph with recursion detection and bottom-up ordering
pub use crate::analysis::CallGraph;

/// The lattice trait and worklist solver custom analyses plug into
pub use crate::analysis::dataflow::{
    AnalysisResults, DataFlowAnalysis, DataFlowSolver, JoinSemiLattice,
};

/// Allocation tracking with escape reasons
pub use crate::analysis::points_to::{PointsToAnalysis, PointsToValue};
