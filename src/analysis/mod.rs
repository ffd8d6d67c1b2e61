//! Program analysis infrastructure.
//!
//! This module holds the whole analysis pipeline, from control flow graph
//! construction up to the rule-facing taint and property-state engines. It
//! builds on the generic graph infrastructure in [`crate::utils::graph`]
//! and consumes the IR defined in [`crate::ir`].
//!
//! # Architecture
//!
//! The pipeline layers, bottom to top:
//!
//! - [`cfg`] - Lowers structured function bodies into control flow graphs
//! - [`dataflow`] - The lattice, analysis trait, and worklist solver every
//!   domain plugs into
//! - [`points_to`] - Allocation tracking and escape reasons
//! - [`callgraph`] - Call edges, recursion detection, and bottom-up order
//! - [`interprocedural`] - Inlining decisions and conservative summaries
//! - [`matcher`] - Name-based rule matchers resolved against a module
//! - [`taint`] - Source to sink flow tracking
//! - [`property_set`] - Three-valued object property tracking
//!
//! Each layer only consumes results from the layers below it; nothing here
//! reaches back into IR construction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use flowscope::analysis::cfg::Cfg;
//! use flowscope::analysis::dataflow::DataFlowSolver;
//! use flowscope::analysis::points_to::PointsToAnalysis;
//!
//! let cfg = Cfg::build(&module, function)?;
//! let points_to = DataFlowSolver::new(PointsToAnalysis::new(&module)).solve(&cfg)?;
//! ```

pub mod callgraph;
pub mod cfg;
pub mod dataflow;
pub mod interprocedural;
pub mod matcher;
pub mod points_to;
pub mod property_set;
pub mod taint;

pub use callgraph::CallGraph;
pub use cfg::{Cfg, CfgStore};
pub use matcher::{CalleeSpec, TypeSpec};
pub use property_set::{worst_case, PropertyRule, PropertyValue, PropertyValues};
pub use taint::TaintRule;
