//! Generic forward dataflow framework.
//!
//! This module provides the machinery for computing properties that
//! propagate along control flow edges: a lattice abstraction, an analysis
//! trait, and a worklist-based fixpoint solver. The concrete domains
//! (points-to, taint, property state) live in sibling modules and plug in
//! through [`DataFlowAnalysis`].
//!
//! # Architecture
//!
//! The framework is built around three core abstractions:
//!
//! - **Lattice**: [`JoinSemiLattice`] defines the domain of abstract
//!   values and how they combine at merge points
//! - **Analysis**: [`DataFlowAnalysis`] specifies transfer functions and
//!   boundary conditions
//! - **Solver**: [`DataFlowSolver`] iterates to a fixpoint with a
//!   reverse-postorder worklist
//!
//! # Degradation over Failure
//!
//! The solver never loops forever and never panics on strange CFGs. A
//! block that exceeds its visit budget abandons the run and degrades every
//! state to the analysis's unknown element; a cancellation request
//! surfaces as [`Error::Cancelled`](crate::Error::Cancelled). Callers
//! treat both as "this one function produced no usable facts" and move on.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::analysis::dataflow::DataFlowSolver;
//!
//! let cfg = Cfg::build(&module, function)?;
//! let solver = DataFlowSolver::new(MyAnalysis::new(&module));
//! let results = solver.solve(&cfg)?;
//!
//! if results.converged() {
//!     let at_exit = results.out_state(cfg.exits()[0]);
//! }
//! ```
//!
//! # Thread Safety
//!
//! The solver is a per-function, single-threaded object. Running many
//! solvers on different functions in parallel is the intended usage; they
//! share nothing but the immutable module.

mod framework;
mod lattice;
mod solver;

pub use framework::{AnalysisResults, Convergence, DataFlowAnalysis};
pub use lattice::JoinSemiLattice;
pub use solver::{DataFlowSolver, DEFAULT_MAX_BLOCK_VISITS};
