//! Points-to and escape analysis.
//!
//! Answers two questions about every variable at every program point:
//! which allocations might it reference, and have any of them become
//! reachable from outside the function. The rule-facing analyses consume
//! the answers to pick between strong and weak updates and to know when a
//! tracked fact has to degrade because an aliased object escaped.
//!
//! # Architecture
//!
//! - **Domain**: [`AbstractLocation`] names runtime objects by their
//!   allocation site; [`LocationSet`] pairs each with a [`Certainty`];
//!   [`PointsToValue`] adds the `Undefined` and `Unknown` extremes
//! - **Transfer**: [`PointsToEngine`] evaluates one instruction at a time
//!   and records [`EscapeReasons`] as values leak out of the function
//! - **Solver adapter**: [`PointsToAnalysis`] plugs the engine into the
//!   dataflow framework and produces a [`PointsToState`] per block
//!
//! # Precision Model
//!
//! A variable holding exactly one `Definite` location admits strong
//! updates. Joining control flow paths that disagree demotes entries to
//! `Maybe`, after which consumers must fall back to weak updates. Heap
//! reads are always `Unknown`; the analysis tracks where values go, not
//! what lives in objects.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::analysis::points_to::PointsToAnalysis;
//!
//! let cfg = Cfg::build(&module, function)?;
//! let results = DataFlowSolver::new(PointsToAnalysis::new(&module)).solve(&cfg)?;
//!
//! let at_exit = results.out_state(cfg.exits()[0]).unwrap();
//! for (loc, reasons) in at_exit.escaped() {
//!     println!("{loc} escaped: {reasons:?}");
//! }
//! ```

mod analysis;
mod location;

pub use analysis::{EscapeReasons, PointsToAnalysis, PointsToEngine, PointsToState};
pub use location::{AbstractLocation, Certainty, LocationSet, PointsToValue};
