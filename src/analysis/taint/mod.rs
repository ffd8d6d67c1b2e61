//! Source to sink taint tracking.
//!
//! A taint rule names the calls that introduce untrusted data, the calls
//! that neutralize it, and the calls it must never reach. This module
//! resolves such rules against a module and tracks the data through
//! copies, string operations, heap cells, and calls to other functions in
//! the module, reporting each distinct source-to-sink pair it finds.
//!
//! # Architecture
//!
//! - **Domain**: [`TaintValue`] is a three-level lattice over origin sets;
//!   [`TaintOrigin`] names where a value entered the program
//! - **State**: [`TaintState`] holds per-variable and per-heap-cell taint;
//!   it steps in a product with the points-to state so heap accesses
//!   resolve through alias information
//! - **Rules**: [`TaintRule`] is the embedder-facing builder;
//!   [`ResolvedTaintRule`] is its names interned against one module
//! - **Driver**: [`TaintAnalyzer`] runs one rule over one root function
//!   and produces a [`TaintReport`] of [`TaintFlow`]s
//!
//! Calls to functions defined in the module are handled through
//! [`TaintSummary`] values computed per callee and shared through the
//! session's summary cache. Summaries are symbolic in their parameters,
//! so one summary serves every call site of a callee under a given rule.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::analysis::{CalleeSpec, TaintRule};
//!
//! let rule = TaintRule::new("sql-injection")
//!     .source(CalleeSpec::symbol("Http.ReadParam"))
//!     .sanitizer(CalleeSpec::symbol("Sql.Escape"))
//!     .sink(CalleeSpec::symbol("Sql.Execute"));
//!
//! let resolved = rule.resolve(&module).expect("rule names resolve");
//! let report = TaintAnalyzer::new(&module, &resolved, &cfgs, &summaries, &config)
//!     .analyze(&cfg)?;
//! for flow in report.flows() {
//!     println!("{flow}");
//! }
//! ```

mod analysis;
mod rule;
mod state;
mod value;

pub use analysis::{TaintAnalyzer, TaintFlow, TaintFlowState, TaintReport, TaintSummary};
pub use rule::{ResolvedTaintRule, TaintRule};
pub use state::TaintState;
pub use value::{TaintOrigin, TaintValue};
