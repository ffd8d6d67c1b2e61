//! Module-wide call graph.
//!
//! The call graph records which functions call which, as the structural
//! backbone of interprocedural analysis: the session schedules functions in
//! its bottom-up order so callee summaries are warm before their callers
//! run, and the recursion queries tell the drivers which groups can never
//! be fully inlined.
//!
//! # Architecture
//!
//! - [`CallGraph`]: the graph itself, with lazily computed SCCs, bottom-up
//!   order, and entry points
//! - [`CallGraphNode`]: one function plus the call sites in its body
//! - [`CallSite`]: a single call, with its operation id and [`CallKind`]
//!
//! Call sites are gathered by a worklist walk over the structured body, so
//! they come out in execution order: a call fires after its arguments, a
//! `using` region's dispose fires after its body. Closure creation counts
//! as a call edge because the wrapped function may run whenever the closure
//! is invoked.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::analysis::CallGraph;
//!
//! let graph = CallGraph::build(&module);
//!
//! for function in graph.bottom_up_order() {
//!     // Callees come before callers here.
//! }
//!
//! if graph.has_recursion() {
//!     for function in graph.recursive_functions() {
//!         println!("recursive: {function}");
//!     }
//! }
//! ```

mod graph;
mod site;

pub use graph::{CallGraph, CallGraphNode, CallGraphStats};
pub use site::{CallKind, CallSite};
