//! Shared infrastructure used across the analysis layer.
//!
//! - [`graph`] - generic directed graph, traversal orders, dominators, SCCs
//! - [`BitSet`] - dense bit vector for visited sets and worklist membership
//! - [`CancellationToken`] - cooperative cancellation flag polled by solvers
//! - [`escape_dot`] - DOT label escaping for graph exports

mod bitset;
mod cancel;
mod dot;

pub mod graph;

pub use bitset::{BitSet, BitSetIter};
pub use cancel::CancellationToken;
pub use dot::escape_dot;
