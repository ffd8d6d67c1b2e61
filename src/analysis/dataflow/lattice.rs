//! Lattice traits for dataflow analysis.
//!
//! A lattice defines how abstract values combine at control flow join
//! points. Every analysis domain in this crate implements
//! [`JoinSemiLattice`]; the solver relies on nothing else.
//!
//! # Lattice Theory Background
//!
//! The analyses here are *may* analyses running forward over the CFG, so
//! states climb a join semi-lattice:
//!
//! - **Join (∨)**: Least upper bound, applied where control flow paths
//!   merge
//! - **Top (⊤)**: "Could be anything", absorbs every other element
//! - **Bottom (⊥)**: "Not yet reached", the identity for join
//!
//! # Termination
//!
//! The fixpoint solver terminates because transfer functions are monotone
//! and every domain has finite height: each join either leaves a state
//! unchanged or moves it strictly upward, and there are only finitely many
//! upward steps. A domain that violates either property can still be run,
//! but only the solver's visit budget guarantees termination then.

use std::fmt::Debug;

use crate::utils::BitSet;

/// A join semi-lattice with a join (least upper bound) operation.
///
/// The join combines information from multiple control flow paths. It must
/// satisfy:
///
/// - **Idempotent**: `x.join(x) = x`
/// - **Commutative**: `x.join(y) = y.join(x)`
/// - **Associative**: `x.join(y.join(z)) = (x.join(y)).join(z)`
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::analysis::dataflow::JoinSemiLattice;
///
/// impl JoinSemiLattice for Reachability {
///     fn join(&self, other: &Self) -> Self {
///         match (self, other) {
///             (Self::Unreached, x) | (x, Self::Unreached) => x.clone(),
///             (Self::Reached(a), Self::Reached(b)) if a == b => self.clone(),
///             _ => Self::Unknown,
///         }
///     }
///
///     fn is_top(&self) -> bool {
///         matches!(self, Self::Unknown)
///     }
/// }
/// ```
pub trait JoinSemiLattice: Clone + Debug + PartialEq {
    /// Computes the join (least upper bound) of two lattice elements.
    ///
    /// The join is the least specific value that covers both inputs.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Returns `true` if this is the top element.
    ///
    /// Top represents "no information" or "unknown". Joining anything into
    /// top leaves it unchanged.
    fn is_top(&self) -> bool;
}

impl JoinSemiLattice for BitSet {
    /// Join is union: a bit is set if it may be set on any incoming path.
    fn join(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    fn is_top(&self) -> bool {
        self.count() == self.len()
    }
}
