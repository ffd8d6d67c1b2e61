//! Dataflow analysis framework trait and result types.
//!
//! This module defines the core abstraction for dataflow analyses. Any
//! specific analysis (points-to, taint, property state) implements the
//! [`DataFlowAnalysis`] trait to work with the solver.
//!
//! All analyses in this crate are forward analyses: information flows from
//! the entry block toward the exits, and values from multiple predecessors
//! are combined with the lattice join. The escape, taint, and property
//! domains all describe what *may have happened* to a value so far, which
//! is inherently a forward question.

use crate::analysis::{
    cfg::{BasicBlock, Cfg},
    dataflow::lattice::JoinSemiLattice,
};
use crate::utils::graph::NodeId;

/// A forward dataflow analysis over a function's CFG.
///
/// Implementations provide the transfer function and boundary conditions;
/// the solver handles iteration to a fixpoint.
///
/// # Transfer Functions
///
/// The transfer function describes how flowing through a basic block
/// transforms the abstract state: `out[B] = transfer(B, in[B])`. It must be
/// monotone with respect to the lattice order, otherwise the solver may
/// oscillate until its visit budget runs out.
///
/// # Example
///
/// ```rust,ignore
/// use flowscope::analysis::dataflow::{DataFlowAnalysis, JoinSemiLattice};
///
/// struct MyAnalysis;
///
/// impl DataFlowAnalysis for MyAnalysis {
///     type State = MyState;
///
///     fn boundary(&self, cfg: &Cfg) -> MyState {
///         MyState::at_entry(cfg.var_count())
///     }
///
///     fn initial(&self, cfg: &Cfg) -> MyState {
///         MyState::unreached(cfg.var_count())
///     }
///
///     fn unknown(&self, cfg: &Cfg) -> MyState {
///         MyState::all_unknown(cfg.var_count())
///     }
///
///     fn transfer(
///         &mut self,
///         block: NodeId,
///         data: &BasicBlock,
///         input: &MyState,
///         cfg: &Cfg,
///     ) -> MyState {
///         let mut state = input.clone();
///         for instr in data.instrs() {
///             state.step(instr);
///         }
///         state
///     }
/// }
/// ```
pub trait DataFlowAnalysis {
    /// The abstract state tracked per block boundary.
    type State: JoinSemiLattice;

    /// The state at function entry.
    ///
    /// This carries the "known" information at the boundary, such as
    /// parameters pointing at their caller-provided values.
    fn boundary(&self, cfg: &Cfg) -> Self::State;

    /// The state interior blocks start from before iteration.
    ///
    /// This is the bottom element (unreached); the join identity. Blocks
    /// the solver never reaches keep this state, which lets callers
    /// distinguish dead code from analyzed code.
    fn initial(&self, cfg: &Cfg) -> Self::State;

    /// The fully degraded state used when the solver gives up.
    ///
    /// Every tracked location maps to top. Conclusions drawn from this
    /// state are sound but vacuous.
    fn unknown(&self, cfg: &Cfg) -> Self::State;

    /// Computes the state after flowing through `data`, given the state
    /// `input` on entry to the block.
    fn transfer(
        &mut self,
        block: NodeId,
        data: &BasicBlock,
        input: &Self::State,
        cfg: &Cfg,
    ) -> Self::State;
}

/// How a fixpoint run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The solver reached a fixpoint.
    Converged,
    /// A block exceeded the visit budget; all states were degraded to the
    /// analysis's unknown state.
    BudgetExhausted,
}

/// Results of a dataflow analysis.
///
/// Provides the computed abstract states at block boundaries, plus how the
/// run ended. When [`AnalysisResults::converged`] is `false` the states are
/// the degraded unknown state and findings should not be derived from them.
#[derive(Debug, Clone)]
pub struct AnalysisResults<L> {
    in_states: Vec<L>,
    out_states: Vec<L>,
    convergence: Convergence,
    iterations: usize,
}

impl<L> AnalysisResults<L> {
    pub(crate) fn new(
        in_states: Vec<L>,
        out_states: Vec<L>,
        convergence: Convergence,
        iterations: usize,
    ) -> Self {
        Self {
            in_states,
            out_states,
            convergence,
            iterations,
        }
    }

    /// Returns the state on entry to a block, or `None` if the block index
    /// is out of bounds.
    #[must_use]
    pub fn in_state(&self, block: NodeId) -> Option<&L> {
        self.in_states.get(block.index())
    }

    /// Returns the state on exit from a block, or `None` if the block
    /// index is out of bounds.
    #[must_use]
    pub fn out_state(&self, block: NodeId) -> Option<&L> {
        self.out_states.get(block.index())
    }

    /// Returns the number of blocks covered by these results.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.in_states.len()
    }

    /// Returns how the fixpoint run ended.
    #[must_use]
    pub const fn convergence(&self) -> Convergence {
        self.convergence
    }

    /// Returns `true` if the solver reached a fixpoint.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.convergence == Convergence::Converged
    }

    /// Returns the number of block visits the solver performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_accessors() {
        let results =
            AnalysisResults::new(vec![1u32, 2], vec![3u32, 4], Convergence::Converged, 7);
        assert_eq!(results.block_count(), 2);
        assert_eq!(results.in_state(NodeId::new(0)), Some(&1));
        assert_eq!(results.out_state(NodeId::new(1)), Some(&4));
        assert_eq!(results.in_state(NodeId::new(9)), None);
        assert!(results.converged());
        assert_eq!(results.iterations(), 7);
    }

    #[test]
    fn test_budget_exhaustion_is_not_convergence() {
        let results: AnalysisResults<u32> =
            AnalysisResults::new(Vec::new(), Vec::new(), Convergence::BudgetExhausted, 0);
        assert!(!results.converged());
        assert_eq!(results.convergence(), Convergence::BudgetExhausted);
    }
}
