//! Worklist-based fixpoint solver.
//!
//! This module provides the iterative solver that computes fixpoints for
//! forward dataflow analyses. It uses a worklist algorithm seeded in
//! reverse postorder, which reaches most fixpoints in a single sweep on
//! reducible CFGs.
//!
//! # Algorithm
//!
//! 1. Initialize all blocks with the analysis's initial (bottom) state and
//!    the entry block with the boundary state
//! 2. Queue all reachable blocks in reverse postorder
//! 3. While the worklist is non-empty:
//!    a. Check for cancellation, then dequeue a block
//!    b. Join the exit states of its predecessors into its entry state
//!    c. Apply the transfer function
//!    d. If the exit state changed, queue the block's successors
//! 4. Report convergence
//!
//! # Determinism
//!
//! Given the same CFG and analysis, the solver performs the same visits in
//! the same order and produces identical states. The worklist is a FIFO
//! seeded in reverse postorder, successor pushes follow edge insertion
//! order, and nothing here depends on hash iteration.
//!
//! # Bounded Iteration
//!
//! Analyses whose transfer functions are monotone over a finite-height
//! lattice always converge, but the solver does not trust that: each block
//! has a visit budget, and exceeding it abandons the run. The results are
//! then degraded to the analysis's unknown state so that anything derived
//! from them stays sound.

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    analysis::{
        cfg::Cfg,
        dataflow::{
            framework::{AnalysisResults, Convergence, DataFlowAnalysis},
            lattice::JoinSemiLattice,
        },
    },
    utils::{graph::NodeId, BitSet, CancellationToken},
    Error, Result,
};

/// Default number of times a single block may be revisited before the
/// solver gives up on the function.
pub const DEFAULT_MAX_BLOCK_VISITS: u32 = 1_000;

/// Worklist-based forward dataflow solver.
///
/// # Usage
///
/// ```rust,ignore
/// use flowscope::analysis::dataflow::DataFlowSolver;
///
/// let solver = DataFlowSolver::new(analysis)
///     .with_max_block_visits(config.max_block_visits)
///     .with_cancellation(token.clone());
/// let results = solver.solve(&cfg)?;
///
/// let exit_state = results.out_state(cfg.exits()[0]);
/// ```
pub struct DataFlowSolver<A: DataFlowAnalysis> {
    /// The analysis being solved.
    analysis: A,
    /// Entry state for each block.
    in_states: Vec<A::State>,
    /// Exit state for each block.
    out_states: Vec<A::State>,
    /// Blocks awaiting processing.
    worklist: VecDeque<usize>,
    /// Worklist membership, for deduplication.
    queued: BitSet,
    /// Visit count per block, checked against the budget.
    visits: Vec<u32>,
    max_block_visits: u32,
    cancel: CancellationToken,
    /// Total block visits performed.
    iterations: usize,
}

impl<A: DataFlowAnalysis> DataFlowSolver<A> {
    /// Creates a solver for the given analysis with the default visit
    /// budget and no cancellation.
    #[must_use]
    pub fn new(analysis: A) -> Self {
        Self {
            analysis,
            in_states: Vec::new(),
            out_states: Vec::new(),
            worklist: VecDeque::new(),
            queued: BitSet::new(0),
            visits: Vec::new(),
            max_block_visits: DEFAULT_MAX_BLOCK_VISITS,
            cancel: CancellationToken::new(),
            iterations: 0,
        }
    }

    /// Sets the per-block visit budget.
    #[must_use]
    pub fn with_max_block_visits(mut self, limit: u32) -> Self {
        self.max_block_visits = limit;
        self
    }

    /// Attaches a cancellation token, polled between block visits.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the number of block visits performed so far.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Runs the analysis to a fixpoint over `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the attached cancellation token was
    /// triggered. Budget exhaustion is not an error; it is reported through
    /// [`AnalysisResults::convergence`] with all states degraded to the
    /// analysis's unknown state.
    pub fn solve(mut self, cfg: &Cfg) -> Result<AnalysisResults<A::State>> {
        let num_blocks = cfg.block_count();
        if num_blocks == 0 {
            return Ok(AnalysisResults::new(
                Vec::new(),
                Vec::new(),
                Convergence::Converged,
                0,
            ));
        }

        self.initialize(cfg);
        let convergence = self.iterate(cfg)?;

        if convergence == Convergence::BudgetExhausted {
            let unknown = self.analysis.unknown(cfg);
            self.in_states = vec![unknown.clone(); num_blocks];
            self.out_states = vec![unknown; num_blocks];
        }

        Ok(AnalysisResults::new(
            self.in_states,
            self.out_states,
            convergence,
            self.iterations,
        ))
    }

    fn initialize(&mut self, cfg: &Cfg) {
        let num_blocks = cfg.block_count();
        let initial = self.analysis.initial(cfg);

        self.in_states = vec![initial.clone(); num_blocks];
        self.out_states = vec![initial; num_blocks];
        self.queued = BitSet::new(num_blocks);
        self.visits = vec![0; num_blocks];

        self.in_states[cfg.entry().index()] = self.analysis.boundary(cfg);

        // Unreachable blocks are not queued; they keep the initial state.
        for &node in cfg.reverse_postorder() {
            self.worklist.push_back(node.index());
            self.queued.insert(node.index());
        }
    }

    fn iterate(&mut self, cfg: &Cfg) -> Result<Convergence> {
        while let Some(block_idx) = self.worklist.pop_front() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.queued.remove(block_idx);

            self.visits[block_idx] += 1;
            if self.visits[block_idx] > self.max_block_visits {
                debug!(
                    "giving up on {}: block n{block_idx} exceeded {} visits",
                    cfg.function(),
                    self.max_block_visits
                );
                return Ok(Convergence::BudgetExhausted);
            }
            self.iterations += 1;

            if self.process(block_idx, cfg) {
                for succ in cfg.successors(NodeId::new(block_idx)) {
                    let idx = succ.index();
                    if !self.queued.contains(idx) {
                        self.worklist.push_back(idx);
                        self.queued.insert(idx);
                    }
                }
            }
        }
        Ok(Convergence::Converged)
    }

    /// Processes one block. Returns `true` if its exit state changed.
    fn process(&mut self, block_idx: usize, cfg: &Cfg) -> bool {
        let node = NodeId::new(block_idx);

        // The entry block keeps its boundary state; every other block joins
        // the exit states of its predecessors. Predecessors that were never
        // visited contribute bottom, the join identity.
        if node != cfg.entry() {
            let mut input: Option<A::State> = None;
            for pred in cfg.predecessors(node) {
                let pred_out = &self.out_states[pred.index()];
                input = Some(match input {
                    None => pred_out.clone(),
                    Some(acc) => acc.join(pred_out),
                });
            }
            if let Some(input) = input {
                self.in_states[block_idx] = input;
            }
        }

        let Some(data) = cfg.block(node) else {
            return false;
        };
        let input = self.in_states[block_idx].clone();
        let output = self.analysis.transfer(node, data, &input, cfg);

        let changed = output != self.out_states[block_idx];
        self.out_states[block_idx] = output;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::BasicBlock;
    use crate::ir::{FunctionBuilder, FunctionId, Module, ModuleBuilder};

    fn build_cfg(build: impl FnOnce(&mut ModuleBuilder, &mut FunctionBuilder)) -> (Module, Cfg) {
        let mut mb = ModuleBuilder::new();
        let mut f = mb.start_function("solver_test");
        build(&mut mb, &mut f);
        mb.finish_function(f).unwrap();
        let module = mb.finish().unwrap();
        let cfg = Cfg::build(&module, FunctionId::new(0)).unwrap();
        (module, cfg)
    }

    /// Accumulates the op ids a path may have executed. Join is union, so
    /// the fixpoint at a block is every op reachable on some path to it.
    struct CollectOps {
        universe: usize,
    }

    impl CollectOps {
        fn for_module(module: &Module) -> Self {
            let universe = module
                .functions()
                .map(|f| f.op_count() as usize)
                .max()
                .unwrap_or(0);
            Self { universe }
        }
    }

    impl DataFlowAnalysis for CollectOps {
        type State = BitSet;

        fn boundary(&self, _cfg: &Cfg) -> BitSet {
            BitSet::new(self.universe)
        }

        fn initial(&self, _cfg: &Cfg) -> BitSet {
            BitSet::new(self.universe)
        }

        fn unknown(&self, _cfg: &Cfg) -> BitSet {
            let mut all = BitSet::new(self.universe);
            all.fill();
            all
        }

        fn transfer(
            &mut self,
            _block: NodeId,
            data: &BasicBlock,
            input: &BitSet,
            _cfg: &Cfg,
        ) -> BitSet {
            let mut out = input.clone();
            for op in data.op_ids() {
                out.insert(op.index());
            }
            out
        }
    }

    #[test]
    fn test_straight_line_converges_in_one_visit() {
        let (module, cfg) = build_cfg(|_, f| {
            let x = f.local("x");
            let one = f.lit_int(1);
            f.assign(x, one);
            f.ret(None);
        });

        let results = DataFlowSolver::new(CollectOps::for_module(&module))
            .solve(&cfg)
            .unwrap();

        assert!(results.converged());
        assert_eq!(results.iterations(), 1);
        assert!(!results.out_state(cfg.entry()).unwrap().is_empty());
    }

    #[test]
    fn test_diamond_join_sees_both_arms() {
        let (module, cfg) = build_cfg(|_, f| {
            let c = f.local("c");
            let x = f.local("x");
            let y = f.local("y");
            let cond = f.read(c);
            f.if_else(
                cond,
                |f| {
                    let one = f.lit_int(1);
                    f.assign(x, one);
                },
                |f| {
                    let two = f.lit_int(2);
                    f.assign(y, two);
                },
            );
            f.ret(None);
        });

        let results = DataFlowSolver::new(CollectOps::for_module(&module))
            .solve(&cfg)
            .unwrap();
        assert!(results.converged());

        // At the join, ops from both arms are present.
        let exit = cfg.exits()[0];
        let at_exit = results.in_state(exit).unwrap();
        let arm_ops: Vec<usize> = cfg
            .node_ids()
            .filter(|&n| n != cfg.entry() && n != exit)
            .flat_map(|n| {
                cfg.block(n)
                    .into_iter()
                    .flat_map(|b| b.op_ids().map(|op| op.index()).collect::<Vec<_>>())
            })
            .collect();
        assert!(!arm_ops.is_empty());
        for op in arm_ops {
            assert!(at_exit.contains(op));
        }
    }

    #[test]
    fn test_loop_reaches_fixpoint() {
        let (module, cfg) = build_cfg(|_, f| {
            let i = f.local("i");
            let n = f.local("n");
            let zero = f.lit_int(0);
            f.assign(i, zero);
            let cond_i = f.read(i);
            let cond_n = f.read(n);
            let cond = f.binary(crate::ir::BinOp::Lt, cond_i, cond_n);
            f.while_loop(cond, |f| {
                let cur = f.read(i);
                let one = f.lit_int(1);
                let next = f.binary(crate::ir::BinOp::Add, cur, one);
                f.assign(i, next);
            });
            f.ret(None);
        });

        let results = DataFlowSolver::new(CollectOps::for_module(&module))
            .solve(&cfg)
            .unwrap();

        assert!(results.converged());
        // The back edge forces at least one revisit.
        assert!(results.iterations() > cfg.block_count());

        // Body ops flow around the loop into the exit.
        let exit = cfg.exits()[0];
        let at_exit = results.in_state(exit).unwrap();
        assert!(at_exit.count() > 0);
    }

    #[test]
    fn test_budget_exhaustion_degrades_to_unknown() {
        let (module, cfg) = build_cfg(|_, f| {
            let i = f.local("i");
            let n = f.local("n");
            let cond_i = f.read(i);
            let cond_n = f.read(n);
            let cond = f.binary(crate::ir::BinOp::Lt, cond_i, cond_n);
            f.while_loop(cond, |f| {
                let cur = f.read(i);
                let one = f.lit_int(1);
                let next = f.binary(crate::ir::BinOp::Add, cur, one);
                f.assign(i, next);
            });
            f.ret(None);
        });

        let results = DataFlowSolver::new(CollectOps::for_module(&module))
            .with_max_block_visits(1)
            .solve(&cfg)
            .unwrap();

        assert!(!results.converged());
        assert_eq!(results.convergence(), Convergence::BudgetExhausted);
        // Every state is the degraded top element.
        for node in cfg.node_ids() {
            assert!(results.in_state(node).unwrap().is_top());
            assert!(results.out_state(node).unwrap().is_top());
        }
    }

    #[test]
    fn test_cancellation_aborts_with_error() {
        let (module, cfg) = build_cfg(|_, f| {
            let x = f.local("x");
            let one = f.lit_int(1);
            f.assign(x, one);
            f.ret(None);
        });

        let token = CancellationToken::new();
        token.cancel();
        let result = DataFlowSolver::new(CollectOps::for_module(&module))
            .with_cancellation(token)
            .solve(&cfg);

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_solver_is_deterministic() {
        let build = |_: &mut ModuleBuilder, f: &mut FunctionBuilder| {
            let c = f.local("c");
            let x = f.local("x");
            let cond = f.read(c);
            f.if_else(
                cond,
                |f| {
                    let one = f.lit_int(1);
                    f.assign(x, one);
                },
                |f| {
                    let two = f.lit_int(2);
                    f.assign(x, two);
                },
            );
            f.ret(None);
        };

        let (module_a, cfg_a) = build_cfg(build);
        let (module_b, cfg_b) = build_cfg(build);

        let first = DataFlowSolver::new(CollectOps::for_module(&module_a))
            .solve(&cfg_a)
            .unwrap();
        let second = DataFlowSolver::new(CollectOps::for_module(&module_b))
            .solve(&cfg_b)
            .unwrap();

        assert_eq!(first.iterations(), second.iterations());
        for node in cfg_a.node_ids() {
            assert_eq!(first.in_state(node), second.in_state(node));
            assert_eq!(first.out_state(node), second.out_state(node));
        }
    }

    #[test]
    fn test_unreachable_block_keeps_initial_state() {
        let (module, cfg) = build_cfg(|_, f| {
            let x = f.local("x");
            f.ret(None);
            let one = f.lit_int(1);
            f.assign(x, one);
        });

        let results = DataFlowSolver::new(CollectOps::for_module(&module))
            .solve(&cfg)
            .unwrap();

        let dead = cfg
            .node_ids()
            .find(|n| !cfg.reverse_postorder().contains(n))
            .unwrap();
        assert!(results.out_state(dead).unwrap().is_empty());
    }
}
