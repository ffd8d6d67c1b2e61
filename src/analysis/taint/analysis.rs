//! The taint transfer function, summary machinery, and per-function driver.
//!
//! Taint steps through a product state: the points-to component resolves
//! which heap cells a field or element access touches, and the taint
//! component carries origin sets through those cells. Every instruction
//! first has its taint effect applied against the pre-instruction
//! points-to facts, then the points-to engine steps, so base variables
//! reseated by a call are resolved the way execution would.
//!
//! # Interprocedural Model
//!
//! A call to a defined function splices in the callee's [`TaintSummary`]:
//! the taint of its returned value, of each by-ref and out parameter at
//! exit, and the sink hits observed inside it, all expressed over symbolic
//! [`TaintOrigin::Arg`] origins. The summary is computed once per callee
//! by running this same analysis in summary mode and is shared through a
//! [`SummaryCache`]; call sites substitute the caller's actual argument
//! taint for the symbolic origins. Recursive and over-deep calls fall
//! back to the conservative effect, as do externals.
//!
//! # Findings
//!
//! Sink hits are not collected while iterating to the fixpoint; a block
//! revisited by the solver would report them once per visit. After the
//! solve converges, a replay pass walks every block once from its fixed
//! entry state and records hits, so each distinct source-to-sink pair
//! surfaces exactly once regardless of iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::{
    analysis::{
        cfg::{BasicBlock, Cfg, CfgStore},
        dataflow::{AnalysisResults, DataFlowAnalysis, DataFlowSolver, JoinSemiLattice},
        interprocedural::{CallDecision, InterproceduralContext, SummaryCache},
        points_to::{Certainty, PointsToEngine, PointsToState, PointsToValue},
        taint::{
            rule::ResolvedTaintRule,
            state::TaintState,
            value::{TaintOrigin, TaintValue},
        },
    },
    ir::{
        BinOp, CallArg, Callee, FunctionId, Instr, Module, OpId, OpRef, Operand, Param, ParamMode,
        Place, Rvalue, Terminator, UnOp,
    },
    session::AnalysisConfig,
    utils::{graph::NodeId, CancellationToken},
    Result,
};

/// The product state the taint analysis iterates over.
///
/// Points-to and taint step in lockstep through the same instruction
/// stream; keeping them in one lattice means one solve per function
/// instead of two passes that could disagree about visit order.
#[derive(Debug, Clone, PartialEq)]
pub struct TaintFlowState {
    pub(crate) points_to: PointsToState,
    pub(crate) taint: TaintState,
}

impl TaintFlowState {
    fn unreached(var_count: usize) -> Self {
        Self {
            points_to: PointsToState::unreached(var_count),
            taint: TaintState::unreached(var_count),
        }
    }

    fn all_unknown(var_count: usize) -> Self {
        Self {
            points_to: PointsToState::all_unknown(var_count),
            taint: TaintState::all_unknown(var_count),
        }
    }

    /// The points-to component.
    #[must_use]
    pub fn points_to(&self) -> &PointsToState {
        &self.points_to
    }

    /// The taint component.
    #[must_use]
    pub fn taint(&self) -> &TaintState {
        &self.taint
    }
}

impl JoinSemiLattice for TaintFlowState {
    fn join(&self, other: &Self) -> Self {
        Self {
            points_to: self.points_to.join(&other.points_to),
            taint: self.taint.join(&other.taint),
        }
    }

    fn is_top(&self) -> bool {
        self.points_to.is_top() && self.taint.is_top()
    }
}

/// The callee-side taint effect of one defined function.
///
/// Everything is expressed over [`TaintOrigin::Arg`] origins so one
/// summary serves every call site; substitution happens when it is
/// applied. Summaries are rule-specific: what counts as a source or
/// sanitizer inside the callee depends on the rule that ran it, so a
/// cache must never be shared across rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintSummary {
    /// Taint of the returned value, joined over all return exits.
    returned: TaintValue,
    /// Exit taint of each by-ref and out parameter, by position.
    writebacks: BTreeMap<u16, TaintValue>,
    /// Sink hits observed inside the callee and functions it inlined.
    sink_hits: Vec<(OpRef, TaintValue)>,
}

/// How the boundary state seeds parameter taint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamSeed {
    /// Parameters are tainted only if the rule's entry tag marks the
    /// function as receiving untrusted input.
    Root,
    /// Every parameter carries its symbolic [`TaintOrigin::Arg`] origin.
    Summary,
}

/// Steps one instruction at a time through a [`TaintFlowState`].
///
/// Shared between the solver adapter and the replay pass; only the latter
/// sets `record_hits`.
struct TaintStepper<'a> {
    module: &'a Module,
    engine: PointsToEngine<'a>,
    rule: &'a ResolvedTaintRule,
    cfgs: &'a CfgStore,
    summaries: &'a SummaryCache<FunctionId, TaintSummary>,
    config: &'a AnalysisConfig,
    token: CancellationToken,
    ctx: InterproceduralContext,
    function: FunctionId,
    seed: ParamSeed,
    record_hits: bool,
    hits: Vec<(OpRef, TaintValue)>,
}

impl<'a> TaintStepper<'a> {
    /// A stepper for `function` sharing this one's module-wide machinery.
    fn derive(
        &self,
        function: FunctionId,
        ctx: InterproceduralContext,
        seed: ParamSeed,
        record_hits: bool,
    ) -> TaintStepper<'a> {
        TaintStepper {
            module: self.module,
            engine: self.engine,
            rule: self.rule,
            cfgs: self.cfgs,
            summaries: self.summaries,
            config: self.config,
            token: self.token.clone(),
            ctx,
            function,
            seed,
            record_hits,
            hits: Vec::new(),
        }
    }

    fn step(&mut self, state: &mut TaintFlowState, instr: &Instr) {
        let value = self.eval(state, instr);
        // Points-to steps before the destination write resolves: a call
        // that reseats the base variable redirects the store, exactly as
        // execution would.
        self.engine.step(&mut state.points_to, instr);
        write_taint(state, &instr.dst, value);
    }

    fn finish_block(&self, state: &mut TaintFlowState, terminator: &Terminator) {
        self.engine.finish_block(&mut state.points_to, terminator);
    }

    fn eval(&mut self, state: &mut TaintFlowState, instr: &Instr) -> TaintValue {
        match &instr.rvalue {
            Rvalue::Use(operand) => operand_taint(state, operand),
            Rvalue::FieldLoad { base, field } => match state.points_to.value(*base) {
                PointsToValue::Locations(set) => {
                    let mut result = TaintValue::Untainted;
                    for loc in set.locations() {
                        result = result.join(state.taint.field(loc, *field));
                    }
                    result
                }
                PointsToValue::Unknown => state.taint.unknown_heap().join(&TaintValue::Unknown),
                PointsToValue::Undefined => TaintValue::Untainted,
            },
            Rvalue::ElemLoad { base, .. } => match state.points_to.value(*base) {
                PointsToValue::Locations(set) => {
                    let mut result = TaintValue::Untainted;
                    for loc in set.locations() {
                        result = result.join(state.taint.elem(loc));
                    }
                    result
                }
                PointsToValue::Unknown => state.taint.unknown_heap().join(&TaintValue::Unknown),
                PointsToValue::Undefined => TaintValue::Untainted,
            },
            // A constructed object carries whatever its constructor was
            // handed; `new Wrapper(tainted)` is a tainted wrapper.
            Rvalue::New { args, .. } => args.iter().fold(TaintValue::Untainted, |acc, arg| {
                acc.join(&operand_taint(state, arg))
            }),
            Rvalue::Call { callee, args } => self.eval_call(state, instr.op, *callee, args),
            Rvalue::Binary { op, lhs, rhs } => match op {
                BinOp::Concat | BinOp::Add | BinOp::Sub => {
                    operand_taint(state, lhs).join(&operand_taint(state, rhs))
                }
                // Comparisons yield booleans; no data flows through them.
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    TaintValue::Untainted
                }
            },
            Rvalue::Unary { op, operand } => match op {
                UnOp::Neg => operand_taint(state, operand),
                UnOp::Not => TaintValue::Untainted,
            },
            Rvalue::Closure { .. } | Rvalue::CaughtException => TaintValue::Untainted,
        }
    }

    fn eval_call(
        &mut self,
        state: &mut TaintFlowState,
        op: OpId,
        callee: Callee,
        args: &[CallArg],
    ) -> TaintValue {
        // Argument taint as the callee observes it, in position order. Out
        // arguments carry nothing in; the callee never sees their value.
        let arg_taints: Vec<TaintValue> = args
            .iter()
            .map(|arg| match arg {
                CallArg::Value(operand) => operand_taint(state, operand),
                CallArg::ByRef(var) => state.taint.var(*var).clone(),
                CallArg::Out(_) => TaintValue::Untainted,
            })
            .collect();

        // Sinks observe arguments before the call mutates anything.
        if self.record_hits {
            for sink in self.rule.matching_sinks(self.module, callee) {
                for (position, taint) in arg_taints.iter().enumerate() {
                    if sink.covers_position(position as u16) && taint.is_tainted() {
                        self.hits
                            .push((OpRef::new(self.function, op), taint.clone()));
                    }
                }
            }
        }

        // Source and sanitizer classifications take precedence over the
        // callee's body: the rule declared what the call means.
        if self.rule.is_source(self.module, callee) {
            let taint = TaintValue::tainted(TaintOrigin::Call(OpRef::new(self.function, op)));
            for arg in args {
                if let CallArg::ByRef(var) | CallArg::Out(var) = arg {
                    state.taint.set_var(*var, taint.clone());
                }
            }
            return taint;
        }
        if self.rule.is_sanitizer(self.module, callee) {
            for arg in args {
                if let CallArg::ByRef(var) | CallArg::Out(var) = arg {
                    state.taint.set_var(*var, TaintValue::Untainted);
                }
            }
            return TaintValue::Untainted;
        }

        match self.ctx.decide(callee) {
            CallDecision::Inline(id) => match self.summary_of(id) {
                Some(summary) => self.apply_summary(state, &summary, op, args, &arg_taints),
                None => self.apply_conservative(state, callee, args, &arg_taints),
            },
            CallDecision::Summarize(_) => self.apply_conservative(state, callee, args, &arg_taints),
        }
    }

    /// Splices a callee summary into the caller's state.
    fn apply_summary(
        &mut self,
        state: &mut TaintFlowState,
        summary: &TaintSummary,
        _op: OpId,
        args: &[CallArg],
        arg_taints: &[TaintValue],
    ) -> TaintValue {
        for (&position, taint) in &summary.writebacks {
            if let Some(CallArg::ByRef(var) | CallArg::Out(var)) = args.get(position as usize) {
                state.taint.set_var(*var, substitute(taint, arg_taints));
            }
        }
        if self.record_hits {
            for (site, taint) in &summary.sink_hits {
                let actual = substitute(taint, arg_taints);
                if actual.is_tainted() {
                    self.hits.push((*site, actual));
                }
            }
        }
        substitute(&summary.returned, arg_taints)
    }

    /// The worst-case effect of a call the analysis will not look inside.
    ///
    /// A pure callee derives its outputs from its arguments alone. Anything
    /// else may stash argument taint in heap the caller can reach and hand
    /// back data from places the analysis never saw.
    fn apply_conservative(
        &mut self,
        state: &mut TaintFlowState,
        callee: Callee,
        args: &[CallArg],
        arg_taints: &[TaintValue],
    ) -> TaintValue {
        let inflow = arg_taints
            .iter()
            .fold(TaintValue::Untainted, |acc, taint| acc.join(taint));

        if self.engine.is_pure(callee) {
            for arg in args {
                if let CallArg::Out(var) = arg {
                    state.taint.set_var(*var, inflow.clone());
                }
                // By-ref variables keep their taint: pure callees do not
                // write through references.
            }
            return inflow;
        }

        let outflow = inflow.join(&TaintValue::Unknown);
        if inflow.is_tainted() {
            state.taint.join_unknown_heap(&inflow);
        }
        for arg in args {
            if let CallArg::ByRef(var) | CallArg::Out(var) = arg {
                state.taint.set_var(*var, outflow.clone());
            }
        }
        outflow
    }

    /// The summary for `callee`, computing and caching it on first use.
    ///
    /// Returns `None` when the callee cannot be summarized (its body fails
    /// to lower, or the solve was cancelled); the call site then takes the
    /// conservative effect. Cancellation also aborts the enclosing solve
    /// at its next worklist step, so the degraded result never escapes.
    fn summary_of(&mut self, callee: FunctionId) -> Option<Arc<TaintSummary>> {
        if let Some(summary) = self.summaries.get(&callee) {
            return Some(summary);
        }

        let cfg = match self.cfgs.get_or_build(self.module, callee) {
            Ok(cfg) => cfg,
            Err(error) => {
                debug!("taint summary for {callee} unavailable: {error}");
                return None;
            }
        };
        let ctx = self.ctx.child(callee);
        let analysis = TaintAnalysis {
            stepper: self.derive(callee, ctx.clone(), ParamSeed::Summary, false),
        };
        let solved = DataFlowSolver::new(analysis)
            .with_max_block_visits(self.config.max_block_visits)
            .with_cancellation(self.token.clone())
            .solve(&cfg);
        let results = match solved {
            Ok(results) => results,
            Err(error) => {
                debug!("taint summary solve for {callee} aborted: {error}");
                return None;
            }
        };

        let summary = if results.converged() {
            let mut replayer = self.derive(callee, ctx, ParamSeed::Summary, true);
            replay(&mut replayer, &cfg, &results);
            extract_summary(self.module, &cfg, &results, replayer.hits)
        } else {
            degraded_summary(self.module, callee)
        };
        Some(self.summaries.insert(callee, summary))
    }
}

/// Replaces symbolic argument origins with the caller's actual taint.
///
/// Concrete origins pass through untouched; an `Arg` origin beyond the
/// argument list reads as unknown rather than dropping silently.
fn substitute(value: &TaintValue, arg_taints: &[TaintValue]) -> TaintValue {
    let TaintValue::Tainted(origins) = value else {
        return value.clone();
    };
    let mut result = TaintValue::Untainted;
    for origin in origins {
        let contribution = match origin {
            TaintOrigin::Arg(position) => arg_taints
                .get(*position as usize)
                .cloned()
                .unwrap_or(TaintValue::Unknown),
            concrete => TaintValue::tainted(*concrete),
        };
        result = result.join(&contribution);
    }
    result
}

fn operand_taint(state: &TaintFlowState, operand: &Operand) -> TaintValue {
    match operand {
        Operand::Var(var) => state.taint.var(*var).clone(),
        Operand::Literal(_) => TaintValue::Untainted,
    }
}

/// Applies a taint store to `dst`, resolving heap bases through points-to.
///
/// A base holding exactly one definite location admits a strong field
/// update; any ambiguity weakens the store to a join over every candidate
/// cell. Element stores are always weak. A base the points-to analysis
/// lost track of spills into the blanket unknown-heap cell.
fn write_taint(state: &mut TaintFlowState, dst: &Place, value: TaintValue) {
    match dst {
        Place::Var(var) => state.taint.set_var(*var, value),
        Place::Field { base, field } => match state.points_to.value(*base) {
            PointsToValue::Locations(set) => {
                let mut entries = set.iter();
                match (entries.next(), entries.next()) {
                    (Some((loc, Certainty::Definite)), None) => {
                        state.taint.set_field(loc, *field, value);
                    }
                    _ => {
                        for loc in set.locations() {
                            state.taint.join_field(loc, *field, &value);
                        }
                    }
                }
            }
            PointsToValue::Unknown => state.taint.join_unknown_heap(&value),
            PointsToValue::Undefined => {}
        },
        Place::Elem { base, .. } => match state.points_to.value(*base) {
            PointsToValue::Locations(set) => {
                for loc in set.locations() {
                    state.taint.join_elem(loc, &value);
                }
            }
            PointsToValue::Unknown => state.taint.join_unknown_heap(&value),
            PointsToValue::Undefined => {}
        },
    }
}

/// Walks every block once from its fixpoint entry state.
fn replay(stepper: &mut TaintStepper<'_>, cfg: &Cfg, results: &AnalysisResults<TaintFlowState>) {
    for &node in cfg.reverse_postorder() {
        let Some(block) = cfg.block(node) else {
            continue;
        };
        let Some(input) = results.in_state(node) else {
            continue;
        };
        let mut state = input.clone();
        for instr in block.instrs() {
            stepper.step(&mut state, instr);
        }
    }
}

fn writeback_params(params: &[Param]) -> impl Iterator<Item = (u16, &Param)> {
    params
        .iter()
        .enumerate()
        .filter(|(_, param)| matches!(param.mode, ParamMode::ByRef | ParamMode::Out))
        .map(|(position, param)| (position as u16, param))
}

/// Distills solved exit states into a symbolic summary.
fn extract_summary(
    module: &Module,
    cfg: &Cfg,
    results: &AnalysisResults<TaintFlowState>,
    sink_hits: Vec<(OpRef, TaintValue)>,
) -> TaintSummary {
    let params = module
        .function(cfg.function())
        .map_or(&[][..], |function| function.params());

    let mut returned = TaintValue::Untainted;
    let mut writebacks: BTreeMap<u16, TaintValue> = BTreeMap::new();
    for &exit in cfg.exits() {
        let Some(block) = cfg.block(exit) else {
            continue;
        };
        let Some(out) = results.out_state(exit) else {
            continue;
        };
        if let Terminator::Return(Some(operand)) = block.terminator() {
            returned = returned.join(&operand_taint(out, operand));
        }
        for (position, param) in writeback_params(params) {
            let cell = writebacks.entry(position).or_default();
            *cell = cell.join(out.taint.var(param.var));
        }
    }
    TaintSummary {
        returned,
        writebacks,
        sink_hits,
    }
}

/// The summary of a callee whose solve gave up: nothing is known, and any
/// sink hits inside it are lost with it.
fn degraded_summary(module: &Module, callee: FunctionId) -> TaintSummary {
    let params = module
        .function(callee)
        .map_or(&[][..], |function| function.params());
    TaintSummary {
        returned: TaintValue::Unknown,
        writebacks: writeback_params(params)
            .map(|(position, _)| (position, TaintValue::Unknown))
            .collect(),
        sink_hits: Vec::new(),
    }
}

/// The [`DataFlowAnalysis`] adapter around a [`TaintStepper`].
struct TaintAnalysis<'a> {
    stepper: TaintStepper<'a>,
}

impl DataFlowAnalysis for TaintAnalysis<'_> {
    type State = TaintFlowState;

    fn boundary(&self, cfg: &Cfg) -> TaintFlowState {
        let function = self.stepper.module.function(cfg.function());
        let params = function.map_or(&[][..], |function| function.params());
        let mut state = TaintFlowState {
            points_to: PointsToState::at_entry(params, cfg.var_count()),
            taint: TaintState::unreached(cfg.var_count()),
        };

        let seeded = match self.stepper.seed {
            ParamSeed::Summary => true,
            ParamSeed::Root => function.is_some_and(|f| self.stepper.rule.is_entry(f)),
        };
        if seeded {
            for (position, param) in params.iter().enumerate() {
                if param.mode == ParamMode::Out {
                    continue;
                }
                let origin = match self.stepper.seed {
                    ParamSeed::Root => TaintOrigin::EntryParam(cfg.function(), position as u16),
                    ParamSeed::Summary => TaintOrigin::Arg(position as u16),
                };
                state.taint.set_var(param.var, TaintValue::tainted(origin));
            }
        }
        state
    }

    fn initial(&self, cfg: &Cfg) -> TaintFlowState {
        TaintFlowState::unreached(cfg.var_count())
    }

    fn unknown(&self, cfg: &Cfg) -> TaintFlowState {
        TaintFlowState::all_unknown(cfg.var_count())
    }

    fn transfer(
        &mut self,
        _block: NodeId,
        data: &BasicBlock,
        input: &TaintFlowState,
        _cfg: &Cfg,
    ) -> TaintFlowState {
        let mut state = input.clone();
        for instr in data.instrs() {
            self.stepper.step(&mut state, instr);
        }
        self.stepper.finish_block(&mut state, data.terminator());
        state
    }
}

/// One source-to-sink flow. Ordered by sink location, then origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaintFlow {
    sink: OpRef,
    source: TaintOrigin,
}

impl TaintFlow {
    /// The dangerous call the tainted value reached.
    #[must_use]
    pub fn sink(&self) -> OpRef {
        self.sink
    }

    /// Where the tainted value entered the program.
    #[must_use]
    pub fn source(&self) -> TaintOrigin {
        self.source
    }
}

impl std::fmt::Display for TaintFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.sink)
    }
}

/// The outcome of running one taint rule over one root function.
#[derive(Debug, Clone)]
pub struct TaintReport {
    flows: Vec<TaintFlow>,
    converged: bool,
}

impl TaintReport {
    /// The distinct flows found, in sink-then-source order.
    #[must_use]
    pub fn flows(&self) -> &[TaintFlow] {
        &self.flows
    }

    /// `false` if the solve blew its visit budget; the flow list is then
    /// empty because nothing attributable survives the degraded states.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Runs one resolved taint rule over root functions of a module.
///
/// The analyzer borrows the session-wide stores: the CFG store so every
/// rule shares lowering work, and a summary cache that must be dedicated
/// to this rule. One analyzer may serve many root functions, from many
/// threads, concurrently.
pub struct TaintAnalyzer<'a> {
    module: &'a Module,
    rule: &'a ResolvedTaintRule,
    cfgs: &'a CfgStore,
    summaries: &'a SummaryCache<FunctionId, TaintSummary>,
    config: &'a AnalysisConfig,
    token: CancellationToken,
}

impl<'a> TaintAnalyzer<'a> {
    /// Creates an analyzer for `rule` over `module`.
    #[must_use]
    pub fn new(
        module: &'a Module,
        rule: &'a ResolvedTaintRule,
        cfgs: &'a CfgStore,
        summaries: &'a SummaryCache<FunctionId, TaintSummary>,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            module,
            rule,
            cfgs,
            summaries,
            config,
            token: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, polled by every solve this analyzer
    /// starts.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Analyzes one root function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) if the
    /// cancellation token fired mid-solve. Budget exhaustion is reported
    /// through [`TaintReport::converged`], not as an error.
    pub fn analyze(&self, cfg: &Cfg) -> Result<TaintReport> {
        let root = cfg.function();
        let ctx = InterproceduralContext::root(
            root,
            self.module.function_count(),
            self.config.max_inline_depth,
        );

        let analysis = TaintAnalysis {
            stepper: self.stepper(root, ctx.clone(), false),
        };
        let results = DataFlowSolver::new(analysis)
            .with_max_block_visits(self.config.max_block_visits)
            .with_cancellation(self.token.clone())
            .solve(cfg)?;

        if !results.converged() {
            return Ok(TaintReport {
                flows: Vec::new(),
                converged: false,
            });
        }

        let mut replayer = self.stepper(root, ctx, true);
        replay(&mut replayer, cfg, &results);

        let mut flows = BTreeSet::new();
        for (sink, taint) in replayer.hits {
            if let TaintValue::Tainted(origins) = taint {
                for source in origins {
                    if source.is_reportable() {
                        flows.insert(TaintFlow { sink, source });
                    }
                }
            }
        }
        Ok(TaintReport {
            flows: flows.into_iter().collect(),
            converged: true,
        })
    }

    fn stepper(
        &self,
        function: FunctionId,
        ctx: InterproceduralContext,
        record_hits: bool,
    ) -> TaintStepper<'a> {
        TaintStepper {
            module: self.module,
            engine: PointsToEngine::new(self.module),
            rule: self.rule,
            cfgs: self.cfgs,
            summaries: self.summaries,
            config: self.config,
            token: self.token.clone(),
            ctx,
            function,
            seed: ParamSeed::Root,
            record_hits,
            hits: Vec::new(),
        }
    }
}
