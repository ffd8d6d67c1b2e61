//! The property transfer function, summary machinery, and per-function driver.
//!
//! Property state steps through a product: the points-to component resolves
//! which abstract object a field store or call argument denotes, and the
//! property component carries one value vector per tracked object. An object
//! enters the tracked set when a matched type is constructed; literal stores
//! to matched fields move its slots; opaque calls degrade them.
//!
//! # Interprocedural Model
//!
//! A call to a defined function splices in the callee's [`PropertySummary`].
//! Unlike taint, property summaries are not symbolic: the summary is keyed by
//! the property values flowing in at each argument position, so the callee is
//! solved once per distinct entry shape and its exit effects are concrete.
//! The writebacks cover every argument position, not just by-ref and out
//! parameters: a by-value argument passes a reference, and the callee can
//! mutate the object behind it.
//!
//! # Findings
//!
//! Hazard sites are classified in a replay pass after the fixpoint, once per
//! site. Hits carried in from inlined callees name the callee's own site, so
//! a helper that configures an object dangerously is reported where the
//! hazardous call actually sits. An evaluation that comes back unflagged is a
//! clean usage, not a finding, and is dropped on the spot.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    analysis::{
        cfg::{BasicBlock, Cfg, CfgStore},
        dataflow::{AnalysisResults, DataFlowAnalysis, DataFlowSolver, JoinSemiLattice},
        interprocedural::{CallDecision, InterproceduralContext, SummaryCache},
        points_to::{AbstractLocation, Certainty, PointsToEngine, PointsToState, PointsToValue},
        property_set::{
            rule::ResolvedPropertyRule,
            state::PropertyState,
            value::{PropertyValue, PropertyValues},
        },
    },
    ir::{
        CallArg, Callee, FunctionId, Instr, Literal, Module, OpId, OpRef, Operand, Place, Rvalue,
        Terminator, VarId,
    },
    session::{AnalysisConfig, Classification},
    utils::{graph::NodeId, CancellationToken},
    Result,
};

/// The property values observed at each argument position of a call, as the
/// callee sees them. `None` marks a position carrying no tracked object.
pub type EntryValues = Vec<Option<PropertyValues>>;

/// The product state the property analysis iterates over.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFlowState {
    pub(crate) points_to: PointsToState,
    pub(crate) props: PropertyState,
}

impl PropertyFlowState {
    fn unreached(var_count: usize) -> Self {
        Self {
            points_to: PointsToState::unreached(var_count),
            props: PropertyState::unreached(),
        }
    }

    fn all_unknown(var_count: usize) -> Self {
        Self {
            points_to: PointsToState::all_unknown(var_count),
            props: PropertyState::unreached(),
        }
    }

    /// The points-to component.
    #[must_use]
    pub fn points_to(&self) -> &PointsToState {
        &self.points_to
    }

    /// The property component.
    #[must_use]
    pub fn props(&self) -> &PropertyState {
        &self.props
    }
}

impl JoinSemiLattice for PropertyFlowState {
    fn join(&self, other: &Self) -> Self {
        Self {
            points_to: self.points_to.join(&other.points_to),
            props: self.props.join(&other.props),
        }
    }

    fn is_top(&self) -> bool {
        self.points_to.is_top() && self.props.is_top()
    }
}

/// The callee-side property effect of one defined function, for one entry
/// shape.
///
/// The entry values are part of the cache key, so everything in here is
/// concrete: no substitution happens at the call site. Summaries are
/// rule-specific for the same reason taint summaries are; what a field store
/// or hazard means inside the callee depends on the rule that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySummary {
    /// Exit property values of the object at each tracked argument position.
    writebacks: BTreeMap<u16, PropertyValues>,
    /// Hazard sites classified inside the callee and functions it inlined.
    hazard_hits: Vec<(OpRef, Classification)>,
}

/// Steps one instruction at a time through a [`PropertyFlowState`].
///
/// Shared between the solver adapter and the replay pass; only the latter
/// sets `record_hits`.
struct PropertyStepper<'a> {
    module: &'a Module,
    engine: PointsToEngine<'a>,
    rule: &'a ResolvedPropertyRule,
    cfgs: &'a CfgStore,
    summaries: &'a SummaryCache<(FunctionId, EntryValues), PropertySummary>,
    config: &'a AnalysisConfig,
    token: CancellationToken,
    ctx: InterproceduralContext,
    function: FunctionId,
    /// `Some` in summary mode: the values seeding each tracked parameter.
    entry: Option<EntryValues>,
    record_hits: bool,
    hits: Vec<(OpRef, Classification)>,
}

impl<'a> PropertyStepper<'a> {
    /// A stepper for `function` sharing this one's module-wide machinery.
    fn derive(
        &self,
        function: FunctionId,
        ctx: InterproceduralContext,
        entry: Option<EntryValues>,
        record_hits: bool,
    ) -> PropertyStepper<'a> {
        PropertyStepper {
            module: self.module,
            engine: self.engine,
            rule: self.rule,
            cfgs: self.cfgs,
            summaries: self.summaries,
            config: self.config,
            token: self.token.clone(),
            ctx,
            function,
            entry,
            record_hits,
            hits: Vec::new(),
        }
    }

    fn step(&mut self, state: &mut PropertyFlowState, instr: &Instr) {
        let stored = self.eval(state, instr);
        // Points-to steps before the destination store resolves, so a call
        // that reseats the base variable redirects the write, exactly as
        // execution would.
        self.engine.step(&mut state.points_to, instr);
        self.write_property(state, &instr.dst, stored);
    }

    fn finish_block(&self, state: &mut PropertyFlowState, terminator: &Terminator) {
        self.engine.finish_block(&mut state.points_to, terminator);
    }

    /// Applies the rvalue's property effects against the pre-instruction
    /// state and returns the literal it stores, if it stores one.
    fn eval<'i>(&mut self, state: &mut PropertyFlowState, instr: &'i Instr) -> Option<&'i Literal> {
        match &instr.rvalue {
            Rvalue::Use(Operand::Literal(literal)) => Some(literal),
            Rvalue::Use(Operand::Var(_)) => None,
            Rvalue::New { ty, args } => {
                // Constructor bodies are opaque; objects handed to one may
                // be mutated by it.
                for arg in args {
                    degrade_operand(state, arg);
                }
                if self.rule.tracks_type(self.module, *ty) {
                    let literals: Vec<Option<&Literal>> = args
                        .iter()
                        .map(|arg| match arg {
                            Operand::Literal(literal) => Some(literal),
                            Operand::Var(_) => None,
                        })
                        .collect();
                    let initial = self.rule.initial_values(&literals);
                    state
                        .props
                        .track(AbstractLocation::Alloc(instr.op), initial);
                }
                None
            }
            Rvalue::Call { callee, args } => {
                self.eval_call(state, instr.op, *callee, args);
                None
            }
            Rvalue::Closure { captures, .. } => {
                for var in captures {
                    degrade_var(state, *var);
                }
                None
            }
            Rvalue::FieldLoad { .. }
            | Rvalue::ElemLoad { .. }
            | Rvalue::Binary { .. }
            | Rvalue::Unary { .. }
            | Rvalue::CaughtException => None,
        }
    }

    fn eval_call(
        &mut self,
        state: &mut PropertyFlowState,
        op: OpId,
        callee: Callee,
        args: &[CallArg],
    ) {
        // Hazards observe arguments before the call mutates anything. The
        // observations over all watched positions are joined and evaluated
        // once, so a site gets one classification per hazard.
        if self.record_hits {
            let arity = self.rule.arity();
            for hazard in self.rule.matching_hazards(self.module, callee) {
                let mut observed: Option<PropertyValues> = None;
                for (position, arg) in args.iter().enumerate() {
                    if !hazard.covers_position(position as u16) {
                        continue;
                    }
                    if let Some(values) = observe_arg(state, arg, arity) {
                        observed = Some(match observed {
                            Some(acc) => acc.join(&values),
                            None => values,
                        });
                    }
                }
                if let Some(values) = observed {
                    let classification = hazard.classify(&values);
                    if classification != Classification::Unflagged {
                        self.hits
                            .push((OpRef::new(self.function, op), classification));
                    }
                }
            }
        }

        match self.ctx.decide(callee) {
            CallDecision::Inline(id) => {
                let arity = self.rule.arity();
                let entry: EntryValues = args
                    .iter()
                    .map(|arg| observe_arg(state, arg, arity))
                    .collect();
                match self.summary_of(id, entry) {
                    Some(summary) => self.apply_summary(state, &summary, args),
                    None => self.apply_conservative(state, callee, args),
                }
            }
            CallDecision::Summarize(_) => self.apply_conservative(state, callee, args),
        }
    }

    /// Splices a callee summary into the caller's state.
    fn apply_summary(
        &mut self,
        state: &mut PropertyFlowState,
        summary: &PropertySummary,
        args: &[CallArg],
    ) {
        for (&position, values) in &summary.writebacks {
            let var = match args.get(position as usize) {
                Some(CallArg::Value(Operand::Var(var)) | CallArg::ByRef(var)) => *var,
                _ => continue,
            };
            match state.points_to.value(var).clone() {
                PointsToValue::Locations(set) => {
                    let mut entries = set.iter();
                    match (entries.next(), entries.next()) {
                        (Some((loc, Certainty::Definite)), None) => {
                            state.props.set_values(loc, values.clone());
                        }
                        _ => {
                            for loc in set.locations() {
                                state.props.join_values(loc, values);
                            }
                        }
                    }
                }
                PointsToValue::Unknown => state.props.join_values_everywhere(values),
                PointsToValue::Undefined => {}
            }
        }
        if self.record_hits {
            self.hits.extend_from_slice(&summary.hazard_hits);
        }
    }

    /// The worst-case effect of a call the analysis will not look inside.
    ///
    /// A pure callee does not mutate its arguments. Anything else may set
    /// any property of any object it was handed to anything.
    fn apply_conservative(
        &mut self,
        state: &mut PropertyFlowState,
        callee: Callee,
        args: &[CallArg],
    ) {
        if self.engine.is_pure(callee) {
            return;
        }
        for arg in args {
            match arg {
                CallArg::Value(operand) => degrade_operand(state, operand),
                CallArg::ByRef(var) => degrade_var(state, *var),
                // Write-only: the callee never reaches the old object.
                CallArg::Out(_) => {}
            }
        }
    }

    /// The summary for `callee` under `entry`, computing and caching it on
    /// first use.
    ///
    /// Returns `None` when the callee cannot be summarized (its body fails
    /// to lower, or the solve was cancelled); the call site then takes the
    /// conservative effect. Cancellation also aborts the enclosing solve at
    /// its next worklist step, so the degraded result never escapes.
    fn summary_of(
        &mut self,
        callee: FunctionId,
        entry: EntryValues,
    ) -> Option<Arc<PropertySummary>> {
        let key = (callee, entry);
        if let Some(summary) = self.summaries.get(&key) {
            return Some(summary);
        }

        let cfg = match self.cfgs.get_or_build(self.module, callee) {
            Ok(cfg) => cfg,
            Err(error) => {
                debug!("property summary for {callee} unavailable: {error}");
                return None;
            }
        };
        let ctx = self.ctx.child(callee);
        let analysis = PropertyAnalysis {
            stepper: self.derive(callee, ctx.clone(), Some(key.1.clone()), false),
        };
        let solved = DataFlowSolver::new(analysis)
            .with_max_block_visits(self.config.max_block_visits)
            .with_cancellation(self.token.clone())
            .solve(&cfg);
        let results = match solved {
            Ok(results) => results,
            Err(error) => {
                debug!("property summary solve for {callee} aborted: {error}");
                return None;
            }
        };

        let summary = if results.converged() {
            let mut replayer = self.derive(callee, ctx, Some(key.1.clone()), true);
            replay(&mut replayer, &cfg, &results);
            extract_summary(&cfg, &results, replayer.hits)
        } else {
            degraded_summary(&key.1, self.rule.arity())
        };
        Some(self.summaries.insert(key, summary))
    }

    /// Applies a store to `dst` to the property component.
    ///
    /// Only field stores can move a property slot. A base holding exactly
    /// one definite location admits a strong update; ambiguity weakens the
    /// store to a join over every candidate, and a lost base weakens it
    /// over every tracked object. A non-literal value reads as `Unknown`;
    /// the mappers only see values the analysis can actually read.
    fn write_property(
        &self,
        state: &mut PropertyFlowState,
        dst: &Place,
        stored: Option<&Literal>,
    ) {
        let Place::Field { base, field } = dst else {
            return;
        };
        for (slot, mapper) in self.rule.mapped_slots(*field) {
            let value = match stored {
                Some(literal) => mapper(literal),
                None => PropertyValue::Unknown,
            };
            match state.points_to.value(*base).clone() {
                PointsToValue::Locations(set) => {
                    let mut entries = set.iter();
                    match (entries.next(), entries.next()) {
                        (Some((loc, Certainty::Definite)), None) => {
                            state.props.set_slot(loc, slot, value);
                        }
                        _ => {
                            for loc in set.locations() {
                                state.props.join_slot(loc, slot, value);
                            }
                        }
                    }
                }
                PointsToValue::Unknown => state.props.join_slot_everywhere(slot, value),
                PointsToValue::Undefined => {}
            }
        }
    }
}

/// The property values a call argument carries in, as the callee observes
/// them.
///
/// A tracked candidate set joins the vectors of its tracked members; a base
/// the points-to analysis lost reads as all-`Unknown`, since any object at
/// all may be behind it. Literals, out arguments, and arguments holding no
/// tracked object observe nothing.
fn observe_arg(
    state: &PropertyFlowState,
    arg: &CallArg,
    arity: usize,
) -> Option<PropertyValues> {
    let var = match arg {
        CallArg::Value(Operand::Var(var)) | CallArg::ByRef(var) => *var,
        CallArg::Value(Operand::Literal(_)) | CallArg::Out(_) => return None,
    };
    match state.points_to.value(var) {
        PointsToValue::Locations(set) => {
            let mut joined: Option<PropertyValues> = None;
            for loc in set.locations() {
                if let Some(values) = state.props.values(loc) {
                    joined = Some(match joined {
                        Some(acc) => acc.join(values),
                        None => values.clone(),
                    });
                }
            }
            joined
        }
        PointsToValue::Unknown => Some(PropertyValues::uniform(arity, PropertyValue::Unknown)),
        PointsToValue::Undefined => None,
    }
}

fn degrade_operand(state: &mut PropertyFlowState, operand: &Operand) {
    if let Operand::Var(var) = operand {
        degrade_var(state, *var);
    }
}

/// Degrades every tracked object `var` may denote.
fn degrade_var(state: &mut PropertyFlowState, var: VarId) {
    match state.points_to.value(var).clone() {
        PointsToValue::Locations(set) => {
            for loc in set.locations() {
                state.props.degrade(loc);
            }
        }
        PointsToValue::Unknown => state.props.degrade_everywhere(),
        PointsToValue::Undefined => {}
    }
}

/// Walks every block once from its fixpoint entry state.
fn replay(
    stepper: &mut PropertyStepper<'_>,
    cfg: &Cfg,
    results: &AnalysisResults<PropertyFlowState>,
) {
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

/// Distills solved exit states into a summary.
///
/// The writeback for position `p` is the exit vector of the parameter
/// location `p`, joined over all exits. Positions the entry shape left
/// untracked never appear; stores through an untracked parameter are no-ops,
/// so nothing can start tracking one mid-body.
fn extract_summary(
    cfg: &Cfg,
    results: &AnalysisResults<PropertyFlowState>,
    hazard_hits: Vec<(OpRef, Classification)>,
) -> PropertySummary {
    let mut writebacks: BTreeMap<u16, PropertyValues> = BTreeMap::new();
    for &exit in cfg.exits() {
        let Some(out) = results.out_state(exit) else {
            continue;
        };
        for (loc, values) in out.props.iter() {
            let AbstractLocation::Param(position) = loc else {
                continue;
            };
            match writebacks.entry(position) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(values.clone());
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    let joined = entry.get().join(values);
                    entry.insert(joined);
                }
            }
        }
    }
    PropertySummary {
        writebacks,
        hazard_hits,
    }
}

/// The summary of a callee whose solve gave up: every object it was handed
/// comes back all-`Unknown`, and any hazard sites inside it are lost.
fn degraded_summary(entry: &EntryValues, arity: usize) -> PropertySummary {
    PropertySummary {
        writebacks: entry
            .iter()
            .enumerate()
            .filter(|(_, values)| values.is_some())
            .map(|(position, _)| {
                (
                    position as u16,
                    PropertyValues::uniform(arity, PropertyValue::Unknown),
                )
            })
            .collect(),
        hazard_hits: Vec::new(),
    }
}

/// The [`DataFlowAnalysis`] adapter around a [`PropertyStepper`].
struct PropertyAnalysis<'a> {
    stepper: PropertyStepper<'a>,
}

impl DataFlowAnalysis for PropertyAnalysis<'_> {
    type State = PropertyFlowState;

    fn boundary(&self, cfg: &Cfg) -> PropertyFlowState {
        let params = self
            .stepper
            .module
            .function(cfg.function())
            .map_or(&[][..], |function| function.params());
        let mut state = PropertyFlowState {
            points_to: PointsToState::at_entry(params, cfg.var_count()),
            props: PropertyState::unreached(),
        };
        if let Some(entry) = &self.stepper.entry {
            for (position, values) in entry.iter().enumerate() {
                if let Some(values) = values {
                    state
                        .props
                        .track(AbstractLocation::Param(position as u16), values.clone());
                }
            }
        }
        state
    }

    fn initial(&self, cfg: &Cfg) -> PropertyFlowState {
        PropertyFlowState::unreached(cfg.var_count())
    }

    fn unknown(&self, cfg: &Cfg) -> PropertyFlowState {
        PropertyFlowState::all_unknown(cfg.var_count())
    }

    fn transfer(
        &mut self,
        _block: NodeId,
        data: &BasicBlock,
        input: &PropertyFlowState,
        _cfg: &Cfg,
    ) -> PropertyFlowState {
        let mut state = input.clone();
        for instr in data.instrs() {
            self.stepper.step(&mut state, instr);
        }
        self.stepper.finish_block(&mut state, data.terminator());
        state
    }
}

/// One classified hazardous usage. Ordered by site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyUsage {
    site: OpRef,
    classification: Classification,
}

impl PropertyUsage {
    /// The call the tracked object reached.
    #[must_use]
    pub fn site(&self) -> OpRef {
        self.site
    }

    /// How the hazard evaluator classified the object's state there.
    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }
}

impl std::fmt::Display for PropertyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.classification, self.site)
    }
}

/// The outcome of running one property rule over one root function.
#[derive(Debug, Clone)]
pub struct PropertyReport {
    usages: Vec<PropertyUsage>,
    converged: bool,
}

impl PropertyReport {
    /// The classified usages found, one per site, in site order.
    #[must_use]
    pub fn usages(&self) -> &[PropertyUsage] {
        &self.usages
    }

    /// `false` if the solve blew its visit budget; the usage list is then
    /// empty because nothing trustworthy survives the degraded states.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Runs one resolved property rule over root functions of a module.
///
/// The analyzer borrows the session-wide stores: the CFG store so every rule
/// shares lowering work, and a summary cache that must be dedicated to this
/// rule. One analyzer may serve many root functions, from many threads,
/// concurrently.
pub struct PropertyAnalyzer<'a> {
    module: &'a Module,
    rule: &'a ResolvedPropertyRule,
    cfgs: &'a CfgStore,
    summaries: &'a SummaryCache<(FunctionId, EntryValues), PropertySummary>,
    config: &'a AnalysisConfig,
    token: CancellationToken,
}

impl<'a> PropertyAnalyzer<'a> {
    /// Creates an analyzer for `rule` over `module`.
    #[must_use]
    pub fn new(
        module: &'a Module,
        rule: &'a ResolvedPropertyRule,
        cfgs: &'a CfgStore,
        summaries: &'a SummaryCache<(FunctionId, EntryValues), PropertySummary>,
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
    /// A site inlined from several call sites can come back with several
    /// classifications; the report keeps the worst. Parameters of the root
    /// are untracked, so a hazard fed only by a parameter is silent here and
    /// surfaces instead from the callers that know the object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) if the
    /// cancellation token fired mid-solve. Budget exhaustion is reported
    /// through [`PropertyReport::converged`], not as an error.
    pub fn analyze(&self, cfg: &Cfg) -> Result<PropertyReport> {
        let root = cfg.function();
        let ctx = InterproceduralContext::root(
            root,
            self.module.function_count(),
            self.config.max_inline_depth,
        );

        let analysis = PropertyAnalysis {
            stepper: self.stepper(root, ctx.clone(), false),
        };
        let results = DataFlowSolver::new(analysis)
            .with_max_block_visits(self.config.max_block_visits)
            .with_cancellation(self.token.clone())
            .solve(cfg)?;

        if !results.converged() {
            return Ok(PropertyReport {
                usages: Vec::new(),
                converged: false,
            });
        }

        let mut replayer = self.stepper(root, ctx, true);
        replay(&mut replayer, cfg, &results);

        let mut merged: BTreeMap<OpRef, Classification> = BTreeMap::new();
        for (site, classification) in replayer.hits {
            let cell = merged.entry(site).or_insert(classification);
            *cell = (*cell).max(classification);
        }
        Ok(PropertyReport {
            usages: merged
                .into_iter()
                .map(|(site, classification)| PropertyUsage {
                    site,
                    classification,
                })
                .collect(),
            converged: true,
        })
    }

    fn stepper(
        &self,
        function: FunctionId,
        ctx: InterproceduralContext,
        record_hits: bool,
    ) -> PropertyStepper<'a> {
        PropertyStepper {
            module: self.module,
            engine: PointsToEngine::new(self.module),
            rule: self.rule,
            cfgs: self.cfgs,
            summaries: self.summaries,
            config: self.config,
            token: self.token.clone(),
            ctx,
            function,
            entry: None,
            record_hits,
            hits: Vec::new(),
        }
    }
}
