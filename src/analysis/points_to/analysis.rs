//! The points-to transfer function and its solver adapter.
//!
//! Tracks which abstract locations each variable may reference and records
//! why allocations become reachable from outside the function. Escape
//! reasons are the part rule analyses consume: once an object escapes, any
//! fact about its contents can be invalidated by code this function never
//! sees, so dependent analyses degrade their knowledge of it to
//! [`PointsToValue::Unknown`].
//!
//! The analysis is intraprocedural. Calls produce unknown results and
//! escape their arguments unless the callee carries the
//! [`PURE_TAG`](crate::ir::PURE_TAG) tag; cross-function reasoning happens
//! in the layers that consume these results.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::{
    analysis::{
        cfg::{BasicBlock, Cfg},
        dataflow::{DataFlowAnalysis, JoinSemiLattice},
        points_to::location::{AbstractLocation, PointsToValue},
    },
    ir::{
        CallArg, Callee, Instr, Literal, Module, Operand, Param, ParamMode, Place, Rvalue, TagId,
        Terminator, VarId, PURE_TAG,
    },
    utils::graph::NodeId,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Why an allocation is considered reachable from outside the function.
    ///
    /// Reasons accumulate: a value that is stored to a field and later
    /// returned carries both bits.
    pub struct EscapeReasons: u8 {
        /// Returned to the caller.
        const RETURNED = 1 << 0;
        /// Passed to a `ref` parameter.
        const PASSED_BY_REF = 1 << 1;
        /// Stored into a field of some object.
        const STORED_TO_FIELD = 1 << 2;
        /// Stored into an array element at a statically unknown index.
        const STORED_TO_UNKNOWN_INDEX = 1 << 3;
        /// Captured by a closure.
        const CAPTURED_BY_CLOSURE = 1 << 4;
        /// Passed by value to a callee the analysis does not model.
        const PASSED_TO_UNKNOWN = 1 << 5;
        /// Stored into an array element at a constant index.
        const STORED_TO_ELEMENT = 1 << 6;
    }
}

/// Points-to facts at one program point.
///
/// One [`PointsToValue`] per variable slot, plus the set of locations that
/// have escaped on some path reaching this point and the reasons they did.
/// The escape map only ever grows along a path; joins union it.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsToState {
    vars: Vec<PointsToValue>,
    escaped: BTreeMap<AbstractLocation, EscapeReasons>,
}

impl PointsToState {
    /// The state of a block no path has reached: every slot undefined.
    #[must_use]
    pub fn unreached(var_count: usize) -> Self {
        Self {
            vars: vec![PointsToValue::Undefined; var_count],
            escaped: BTreeMap::new(),
        }
    }

    /// The state on function entry.
    ///
    /// Each by-value or by-ref parameter points definitely at its own
    /// opaque caller-provided location. `out` parameters carry no incoming
    /// value and stay undefined until first written, as do locals.
    #[must_use]
    pub fn at_entry(params: &[Param], var_count: usize) -> Self {
        let mut state = Self::unreached(var_count);
        for (position, param) in params.iter().enumerate() {
            if param.mode == ParamMode::Out {
                continue;
            }
            let loc = AbstractLocation::Param(position as u16);
            state.set(param.var, PointsToValue::definite(loc));
        }
        state
    }

    /// The degraded state used when a solve gives up: nothing is known.
    #[must_use]
    pub fn all_unknown(var_count: usize) -> Self {
        Self {
            vars: vec![PointsToValue::Unknown; var_count],
            escaped: BTreeMap::new(),
        }
    }

    /// Returns the tracked value of `var`.
    ///
    /// Out-of-range slots read as undefined rather than panicking; lowering
    /// sizes states to the CFG's variable table, so a miss means the caller
    /// mixed up functions.
    #[must_use]
    pub fn value(&self, var: VarId) -> &PointsToValue {
        self.vars
            .get(var.index())
            .unwrap_or(&PointsToValue::Undefined)
    }

    /// Returns the reasons `loc` escaped, if it did.
    #[must_use]
    pub fn escape_reasons(&self, loc: AbstractLocation) -> Option<EscapeReasons> {
        self.escaped.get(&loc).copied()
    }

    /// Returns `true` if `loc` escaped on some path reaching this point.
    #[must_use]
    pub fn is_escaped(&self, loc: AbstractLocation) -> bool {
        self.escaped.contains_key(&loc)
    }

    /// Iterates over escaped locations and their reasons.
    pub fn escaped(&self) -> impl Iterator<Item = (AbstractLocation, EscapeReasons)> + '_ {
        self.escaped.iter().map(|(&loc, &reasons)| (loc, reasons))
    }

    fn set(&mut self, var: VarId, value: PointsToValue) {
        if let Some(slot) = self.vars.get_mut(var.index()) {
            *slot = value;
        }
    }

    /// Marks every location `value` may denote as escaped for `reasons`.
    ///
    /// The null location never escapes; there is no object behind it.
    fn mark_escaped(&mut self, value: &PointsToValue, reasons: EscapeReasons) {
        let Some(locs) = value.locations() else {
            return;
        };
        for loc in locs.locations() {
            if loc == AbstractLocation::Null {
                continue;
            }
            *self.escaped.entry(loc).or_insert(EscapeReasons::empty()) |= reasons;
        }
    }

    /// Applies an assignment to `dst`.
    ///
    /// Variable writes are strong updates. Field and element writes make
    /// the stored value reachable through the base object, so it escapes.
    fn write(&mut self, dst: &Place, value: PointsToValue) {
        match dst {
            Place::Var(var) => self.set(*var, value),
            Place::Field { .. } => self.mark_escaped(&value, EscapeReasons::STORED_TO_FIELD),
            Place::Elem { index, .. } => {
                let reason = if index.is_const_index() {
                    EscapeReasons::STORED_TO_ELEMENT
                } else {
                    EscapeReasons::STORED_TO_UNKNOWN_INDEX
                };
                self.mark_escaped(&value, reason);
            }
        }
    }
}

impl JoinSemiLattice for PointsToState {
    fn join(&self, other: &Self) -> Self {
        debug_assert_eq!(self.vars.len(), other.vars.len());
        let vars = self
            .vars
            .iter()
            .zip(&other.vars)
            .map(|(a, b)| a.join(b))
            .collect();
        let mut escaped = self.escaped.clone();
        for (&loc, &reasons) in &other.escaped {
            *escaped.entry(loc).or_insert(EscapeReasons::empty()) |= reasons;
        }
        Self { vars, escaped }
    }

    fn is_top(&self) -> bool {
        self.vars.iter().all(PointsToValue::is_unknown)
    }
}

/// Evaluates single instructions against a [`PointsToState`].
///
/// Split out from the solver adapter so other analyses can replay points-to
/// facts instruction by instruction while stepping their own state through
/// the same block.
#[derive(Debug, Clone, Copy)]
pub struct PointsToEngine<'m> {
    module: &'m Module,
    pure_tag: Option<TagId>,
}

impl<'m> PointsToEngine<'m> {
    /// Creates an engine over `module`.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            pure_tag: module.tag_by_name(PURE_TAG),
        }
    }

    /// Returns `true` if `callee` carries the pure tag.
    pub(crate) fn is_pure(&self, callee: Callee) -> bool {
        self.pure_tag
            .is_some_and(|tag| self.module.callee_has_tag(callee, tag))
    }

    /// Applies one instruction to `state`.
    pub fn step(&self, state: &mut PointsToState, instr: &Instr) {
        let value = self.eval(state, instr);
        state.write(&instr.dst, value);
    }

    /// Applies a terminator's effects to `state`.
    ///
    /// Only `return` has any: the returned value escapes to the caller.
    pub fn finish_block(&self, state: &mut PointsToState, terminator: &Terminator) {
        if let Terminator::Return(Some(operand)) = terminator {
            let value = Self::operand_value(state, operand);
            state.mark_escaped(&value, EscapeReasons::RETURNED);
        }
    }

    fn operand_value(state: &PointsToState, operand: &Operand) -> PointsToValue {
        match operand {
            Operand::Var(var) => state.value(*var).clone(),
            Operand::Literal(Literal::Null) => PointsToValue::definite(AbstractLocation::Null),
            Operand::Literal(_) => PointsToValue::Unknown,
        }
    }

    fn eval(&self, state: &mut PointsToState, instr: &Instr) -> PointsToValue {
        match &instr.rvalue {
            Rvalue::Use(operand) => Self::operand_value(state, operand),
            // Heap reads are untracked; the loaded value could be anything.
            Rvalue::FieldLoad { .. } | Rvalue::ElemLoad { .. } => PointsToValue::Unknown,
            Rvalue::New { args, .. } => {
                for arg in args {
                    let value = Self::operand_value(state, arg);
                    state.mark_escaped(&value, EscapeReasons::PASSED_TO_UNKNOWN);
                }
                PointsToValue::definite(AbstractLocation::Alloc(instr.op))
            }
            Rvalue::Call { callee, args } => {
                let pure = self.is_pure(*callee);
                for arg in args {
                    match arg {
                        CallArg::Value(operand) => {
                            if !pure {
                                let value = Self::operand_value(state, operand);
                                state.mark_escaped(&value, EscapeReasons::PASSED_TO_UNKNOWN);
                            }
                        }
                        CallArg::ByRef(var) => {
                            let old = state.value(*var).clone();
                            state.mark_escaped(&old, EscapeReasons::PASSED_BY_REF);
                            state.set(*var, PointsToValue::Unknown);
                        }
                        // Write-only: the callee never sees the old value.
                        CallArg::Out(var) => state.set(*var, PointsToValue::Unknown),
                    }
                }
                PointsToValue::Unknown
            }
            Rvalue::Binary { .. } | Rvalue::Unary { .. } => PointsToValue::Unknown,
            Rvalue::Closure { captures, .. } => {
                for var in captures {
                    let value = state.value(*var).clone();
                    state.mark_escaped(&value, EscapeReasons::CAPTURED_BY_CLOSURE);
                }
                PointsToValue::definite(AbstractLocation::Alloc(instr.op))
            }
            Rvalue::CaughtException => PointsToValue::Unknown,
        }
    }
}

/// The [`DataFlowAnalysis`] adapter running the engine over a function.
#[derive(Debug)]
pub struct PointsToAnalysis<'m> {
    module: &'m Module,
    engine: PointsToEngine<'m>,
}

impl<'m> PointsToAnalysis<'m> {
    /// Creates the analysis for functions of `module`.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            engine: PointsToEngine::new(module),
        }
    }

    /// Returns the single-instruction engine this analysis steps with.
    #[must_use]
    pub fn engine(&self) -> PointsToEngine<'m> {
        self.engine
    }
}

impl DataFlowAnalysis for PointsToAnalysis<'_> {
    type State = PointsToState;

    fn boundary(&self, cfg: &Cfg) -> PointsToState {
        let params = match self.module.function(cfg.function()) {
            Some(function) => function.params(),
            None => &[],
        };
        PointsToState::at_entry(params, cfg.var_count())
    }

    fn initial(&self, cfg: &Cfg) -> PointsToState {
        PointsToState::unreached(cfg.var_count())
    }

    fn unknown(&self, cfg: &Cfg) -> PointsToState {
        PointsToState::all_unknown(cfg.var_count())
    }

    fn transfer(
        &mut self,
        _block: NodeId,
        data: &BasicBlock,
        input: &PointsToState,
        _cfg: &Cfg,
    ) -> PointsToState {
        let mut state = input.clone();
        for instr in data.instrs() {
            self.engine.step(&mut state, instr);
        }
        self.engine.finish_block(&mut state, data.terminator());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataflow::{AnalysisResults, DataFlowSolver};
    use crate::analysis::points_to::location::Certainty;
    use crate::ir::{FunctionBuilder, FunctionId, ModuleBuilder, OpId};

    fn analyze<T>(
        build: impl FnOnce(&mut ModuleBuilder, &mut FunctionBuilder) -> T,
    ) -> (T, Module, Cfg, AnalysisResults<PointsToState>) {
        let mut mb = ModuleBuilder::new();
        let mut f = mb.start_function("points_to_test");
        let out = build(&mut mb, &mut f);
        mb.finish_function(f).unwrap();
        let module = mb.finish().unwrap();
        let cfg = Cfg::build(&module, FunctionId::new(0)).unwrap();
        let results = DataFlowSolver::new(PointsToAnalysis::new(&module))
            .solve(&cfg)
            .unwrap();
        (out, module, cfg, results)
    }

    fn exit_state<'a>(
        cfg: &Cfg,
        results: &'a AnalysisResults<PointsToState>,
    ) -> &'a PointsToState {
        results.out_state(cfg.exits()[0]).unwrap()
    }

    #[test]
    fn test_new_allocation_is_definite() {
        let ((x, alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let x = f.local("x");
            let obj = f.new_object(ty, vec![]);
            let alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            f.ret(None);
            (x, alloc)
        });

        let state = exit_state(&cfg, &results);
        assert!(state.value(x).must_point_to(alloc));
        assert!(!state.is_escaped(alloc));
    }

    #[test]
    fn test_null_assignment_tracked() {
        let (x, _module, cfg, results) = analyze(|mb, f| {
            let holder = mb.field("holder");
            let p = f.param("p");
            let x = f.local("x");
            let null = f.null();
            f.assign(x, null);
            let base = f.read(p);
            let stored = f.null();
            f.assign_field(base, holder, stored);
            f.ret(None);
            x
        });

        let state = exit_state(&cfg, &results);
        assert!(state.value(x).must_be_null());
        assert!(state.value(x).may_be_null());
        assert!(!state.is_escaped(AbstractLocation::Null));
    }

    #[test]
    fn test_branch_merge_demotes_certainty() {
        let mut then_alloc = None;
        let mut else_alloc = None;
        let (x, _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let c = f.param("c");
            let x = f.local("x");
            let cond = f.read(c);
            f.if_else(
                cond,
                |f| {
                    let obj = f.new_object(ty, vec![]);
                    then_alloc = Some(AbstractLocation::Alloc(obj.id));
                    f.assign(x, obj);
                },
                |f| {
                    let obj = f.new_object(ty, vec![]);
                    else_alloc = Some(AbstractLocation::Alloc(obj.id));
                    f.assign(x, obj);
                },
            );
            f.ret(None);
            x
        });

        let a1 = then_alloc.unwrap();
        let a2 = else_alloc.unwrap();
        let state = exit_state(&cfg, &results);
        assert!(state.value(x).may_point_to(a1));
        assert!(state.value(x).may_point_to(a2));
        assert!(!state.value(x).must_point_to(a1));
        let locs = state.value(x).locations().unwrap();
        assert_eq!(locs.certainty(a1), Some(Certainty::Maybe));
        assert_eq!(locs.certainty(a2), Some(Certainty::Maybe));
    }

    #[test]
    fn test_join_unions_escape_reasons() {
        let alloc = AbstractLocation::Alloc(OpId::new(0));
        let value = PointsToValue::definite(alloc);
        let mut a = PointsToState::unreached(1);
        let mut b = PointsToState::unreached(1);
        a.mark_escaped(&value, EscapeReasons::RETURNED);
        b.mark_escaped(&value, EscapeReasons::STORED_TO_FIELD);

        let joined = a.join(&b);
        assert_eq!(
            joined.escape_reasons(alloc),
            Some(EscapeReasons::RETURNED | EscapeReasons::STORED_TO_FIELD)
        );
    }

    #[test]
    fn test_out_param_starts_undefined() {
        let ((p, q), _module, cfg, results) = analyze(|_, f| {
            let p = f.param("p");
            let q = f.out_param("q");
            f.ret(None);
            (p, q)
        });

        let state = results.in_state(cfg.entry()).unwrap();
        assert!(state.value(p).must_point_to(AbstractLocation::Param(0)));
        assert!(state.value(q).is_undefined());
    }

    #[test]
    fn test_returned_value_escapes() {
        let ((x, alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let x = f.local("x");
            let obj = f.new_object(ty, vec![]);
            let alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let result = f.read(x);
            f.ret(Some(result));
            (x, alloc)
        });

        let state = exit_state(&cfg, &results);
        assert_eq!(state.escape_reasons(alloc), Some(EscapeReasons::RETURNED));
        assert!(state.value(x).must_point_to(alloc));
    }

    #[test]
    fn test_field_store_escapes() {
        let ((y, alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let payload = mb.field("payload");
            let holder = f.param("holder");
            let x = f.local("x");
            let y = f.local("y");
            let obj = f.new_object(ty, vec![]);
            let alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let base = f.read(holder);
            let value = f.read(x);
            f.assign_field(base, payload, value);
            let base = f.read(holder);
            let loaded = f.field_load(base, payload);
            f.assign(y, loaded);
            f.ret(None);
            (y, alloc)
        });

        let state = exit_state(&cfg, &results);
        assert_eq!(
            state.escape_reasons(alloc),
            Some(EscapeReasons::STORED_TO_FIELD)
        );
        assert!(state.value(y).is_unknown());
    }

    #[test]
    fn test_element_store_escape_depends_on_index() {
        let ((dynamic, constant), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let arr = f.param("arr");
            let i = f.param("i");
            let x = f.local("x");
            let y = f.local("y");
            let obj = f.new_object(ty, vec![]);
            let dynamic = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let obj = f.new_object(ty, vec![]);
            let constant = AbstractLocation::Alloc(obj.id);
            f.assign(y, obj);
            let base = f.read(arr);
            let index = f.read(i);
            let value = f.read(x);
            f.assign_elem(base, index, value);
            let base = f.read(arr);
            let index = f.lit_int(0);
            let value = f.read(y);
            f.assign_elem(base, index, value);
            f.ret(None);
            (dynamic, constant)
        });

        let state = exit_state(&cfg, &results);
        assert_eq!(
            state.escape_reasons(dynamic),
            Some(EscapeReasons::STORED_TO_UNKNOWN_INDEX)
        );
        assert_eq!(
            state.escape_reasons(constant),
            Some(EscapeReasons::STORED_TO_ELEMENT)
        );
    }

    #[test]
    fn test_ref_and_out_arguments_reset_bindings() {
        let ((x, y, ref_alloc, out_alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let reseat = mb.external("Library.Reseat");
            let x = f.local("x");
            let y = f.local("y");
            let obj = f.new_object(ty, vec![]);
            let ref_alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let obj = f.new_object(ty, vec![]);
            let out_alloc = AbstractLocation::Alloc(obj.id);
            f.assign(y, obj);
            let by_ref = f.ref_arg(x);
            let out = f.out_arg(y);
            let call = f.call(Callee::External(reseat), vec![by_ref, out]);
            f.eval(call);
            f.ret(None);
            (x, y, ref_alloc, out_alloc)
        });

        let state = exit_state(&cfg, &results);
        assert!(state.value(x).is_unknown());
        assert!(state.value(y).is_unknown());
        assert_eq!(
            state.escape_reasons(ref_alloc),
            Some(EscapeReasons::PASSED_BY_REF)
        );
        assert!(!state.is_escaped(out_alloc));
    }

    #[test]
    fn test_unmodeled_call_escapes_value_args() {
        let ((x, y, alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let consume = mb.external("Library.Consume");
            let x = f.local("x");
            let y = f.local("y");
            let obj = f.new_object(ty, vec![]);
            let alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let arg = f.read(x);
            let call = f.call_ext(consume, vec![arg]);
            f.assign(y, call);
            f.ret(None);
            (x, y, alloc)
        });

        let state = exit_state(&cfg, &results);
        assert_eq!(
            state.escape_reasons(alloc),
            Some(EscapeReasons::PASSED_TO_UNKNOWN)
        );
        // The binding is untouched; only the object behind it escaped.
        assert!(state.value(x).must_point_to(alloc));
        assert!(state.value(y).is_unknown());
    }

    #[test]
    fn test_pure_callee_does_not_escape_args() {
        let ((x, alloc), _module, cfg, results) = analyze(|mb, f| {
            let ty = mb.ty("Widget");
            let length = mb.external("String.Length");
            let pure = mb.tag(PURE_TAG);
            mb.tag_symbol(length, pure);
            let x = f.local("x");
            let obj = f.new_object(ty, vec![]);
            let alloc = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let arg = f.read(x);
            let call = f.call_ext(length, vec![arg]);
            f.eval(call);
            f.ret(None);
            (x, alloc)
        });

        let state = exit_state(&cfg, &results);
        assert!(!state.is_escaped(alloc));
        assert!(state.value(x).must_point_to(alloc));
    }

    #[test]
    fn test_closure_capture_escapes() {
        let ((g, captured, closure_alloc), _module, cfg, results) = analyze(|mb, f| {
            let callback = {
                let mut body = mb.start_function("callback");
                body.ret(None);
                mb.finish_function(body).unwrap()
            };
            let ty = mb.ty("Widget");
            let x = f.local("x");
            let g = f.local("g");
            let obj = f.new_object(ty, vec![]);
            let captured = AbstractLocation::Alloc(obj.id);
            f.assign(x, obj);
            let closure = f.closure(callback, vec![x]);
            let closure_alloc = AbstractLocation::Alloc(closure.id);
            f.assign(g, closure);
            f.ret(None);
            (g, captured, closure_alloc)
        });

        let state = exit_state(&cfg, &results);
        assert_eq!(
            state.escape_reasons(captured),
            Some(EscapeReasons::CAPTURED_BY_CLOSURE)
        );
        assert!(state.value(g).must_point_to(closure_alloc));
    }
}
