//! Per-program-point taint facts.

use std::collections::BTreeMap;

use crate::{
    analysis::{dataflow::JoinSemiLattice, points_to::AbstractLocation, taint::value::TaintValue},
    ir::{FieldId, VarId},
};

/// Taint facts at one program point.
///
/// Taint lives in four kinds of cells:
///
/// - one per variable slot
/// - one per `(location, field)` pair the function stored through
/// - one whole-object cell per location for array elements
/// - one blanket cell for stores through bases the points-to analysis
///   lost track of
///
/// Heap cells are keyed by abstract location so they follow the object,
/// not whichever variable happened to name it; that is what lets taint
/// survive `a.f = tainted; b = a; sink(b.f)`. Absent heap cells read as
/// untainted: the maps only record what some store actually touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintState {
    vars: Vec<TaintValue>,
    fields: BTreeMap<(AbstractLocation, FieldId), TaintValue>,
    elems: BTreeMap<AbstractLocation, TaintValue>,
    unknown_heap: TaintValue,
}

impl TaintState {
    /// The state of a block no path has reached: everything untainted.
    #[must_use]
    pub fn unreached(var_count: usize) -> Self {
        Self {
            vars: vec![TaintValue::Untainted; var_count],
            fields: BTreeMap::new(),
            elems: BTreeMap::new(),
            unknown_heap: TaintValue::Untainted,
        }
    }

    /// The degraded state used when a solve gives up.
    #[must_use]
    pub fn all_unknown(var_count: usize) -> Self {
        Self {
            vars: vec![TaintValue::Unknown; var_count],
            fields: BTreeMap::new(),
            elems: BTreeMap::new(),
            unknown_heap: TaintValue::Unknown,
        }
    }

    /// Returns the taint of `var`.
    #[must_use]
    pub fn var(&self, var: VarId) -> &TaintValue {
        self.vars.get(var.index()).unwrap_or(&TaintValue::Untainted)
    }

    /// Returns the taint stored in `loc.field`.
    #[must_use]
    pub fn field(&self, loc: AbstractLocation, field: FieldId) -> &TaintValue {
        self.fields
            .get(&(loc, field))
            .unwrap_or(&TaintValue::Untainted)
    }

    /// Returns the whole-object element taint of `loc`.
    #[must_use]
    pub fn elem(&self, loc: AbstractLocation) -> &TaintValue {
        self.elems.get(&loc).unwrap_or(&TaintValue::Untainted)
    }

    /// Returns the blanket taint of heap the analysis cannot name.
    #[must_use]
    pub fn unknown_heap(&self) -> &TaintValue {
        &self.unknown_heap
    }

    pub(crate) fn set_var(&mut self, var: VarId, value: TaintValue) {
        if let Some(slot) = self.vars.get_mut(var.index()) {
            *slot = value;
        }
    }

    /// Strong update: the store provably hit exactly this cell.
    pub(crate) fn set_field(&mut self, loc: AbstractLocation, field: FieldId, value: TaintValue) {
        self.fields.insert((loc, field), value);
    }

    /// Weak update: the store may have hit this cell.
    pub(crate) fn join_field(&mut self, loc: AbstractLocation, field: FieldId, value: &TaintValue) {
        let cell = self.fields.entry((loc, field)).or_default();
        *cell = cell.join(value);
    }

    /// Element stores are always weak; one cell covers the whole object.
    pub(crate) fn join_elem(&mut self, loc: AbstractLocation, value: &TaintValue) {
        let cell = self.elems.entry(loc).or_default();
        *cell = cell.join(value);
    }

    pub(crate) fn join_unknown_heap(&mut self, value: &TaintValue) {
        self.unknown_heap = self.unknown_heap.join(value);
    }
}

impl JoinSemiLattice for TaintState {
    fn join(&self, other: &Self) -> Self {
        debug_assert_eq!(self.vars.len(), other.vars.len());
        let vars = self
            .vars
            .iter()
            .zip(&other.vars)
            .map(|(a, b)| a.join(b))
            .collect();
        let mut fields = self.fields.clone();
        for (key, value) in &other.fields {
            let cell = fields.entry(*key).or_default();
            *cell = cell.join(value);
        }
        let mut elems = self.elems.clone();
        for (key, value) in &other.elems {
            let cell = elems.entry(*key).or_default();
            *cell = cell.join(value);
        }
        Self {
            vars,
            fields,
            elems,
            unknown_heap: self.unknown_heap.join(&other.unknown_heap),
        }
    }

    fn is_top(&self) -> bool {
        self.vars.iter().all(TaintValue::is_unknown) && self.unknown_heap.is_unknown()
    }
}
