//! Per-program-point property facts.

use std::collections::BTreeMap;

use crate::analysis::{
    dataflow::JoinSemiLattice,
    points_to::AbstractLocation,
    property_set::value::{PropertyValue, PropertyValues},
};

/// Property facts at one program point.
///
/// The map holds one [`PropertyValues`] vector per tracked object,
/// keyed by abstract location so the facts follow the object through
/// aliases, exactly like taint's heap cells. Objects enter the map when
/// a matched type is constructed; nothing ever leaves it. A location
/// absent from the map is simply not tracked - it was never allocated
/// on any path reaching here, or its type matched no rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyState {
    tracked: BTreeMap<AbstractLocation, PropertyValues>,
}

impl PropertyState {
    /// The state of a block no path has reached: nothing tracked.
    #[must_use]
    pub fn unreached() -> Self {
        Self {
            tracked: BTreeMap::new(),
        }
    }

    /// Returns the property vector of `loc`, if it is tracked.
    #[must_use]
    pub fn values(&self, loc: AbstractLocation) -> Option<&PropertyValues> {
        self.tracked.get(&loc)
    }

    /// Returns `true` if `loc` is tracked.
    #[must_use]
    pub fn is_tracked(&self, loc: AbstractLocation) -> bool {
        self.tracked.contains_key(&loc)
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Iterates over tracked objects in location order.
    pub fn iter(&self) -> impl Iterator<Item = (AbstractLocation, &PropertyValues)> {
        self.tracked.iter().map(|(&loc, values)| (loc, values))
    }

    /// Starts tracking `loc` with `initial` values.
    ///
    /// If the location is already tracked, the vectors are joined: one
    /// allocation site executed twice (a `new` in a loop whose earlier
    /// object is still reachable) folds into one abstract object, and a
    /// strong reset could hide the surviving object's hazardous state.
    pub(crate) fn track(&mut self, loc: AbstractLocation, initial: PropertyValues) {
        match self.tracked.entry(loc) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(initial);
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let joined = entry.get().join(&initial);
                entry.insert(joined);
            }
        }
    }

    /// Strong update: the store provably hit exactly this object.
    pub(crate) fn set_slot(&mut self, loc: AbstractLocation, slot: usize, value: PropertyValue) {
        if let Some(values) = self.tracked.get_mut(&loc) {
            values.set(slot, value);
        }
    }

    /// Weak update: the store may have hit this object.
    pub(crate) fn join_slot(&mut self, loc: AbstractLocation, slot: usize, value: PropertyValue) {
        if let Some(values) = self.tracked.get_mut(&loc) {
            values.join_slot(slot, value);
        }
    }

    /// Weak update of `slot` on every tracked object.
    ///
    /// Used for stores through a base the points-to analysis lost: any
    /// tracked object may have been the one written.
    pub(crate) fn join_slot_everywhere(&mut self, slot: usize, value: PropertyValue) {
        for values in self.tracked.values_mut() {
            values.join_slot(slot, value);
        }
    }

    /// Replaces the whole vector of `loc`. No-op if untracked.
    pub(crate) fn set_values(&mut self, loc: AbstractLocation, values: PropertyValues) {
        if let Some(cell) = self.tracked.get_mut(&loc) {
            *cell = values;
        }
    }

    /// Joins `values` into the vector of `loc`. No-op if untracked.
    pub(crate) fn join_values(&mut self, loc: AbstractLocation, values: &PropertyValues) {
        if let Some(cell) = self.tracked.get_mut(&loc) {
            *cell = cell.join(values);
        }
    }

    /// Joins `Unknown` into every slot of `loc`: the object was handed to
    /// code the analysis will not look inside.
    pub(crate) fn degrade(&mut self, loc: AbstractLocation) {
        if let Some(values) = self.tracked.get_mut(&loc) {
            let unknown = PropertyValues::uniform(values.len(), PropertyValue::Unknown);
            *values = values.join(&unknown);
        }
    }

    /// Degrades every tracked object: an argument the points-to analysis
    /// lost was handed to opaque code, and any object may have been it.
    pub(crate) fn degrade_everywhere(&mut self) {
        for values in self.tracked.values_mut() {
            let unknown = PropertyValues::uniform(values.len(), PropertyValue::Unknown);
            *values = values.join(&unknown);
        }
    }

    /// Joins `values` into every tracked object.
    pub(crate) fn join_values_everywhere(&mut self, values: &PropertyValues) {
        for cell in self.tracked.values_mut() {
            *cell = cell.join(values);
        }
    }
}

impl JoinSemiLattice for PropertyState {
    fn join(&self, other: &Self) -> Self {
        let mut tracked = self.tracked.clone();
        for (key, values) in &other.tracked {
            match tracked.entry(*key) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    // Allocated on one branch only; the object exists as-is
                    // on the paths where it exists at all.
                    entry.insert(values.clone());
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    let joined = entry.get().join(values);
                    entry.insert(joined);
                }
            }
        }
        Self { tracked }
    }

    fn is_top(&self) -> bool {
        self.tracked
            .values()
            .all(|values| values.values().iter().all(|v| v.is_top()))
    }
}
