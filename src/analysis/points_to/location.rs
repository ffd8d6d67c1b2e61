//! Abstract locations and per-variable points-to values.
//!
//! An [`AbstractLocation`] is the analysis-time identity of a runtime
//! object. Two variables holding the same location are aliases; a location
//! that appears in an escape set may be reachable from outside the
//! function. Locations are deliberately coarse: one per allocation site,
//! one per parameter, and one for `null`.

use std::collections::BTreeMap;
use std::fmt;

use crate::ir::OpId;

/// The analysis-time identity of a runtime object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbstractLocation {
    /// The null reference.
    Null,
    /// An object created at the given allocation site. Every execution of
    /// the site is folded into one location.
    Alloc(OpId),
    /// The caller-provided value of the parameter at the given position.
    /// Distinct positions are assumed not to alias each other.
    Param(u16),
}

impl fmt::Display for AbstractLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractLocation::Null => write!(f, "null"),
            AbstractLocation::Alloc(op) => write!(f, "alloc@{op}"),
            AbstractLocation::Param(pos) => write!(f, "param{pos}"),
        }
    }
}

/// How certain the analysis is that a variable points at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Certainty {
    /// The variable points at this location on every path reaching here.
    Definite,
    /// The variable points at this location on at least one path.
    Maybe,
}

/// A set of candidate locations with per-location certainty.
///
/// A `Definite` entry can only exist while it is the set's sole member;
/// merging control flow paths demotes disagreeing entries to `Maybe`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocationSet {
    entries: BTreeMap<AbstractLocation, Certainty>,
}

impl LocationSet {
    /// A singleton set that definitely points at `loc`.
    #[must_use]
    pub fn definite(loc: AbstractLocation) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(loc, Certainty::Definite);
        Self { entries }
    }

    /// A set that may point at any of `locs`.
    #[must_use]
    pub fn maybe_of(locs: impl IntoIterator<Item = AbstractLocation>) -> Self {
        let entries = locs.into_iter().map(|l| (l, Certainty::Maybe)).collect();
        Self { entries }
    }

    /// Returns the certainty for `loc`, if the set contains it.
    #[must_use]
    pub fn certainty(&self, loc: AbstractLocation) -> Option<Certainty> {
        self.entries.get(&loc).copied()
    }

    /// Returns `true` if `loc` is a candidate.
    #[must_use]
    pub fn contains(&self, loc: AbstractLocation) -> bool {
        self.entries.contains_key(&loc)
    }

    /// Iterates over `(location, certainty)` pairs in location order.
    pub fn iter(&self) -> impl Iterator<Item = (AbstractLocation, Certainty)> + '_ {
        self.entries.iter().map(|(&l, &c)| (l, c))
    }

    /// Iterates over the candidate locations in order.
    pub fn locations(&self) -> impl Iterator<Item = AbstractLocation> + '_ {
        self.entries.keys().copied()
    }

    /// Returns the number of candidate locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set has no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges two candidate sets.
    ///
    /// A location stays `Definite` only if it is `Definite` on both sides;
    /// everything else, including locations present on one side only,
    /// becomes `Maybe`.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut merged = BTreeMap::new();
        for (&loc, &cert) in &self.entries {
            let combined = match (cert, other.entries.get(&loc)) {
                (Certainty::Definite, Some(Certainty::Definite)) => Certainty::Definite,
                _ => Certainty::Maybe,
            };
            merged.insert(loc, combined);
        }
        for &loc in other.entries.keys() {
            merged.entry(loc).or_insert(Certainty::Maybe);
        }
        Self { entries: merged }
    }
}

impl fmt::Display for LocationSet {
    /// Definite entries print bare; maybe entries carry a `?` suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (loc, cert)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match cert {
                Certainty::Definite => write!(f, "{loc}")?,
                Certainty::Maybe => write!(f, "{loc}?")?,
            }
        }
        write!(f, "}}")
    }
}

/// What a variable may reference at a program point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PointsToValue {
    /// No value has reached this variable yet. Bottom; the join identity.
    #[default]
    Undefined,
    /// The variable references one of these candidate locations.
    Locations(LocationSet),
    /// The variable could reference anything. Top; absorbs every join.
    Unknown,
}

impl PointsToValue {
    /// A value that definitely references `loc`.
    #[must_use]
    pub fn definite(loc: AbstractLocation) -> Self {
        PointsToValue::Locations(LocationSet::definite(loc))
    }

    /// Returns `true` for the top element.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, PointsToValue::Unknown)
    }

    /// Returns `true` for the bottom element.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, PointsToValue::Undefined)
    }

    /// Returns the candidate set, if the value is neither top nor bottom.
    #[must_use]
    pub fn locations(&self) -> Option<&LocationSet> {
        match self {
            PointsToValue::Locations(set) => Some(set),
            _ => None,
        }
    }

    /// Returns `true` if the value may reference `loc`.
    ///
    /// `Unknown` may reference anything; `Undefined` references nothing.
    #[must_use]
    pub fn may_point_to(&self, loc: AbstractLocation) -> bool {
        match self {
            PointsToValue::Undefined => false,
            PointsToValue::Unknown => true,
            PointsToValue::Locations(set) => set.contains(loc),
        }
    }

    /// Returns `true` if the value references `loc` on every path.
    #[must_use]
    pub fn must_point_to(&self, loc: AbstractLocation) -> bool {
        match self {
            PointsToValue::Locations(set) => {
                set.len() == 1 && set.certainty(loc) == Some(Certainty::Definite)
            }
            _ => false,
        }
    }

    /// Returns `true` if the value may be the null reference.
    #[must_use]
    pub fn may_be_null(&self) -> bool {
        self.may_point_to(AbstractLocation::Null)
    }

    /// Returns `true` if the value is the null reference on every path.
    #[must_use]
    pub fn must_be_null(&self) -> bool {
        self.must_point_to(AbstractLocation::Null)
    }

    /// Least upper bound of two values.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToValue::Undefined, x) | (x, PointsToValue::Undefined) => x.clone(),
            (PointsToValue::Unknown, _) | (_, PointsToValue::Unknown) => PointsToValue::Unknown,
            (PointsToValue::Locations(a), PointsToValue::Locations(b)) => {
                PointsToValue::Locations(a.join(b))
            }
        }
    }
}

impl fmt::Display for PointsToValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointsToValue::Undefined => write!(f, "undefined"),
            PointsToValue::Unknown => write!(f, "unknown"),
            PointsToValue::Locations(set) => write!(f, "{set}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(op: u32) -> AbstractLocation {
        AbstractLocation::Alloc(OpId::new(op))
    }

    #[test]
    fn test_definite_survives_agreeing_join() {
        let a = PointsToValue::definite(alloc(3));
        let joined = a.join(&a.clone());
        assert!(joined.must_point_to(alloc(3)));
    }

    #[test]
    fn test_disagreeing_join_demotes_to_maybe() {
        let a = PointsToValue::definite(alloc(1));
        let b = PointsToValue::definite(alloc(2));
        let joined = a.join(&b);

        let set = joined.locations().unwrap();
        assert_eq!(set.certainty(alloc(1)), Some(Certainty::Maybe));
        assert_eq!(set.certainty(alloc(2)), Some(Certainty::Maybe));
        assert!(!joined.must_point_to(alloc(1)));
        assert!(joined.may_point_to(alloc(1)));
    }

    #[test]
    fn test_one_sided_location_is_maybe() {
        let a = PointsToValue::Locations(LocationSet::definite(alloc(1)));
        let b = PointsToValue::Locations(LocationSet::maybe_of([alloc(1), alloc(2)]));
        let joined = a.join(&b);

        let set = joined.locations().unwrap();
        // Definite on one side, maybe on the other: demoted.
        assert_eq!(set.certainty(alloc(1)), Some(Certainty::Maybe));
        assert_eq!(set.certainty(alloc(2)), Some(Certainty::Maybe));
    }

    #[test]
    fn test_undefined_is_join_identity() {
        let a = PointsToValue::definite(alloc(5));
        assert_eq!(a.join(&PointsToValue::Undefined), a);
        assert_eq!(PointsToValue::Undefined.join(&a), a);
    }

    #[test]
    fn test_unknown_absorbs() {
        let a = PointsToValue::definite(alloc(5));
        assert!(a.join(&PointsToValue::Unknown).is_unknown());
    }

    #[test]
    fn test_null_tracking() {
        let null = PointsToValue::definite(AbstractLocation::Null);
        assert!(null.must_be_null());
        assert!(null.may_be_null());

        let mixed = null.join(&PointsToValue::definite(alloc(1)));
        assert!(!mixed.must_be_null());
        assert!(mixed.may_be_null());

        let obj = PointsToValue::definite(alloc(1));
        assert!(!obj.may_be_null());
    }

    #[test]
    fn test_display_marks_maybe_with_question() {
        let set = LocationSet::definite(alloc(2)).join(&LocationSet::definite(alloc(7)));
        assert_eq!(format!("{set}"), "{alloc@op2?, alloc@op7?}");
        assert_eq!(format!("{}", LocationSet::definite(alloc(2))), "{alloc@op2}");
    }
}
