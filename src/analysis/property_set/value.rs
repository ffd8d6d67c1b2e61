//! The three-valued property lattice.

use std::fmt;

use strum::Display;

/// The tracked state of one object property at one program point.
///
/// The lattice is deliberately not a chain:
///
/// ```text
///        MaybeFlagged
///         /        \
///     Flagged    Unknown
///                   |
///               Unflagged
/// ```
///
/// `Flagged` and `Unflagged` are definite, contradictory observations, so
/// their join is the honest `MaybeFlagged`. `Unknown` means nothing was
/// observed; since an object the analysis never saw configured is
/// indistinguishable from one left at its defaults, `Unknown` absorbs
/// `Unflagged` instead of degrading it. `Unknown` against `Flagged` still
/// degrades: some path definitely armed the hazard, some path is opaque.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyValue {
    /// The property is in its safe configuration on every known path.
    #[strum(serialize = "unflagged")]
    Unflagged,
    /// The property is in its hazardous configuration on every known path.
    #[strum(serialize = "flagged")]
    Flagged,
    /// No path reaching here observed the property being set.
    #[strum(serialize = "unknown")]
    Unknown,
    /// Paths disagree, or a definite observation met an opaque one.
    #[strum(serialize = "maybe-flagged")]
    MaybeFlagged,
}

impl PropertyValue {
    /// Least upper bound of two property states.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        use PropertyValue::{MaybeFlagged, Unflagged, Unknown};
        match (self, other) {
            (a, b) if a == b => a,
            (Unknown, Unflagged) | (Unflagged, Unknown) => Unknown,
            (MaybeFlagged, _) | (_, MaybeFlagged) => MaybeFlagged,
            // Flagged against Unflagged or Unknown: definitely armed on one
            // path, not provably armed on the other.
            _ => MaybeFlagged,
        }
    }

    /// Returns `true` for the top element.
    #[must_use]
    pub fn is_top(self) -> bool {
        self == PropertyValue::MaybeFlagged
    }
}

/// The property states of one tracked object, one slot per rule property.
///
/// Slot order is the order the rule declared its properties in; every
/// vector a rule's analysis produces has the same arity, so joins are
/// pointwise. Out-of-range reads answer `Unknown` rather than panicking,
/// which also covers mappers that returned too few values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyValues {
    slots: Vec<PropertyValue>,
}

impl PropertyValues {
    /// A vector of `arity` slots all holding `value`.
    #[must_use]
    pub fn uniform(arity: usize, value: PropertyValue) -> Self {
        Self {
            slots: vec![value; arity],
        }
    }

    /// The state of `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> PropertyValue {
        self.slots.get(slot).copied().unwrap_or(PropertyValue::Unknown)
    }

    /// Replaces the state of `slot`. Out-of-range slots are ignored.
    pub fn set(&mut self, slot: usize, value: PropertyValue) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = value;
        }
    }

    /// Joins `value` into `slot`. Out-of-range slots are ignored.
    pub fn join_slot(&mut self, slot: usize, value: PropertyValue) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = cell.join(value);
        }
    }

    /// The slots in declaration order.
    #[must_use]
    pub fn values(&self) -> &[PropertyValue] {
        &self.slots
    }

    /// Number of properties tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the rule tracks no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pointwise least upper bound.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        Self {
            slots: self
                .slots
                .iter()
                .zip(&other.slots)
                .map(|(&a, &b)| a.join(b))
                .collect(),
        }
    }

    /// Forces the vector to `arity` slots, padding with `Unknown`.
    ///
    /// Applied to constructor-mapper output so a mapper that miscounts
    /// degrades to ignorance instead of corrupting slot indices.
    #[must_use]
    pub(crate) fn with_arity(mut self, arity: usize) -> Self {
        self.slots.resize(arity, PropertyValue::Unknown);
        self
    }
}

impl From<Vec<PropertyValue>> for PropertyValues {
    fn from(slots: Vec<PropertyValue>) -> Self {
        Self { slots }
    }
}

impl fmt::Display for PropertyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}
