//! Control flow edge classification.
//!
//! Every edge in a [`Cfg`](crate::analysis::Cfg) carries an [`EdgeKind`]
//! describing why control can move from its source block to its target.
//! Analyses rarely need to distinguish the kinds (the fixpoint solver joins
//! over all incoming edges), but diagnostics, DOT output, and tests do.

/// The kind of control flow represented by an edge.
///
/// # Examples
///
/// ```rust
/// use flowscope::analysis::cfg::EdgeKind;
///
/// assert!(EdgeKind::ConditionalTrue.is_conditional());
/// assert!(EdgeKind::Exception.is_exceptional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Unconditional control flow.
    ///
    /// Fall-through from a block ending in a jump, the entry into a loop
    /// header, or normal completion into a `finally` body.
    Normal,

    /// The "true" branch of a conditional.
    ///
    /// Taken when the branch condition evaluates to true. Short-circuit
    /// operators (`&&`, `||`, `??`) lower into diamonds built from these
    /// edges, so evaluation order is visible in the graph.
    ConditionalTrue,

    /// The "false" branch of a conditional.
    ConditionalFalse,

    /// Edge from a protected block to its innermost exception handler.
    ///
    /// Each block inside a `try` region has exactly one batch of these,
    /// pointing at the handler entries of the innermost enclosing `try`.
    /// Blocks covered by an inner handler do not also get edges to outer
    /// handlers; propagation is modeled through the handler's own blocks.
    Exception,

    /// Continuation edge out of a `finally` body.
    ///
    /// A `finally` body is lowered once and its terminal block fans out to
    /// every continuation that can follow it: the statement after the `try`,
    /// a pending routed `return`, or an outer `finally`.
    Finally,
}

impl EdgeKind {
    /// Returns `true` for [`ConditionalTrue`](Self::ConditionalTrue) and
    /// [`ConditionalFalse`](Self::ConditionalFalse).
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// Returns `true` for [`Exception`](Self::Exception) and
    /// [`Finally`](Self::Finally).
    #[must_use]
    pub const fn is_exceptional(&self) -> bool {
        matches!(self, Self::Exception | Self::Finally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_is_conditional() {
        assert!(!EdgeKind::Normal.is_conditional());
        assert!(EdgeKind::ConditionalTrue.is_conditional());
        assert!(EdgeKind::ConditionalFalse.is_conditional());
        assert!(!EdgeKind::Exception.is_conditional());
        assert!(!EdgeKind::Finally.is_conditional());
    }

    #[test]
    fn test_edge_kind_is_exceptional() {
        assert!(!EdgeKind::Normal.is_exceptional());
        assert!(!EdgeKind::ConditionalTrue.is_exceptional());
        assert!(!EdgeKind::ConditionalFalse.is_exceptional());
        assert!(EdgeKind::Exception.is_exceptional());
        assert!(EdgeKind::Finally.is_exceptional());
    }
}
