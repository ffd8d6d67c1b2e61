//! Call sites recorded during the body walk.

use strum::Display;

use crate::ir::{Callee, OpId};

/// How a call site invokes its target.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// An ordinary call expression.
    #[strum(serialize = "call")]
    Direct,
    /// A closure creation. The wrapped function may run whenever the
    /// closure is invoked, so the graph treats creation as a call edge.
    #[strum(serialize = "closure")]
    Closure,
    /// The implicit disposal call of a `using` region, reached on every
    /// path out of the body.
    #[strum(serialize = "dispose")]
    Dispose,
}

/// A single call in a function body.
///
/// Sites are recorded in execution order within their function, so walking
/// a node's site list replays the calls the way the body would make them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    op: OpId,
    callee: Callee,
    kind: CallKind,
}

impl CallSite {
    pub(crate) fn new(op: OpId, callee: Callee, kind: CallKind) -> Self {
        Self { op, callee, kind }
    }

    /// The operation the call originates from.
    #[must_use]
    pub fn op(&self) -> OpId {
        self.op
    }

    /// The call target.
    #[must_use]
    pub fn callee(&self) -> Callee {
        self.callee
    }

    /// How the target is invoked.
    #[must_use]
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Returns `true` if the target is a function defined in the module.
    ///
    /// External targets remain visible as call sites but contribute no
    /// graph edge; there is no node to point at.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        matches!(self.callee, Callee::Function(_))
    }
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.callee {
            Callee::Function(id) => write!(f, "{} {} -> {id}", self.kind, self.op),
            Callee::External(sym) => write!(f, "{} {} -> {sym}", self.kind, self.op),
        }
    }
}
