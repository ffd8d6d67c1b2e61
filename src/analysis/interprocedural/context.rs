//! Call-site decisions and the recursion guard.

use crate::{
    ir::{Callee, FunctionId},
    utils::BitSet,
};

/// How deep an inlined analysis chain may grow before falling back to
/// conservative summaries.
pub const DEFAULT_MAX_INLINE_DEPTH: usize = 3;

/// Why a call site fell back to the conservative summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryReason {
    /// The callee is an external symbol with no body in the module.
    External,
    /// The inline chain reached the configured depth bound.
    DepthLimit,
    /// The callee is already being analyzed further up the stack.
    Recursive,
}

/// What to do with a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    /// Analyze the callee's body and splice its effects in.
    Inline(FunctionId),
    /// Apply the worst-case summary.
    Summarize(SummaryReason),
}

/// The analysis stack of one interprocedural chain.
///
/// A context belongs to the analysis of one root function and is never
/// shared across threads. Descending into a callee clones the context via
/// [`child`](Self::child), so unwinding is automatic: when the callee's
/// run finishes, its context is dropped and the caller's is untouched.
///
/// The in-progress set is an index bitset over function ids rather than a
/// stack that has to be searched, so the recursion check is one bit test.
#[derive(Debug, Clone)]
pub struct InterproceduralContext {
    in_progress: BitSet,
    depth: usize,
    max_depth: usize,
}

impl InterproceduralContext {
    /// Creates the context for analyzing `root`.
    #[must_use]
    pub fn root(root: FunctionId, function_count: usize, max_depth: usize) -> Self {
        let mut in_progress = BitSet::new(function_count);
        in_progress.insert(root.index());
        Self {
            in_progress,
            depth: 0,
            max_depth,
        }
    }

    /// Decides what to do with a call to `callee` from the current depth.
    #[must_use]
    pub fn decide(&self, callee: Callee) -> CallDecision {
        match callee {
            Callee::External(_) => CallDecision::Summarize(SummaryReason::External),
            Callee::Function(id) => {
                if self.in_progress.contains(id.index()) {
                    CallDecision::Summarize(SummaryReason::Recursive)
                } else if self.depth >= self.max_depth {
                    CallDecision::Summarize(SummaryReason::DepthLimit)
                } else {
                    CallDecision::Inline(id)
                }
            }
        }
    }

    /// The context for analyzing `callee` one level deeper.
    #[must_use]
    pub fn child(&self, callee: FunctionId) -> Self {
        let mut child = self.clone();
        child.in_progress.insert(callee.index());
        child.depth += 1;
        child
    }

    /// Current depth of the inline chain; the root function is depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}
