//! Interprocedural analysis plumbing.
//!
//! The rule analyses are written as intraprocedural transfer functions;
//! this module supplies everything they need to see across call sites
//! without ever looping or blowing the stack:
//!
//! - [`InterproceduralContext`] - the per-run analysis stack with a depth
//!   bound and an index-bitset recursion guard
//! - [`CallDecision`] - inline the callee or fall back to its worst case,
//!   with [`SummaryReason`] saying why
//! - [`SummaryCache`] - the session-wide concurrent cache of computed
//!   callee summaries
//!
//! # Inlining Model
//!
//! A callee with a body in the module is summarized once, with its
//! parameters treated as symbolic inputs. Call sites then substitute the
//! actual argument values into the summary instead of re-analyzing the
//! callee per call. The context bounds how deep summary computation may
//! chain and cuts recursion over to conservative summaries, so every
//! chain terminates.
//!
//! The summary types themselves are owned by the analyses that define
//! their semantics; this module only decides and caches.

mod cache;
mod context;

pub use cache::SummaryCache;
pub use context::{
    CallDecision, InterproceduralContext, SummaryReason, DEFAULT_MAX_INLINE_DEPTH,
};
