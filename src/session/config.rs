//! Per-session analysis configuration.

use crate::analysis::{
    dataflow::DEFAULT_MAX_BLOCK_VISITS, interprocedural::DEFAULT_MAX_INLINE_DEPTH,
};

/// Tuning knobs for one analysis session.
///
/// A session owns exactly one configuration and passes it by reference into
/// every worker; there is no process-global state. The defaults are sized
/// for ordinary modules, so most embedders construct this with
/// [`AnalysisConfig::default`] and never touch it.
///
/// # Examples
///
/// ```rust
/// use flowscope::AnalysisConfig;
///
/// let config = AnalysisConfig {
///     max_inline_depth: 2,
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(config.max_inline_depth, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// How deep an interprocedural inline chain may grow before call sites
    /// fall back to conservative summaries.
    pub max_inline_depth: usize,
    /// How often the fixpoint solver may visit one basic block before the
    /// run is declared non-converging and degraded to unknown states.
    pub max_block_visits: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            max_block_visits: DEFAULT_MAX_BLOCK_VISITS,
        }
    }
}
