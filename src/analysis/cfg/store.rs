//! Shared, lazily populated CFG storage.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    analysis::cfg::Cfg,
    ir::{FunctionId, Module},
    Error,
};

/// Concurrent map from function to its lowered CFG.
///
/// One store exists per session and is shared by every worker thread, so a
/// callee inlined from ten call sites is lowered once. Lowering failures are
/// cached too: the first failure records the error, later lookups return the
/// same error without retrying, and the session reports the function as
/// skipped exactly once.
///
/// Like [`SummaryCache`](crate::analysis::interprocedural::SummaryCache),
/// lookup and insert are separate steps so lowering runs outside any map
/// lock. Concurrent builders of the same function produce identical CFGs;
/// the last insert wins and nothing observable changes.
#[derive(Debug, Default)]
pub struct CfgStore {
    map: DashMap<FunctionId, Result<Arc<Cfg>, Arc<Error>>>,
}

impl CfgStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Returns the CFG of `function`, lowering it on first access.
    ///
    /// # Errors
    ///
    /// Returns the lowering error if the function's body is malformed or the
    /// id is unknown; the same error is returned for every later lookup.
    pub fn get_or_build(
        &self,
        module: &Module,
        function: FunctionId,
    ) -> Result<Arc<Cfg>, Arc<Error>> {
        if let Some(entry) = self.map.get(&function) {
            return entry.value().clone();
        }

        let built = Cfg::build(module, function)
            .map(Arc::new)
            .map_err(Arc::new);
        self.map.insert(function, built.clone());
        built
    }

    /// Number of functions with a recorded outcome (built or failed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been lowered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
