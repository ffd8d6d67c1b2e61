//! The session-wide concurrent summary cache.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Concurrent map from a summary key to the computed summary.
///
/// One cache exists per rule per session and is shared by every worker
/// thread. The key is chosen by the analysis that owns the summary type:
/// taint summaries are symbolic in their parameters and key on the callee
/// alone, while property-state summaries depend on the values flowing in
/// and key on the callee plus an entry signature.
///
/// Lookups and inserts deliberately stay two separate steps: a summary is
/// computed outside any map lock because computing it can recurse into
/// further cache lookups. Two threads may therefore compute the same
/// summary concurrently; both arrive at the same value, so whichever
/// insert lands last changes nothing.
#[derive(Debug)]
pub struct SummaryCache<K: Eq + Hash, S> {
    map: DashMap<K, Arc<S>>,
}

impl<K: Eq + Hash, S> SummaryCache<K, S> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Returns the cached summary for `key`, if one was computed.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<S>> {
        self.map.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Stores the summary for `key` and returns the shared handle.
    pub fn insert(&self, key: K, summary: S) -> Arc<S> {
        let summary = Arc::new(summary);
        self.map.insert(key, Arc::clone(&summary));
        summary
    }

    /// Number of cached summaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K: Eq + Hash, S> Default for SummaryCache<K, S> {
    fn default() -> Self {
        Self::new()
    }
}
