//! Edge identifier implementation for directed graphs.
//!
//! This module provides the [`EdgeId`] type, a strongly-typed identifier for edges
//! within a directed graph, mirroring [`NodeId`](crate::utils::graph::NodeId) for
//! the edge arena.

use std::fmt;

/// A strongly-typed identifier for edges within a directed graph.
///
/// `EdgeId` wraps a `usize` index into the graph's edge arena. Edge IDs are
/// assigned sequentially starting from 0 when edges are added, so id order
/// reflects insertion order; control-flow graphs rely on this to keep edge
/// iteration deterministic.
///
/// # Usage
///
/// Edge IDs are created by [`DirectedGraph::add_edge`](crate::utils::graph::DirectedGraph::add_edge)
/// and should not typically be constructed manually. They are used to:
///
/// - Reference edges when querying edge data (e.g. a control-flow edge kind)
/// - Look up edge endpoints (source and target nodes)
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::utils::graph::{DirectedGraph, EdgeId};
///
/// let mut graph: DirectedGraph<&str, &str> = DirectedGraph::new();
/// let a = graph.add_node("A");
/// let b = graph.add_node("B");
/// let edge: EdgeId = graph.add_edge(a, b, "A->B");
///
/// assert_eq!(graph.edge(edge), Some(&"A->B"));
/// assert_eq!(graph.edge_endpoints(edge), Some((a, b)));
/// ```
///
/// # Thread Safety
///
/// `EdgeId` is [`Copy`], [`Send`], and [`Sync`], enabling efficient passing between
/// threads and use in concurrent data structures.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    /// Creates a new `EdgeId` from a raw index value.
    ///
    /// Primarily intended for internal use and testing; normal usage obtains
    /// `EdgeId` values from
    /// [`DirectedGraph::add_edge`](crate::utils::graph::DirectedGraph::add_edge).
    ///
    /// # Arguments
    ///
    /// * `index` - The raw edge index (0-based)
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// Returns the raw index value of this edge identifier.
    ///
    /// The index is a 0-based position that can be used to index into vectors
    /// that store per-edge data.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<usize> for EdgeId {
    /// Converts a raw `usize` index into an `EdgeId`.
    ///
    /// Provided for convenience; the caller is responsible for ensuring the
    /// index corresponds to an actual edge in the graph at hand.
    #[inline]
    fn from(index: usize) -> Self {
        EdgeId(index)
    }
}

impl From<EdgeId> for usize {
    #[inline]
    fn from(edge: EdgeId) -> Self {
        edge.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_edge_id_new() {
        let edge = EdgeId::new(17);
        assert_eq!(edge.index(), 17);
    }

    #[test]
    fn test_edge_id_equality() {
        assert_eq!(EdgeId::new(3), EdgeId::new(3));
        assert_ne!(EdgeId::new(3), EdgeId::new(4));
    }

    #[test]
    fn test_edge_id_ordering() {
        let mut edges = vec![EdgeId::new(2), EdgeId::new(0), EdgeId::new(1)];
        edges.sort();
        assert_eq!(edges, vec![EdgeId::new(0), EdgeId::new(1), EdgeId::new(2)]);
    }

    #[test]
    fn test_edge_id_hash() {
        let mut set: HashSet<EdgeId> = HashSet::new();
        set.insert(EdgeId::new(1));
        set.insert(EdgeId::new(1));
        set.insert(EdgeId::new(2));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_edge_id_conversions() {
        let edge: EdgeId = 55usize.into();
        assert_eq!(edge.index(), 55);

        let value: usize = EdgeId::new(8).into();
        assert_eq!(value, 8);
    }

    #[test]
    fn test_edge_id_formatting() {
        let edge = EdgeId::new(9);
        assert_eq!(format!("{edge:?}"), "EdgeId(9)");
        assert_eq!(format!("{edge}"), "e9");
    }
}
