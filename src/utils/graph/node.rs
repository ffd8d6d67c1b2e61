//! Node identifier implementation for directed graphs.
//!
//! This module provides the [`NodeId`] type, a strongly-typed identifier for nodes
//! within a directed graph. The newtype wrapper prevents accidental confusion
//! between node indices and other integer values such as variable or function ids.

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// `NodeId` wraps a `usize` index, providing type safety to prevent
/// accidental mixing of node indices with other integer values. Node IDs are
/// assigned sequentially starting from 0 when nodes are added to a graph, so
/// they double as dense indices for per-node analysis state (block in/out
/// states, visited bitsets, dominator arrays).
///
/// # Usage
///
/// Node IDs are created by [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node)
/// and should not typically be constructed manually. They are used to:
///
/// - Reference basic blocks in a control-flow graph
/// - Reference functions in a call graph
/// - Index per-node analysis results
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let entry: NodeId = graph.add_node("entry");
/// let exit: NodeId = graph.add_node("exit");
///
/// assert_ne!(entry, exit);
/// ```
///
/// # Thread Safety
///
/// `NodeId` is [`Copy`], [`Send`], and [`Sync`], enabling efficient passing between
/// threads and use in concurrent data structures.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// This constructor is primarily intended for internal use and testing.
    /// Normal usage should obtain `NodeId` values from
    /// [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node).
    ///
    /// # Arguments
    ///
    /// * `index` - The raw node index (0-based)
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    ///
    /// The index is a 0-based position that can be used to index into vectors
    /// that store per-node data, such as block entry states or visit counters.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    /// Converts a raw `usize` index into a `NodeId`.
    ///
    /// Provided for convenience; the caller is responsible for ensuring the
    /// index corresponds to an actual node in the graph at hand.
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_node_id_new() {
        let node = NodeId::new(42);
        assert_eq!(node.index(), 42);
    }

    #[test]
    fn test_node_id_equality() {
        let node1 = NodeId::new(5);
        let node2 = NodeId::new(5);
        let node3 = NodeId::new(10);

        assert_eq!(node1, node2);
        assert_ne!(node1, node3);
    }

    #[test]
    fn test_node_id_ordering() {
        let node1 = NodeId::new(1);
        let node2 = NodeId::new(2);
        let node3 = NodeId::new(3);

        assert!(node1 < node2);
        assert!(node2 < node3);

        let mut nodes = vec![node3, node1, node2];
        nodes.sort();
        assert_eq!(nodes, vec![node1, node2, node3]);
    }

    #[test]
    fn test_node_id_hash() {
        let mut set: HashSet<NodeId> = HashSet::new();
        set.insert(NodeId::new(1));
        set.insert(NodeId::new(2));
        set.insert(NodeId::new(1));

        assert_eq!(set.len(), 2);
        assert!(set.contains(&NodeId::new(1)));
        assert!(set.contains(&NodeId::new(2)));
    }

    #[test]
    fn test_node_id_as_map_key() {
        let mut map: HashMap<NodeId, &str> = HashMap::new();
        map.insert(NodeId::new(1), "entry");
        map.insert(NodeId::new(2), "exit");

        assert_eq!(map.get(&NodeId::new(1)), Some(&"entry"));
        assert_eq!(map.get(&NodeId::new(3)), None);
    }

    #[test]
    fn test_node_id_conversions() {
        let node: NodeId = 123usize.into();
        assert_eq!(node.index(), 123);

        let value: usize = NodeId::new(789).into();
        assert_eq!(value, 789);
    }

    #[test]
    fn test_node_id_formatting() {
        let node = NodeId::new(42);
        assert_eq!(format!("{node:?}"), "NodeId(42)");
        assert_eq!(format!("{node}"), "n42");
    }

    #[test]
    fn test_node_id_array_indexing() {
        let data = vec!["zero", "one", "two", "three"];
        let node = NodeId::new(2);

        assert_eq!(data[node.index()], "two");
    }
}
