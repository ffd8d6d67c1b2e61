//! Generic directed graph infrastructure.
//!
//! This module provides the arena-based [`DirectedGraph`] container together
//! with the strongly-typed [`NodeId`] and [`EdgeId`] identifiers and the graph
//! algorithms the analysis layer is built on: depth-first traversal orders,
//! dominator trees, and strongly connected components.
//!
//! Control-flow graphs and call graphs are both thin wrappers around
//! [`DirectedGraph`]; the node and edge payload types carry the domain data
//! (basic blocks, edge kinds, function ids) while this module owns storage,
//! adjacency, and iteration order.
//!
//! # Design
//!
//! - Nodes and edges live in arenas (`Vec`s) and are referenced by dense,
//!   sequentially assigned ids, so per-node analysis state can be stored in
//!   plain vectors indexed by [`NodeId::index`].
//! - Adjacency is stored per node as insertion-ordered edge id lists, which
//!   keeps successor and predecessor iteration deterministic.
//! - The structure is append-only: once added, nodes and edges are never
//!   removed. Analyses depend on ids staying stable.

mod dominators;
mod edge;
mod node;
mod scc;
mod traversal;

pub use dominators::DominatorTree;
pub use edge::EdgeId;
pub use node::NodeId;
pub use scc::strongly_connected_components;
pub use traversal::{postorder, reverse_postorder};

/// A directed edge between two nodes, carrying a payload.
///
/// Edges are stored in the graph's edge arena; [`DirectedGraph::outgoing_edges`]
/// yields references to them so callers can inspect the target and payload
/// (for example, a control-flow edge kind) together.
#[derive(Debug, Clone)]
pub struct Edge<E> {
    /// The node this edge originates from.
    pub source: NodeId,
    /// The node this edge points to.
    pub target: NodeId,
    /// The edge payload.
    pub data: E,
}

#[derive(Debug, Clone)]
struct NodeEntry<N> {
    data: N,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

/// An arena-based directed graph with typed node and edge payloads.
///
/// `DirectedGraph` is the shared substrate for the control-flow graph and the
/// call graph. It is deliberately minimal: stable dense ids, deterministic
/// adjacency iteration, and no removal.
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::utils::graph::DirectedGraph;
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let entry = graph.add_node("entry");
/// let body = graph.add_node("body");
/// let exit = graph.add_node("exit");
///
/// graph.add_edge(entry, body, ());
/// graph.add_edge(body, exit, ());
///
/// assert_eq!(graph.node_count(), 3);
/// assert_eq!(graph.successors(entry).count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DirectedGraph<N, E> {
    nodes: Vec<NodeEntry<N>>,
    edges: Vec<Edge<E>>,
}

impl<N, E> DirectedGraph<N, E> {
    /// Creates an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Creates an empty graph with preallocated capacity for nodes and edges.
    #[must_use]
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
        }
    }

    /// Adds a node with the given payload and returns its id.
    ///
    /// Ids are assigned sequentially starting from 0.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeEntry {
            data,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        id
    }

    /// Adds a directed edge from `source` to `target` and returns its id.
    ///
    /// Parallel edges are allowed; the control-flow graph uses them for
    /// distinct edge kinds between the same pair of blocks.
    ///
    /// # Panics
    ///
    /// Panics if `source` or `target` is not a node of this graph.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, data: E) -> EdgeId {
        assert!(source.index() < self.nodes.len(), "source out of bounds");
        assert!(target.index() < self.nodes.len(), "target out of bounds");

        let id = EdgeId::new(self.edges.len());
        self.edges.push(Edge {
            source,
            target,
            data,
        });
        self.nodes[source.index()].outgoing.push(id);
        self.nodes[target.index()].incoming.push(id);
        id
    }

    /// Returns a reference to the payload of `node`, if it exists.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index()).map(|entry| &entry.data)
    }

    /// Returns a mutable reference to the payload of `node`, if it exists.
    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut N> {
        self.nodes.get_mut(node.index()).map(|entry| &mut entry.data)
    }

    /// Returns a reference to the payload of `edge`, if it exists.
    #[must_use]
    pub fn edge(&self, edge: EdgeId) -> Option<&E> {
        self.edges.get(edge.index()).map(|e| &e.data)
    }

    /// Returns the `(source, target)` endpoints of `edge`, if it exists.
    #[must_use]
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges.get(edge.index()).map(|e| (e.source, e.target))
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::new)
    }

    /// Iterates over the successors of `node` in edge insertion order.
    ///
    /// A node that appears as the target of multiple parallel edges is yielded
    /// once per edge.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(|entry| entry.outgoing.iter())
            .map(|&eid| self.edges[eid.index()].target)
    }

    /// Iterates over the predecessors of `node` in edge insertion order.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(|entry| entry.incoming.iter())
            .map(|&eid| self.edges[eid.index()].source)
    }

    /// Iterates over the outgoing edges of `node` in insertion order.
    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge<E>> + '_ {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(|entry| entry.outgoing.iter())
            .map(|&eid| &self.edges[eid.index()])
    }
}

impl<N, E> Default for DirectedGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}
