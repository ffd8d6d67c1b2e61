//! Depth-first traversal orders for directed graphs.
//!
//! The dataflow solver visits blocks in reverse postorder so that, in the
//! absence of back edges, every predecessor is processed before its
//! successors. Both traversals here are iterative with an explicit stack and
//! an index bitset for the visited set, so deeply nested control flow cannot
//! overflow the call stack.

use crate::utils::{
    graph::{DirectedGraph, NodeId},
    BitSet,
};

/// Computes the postorder of all nodes reachable from `entry`.
///
/// Successors are expanded in edge insertion order, which makes the result
/// deterministic for a given graph construction sequence. Unreachable nodes
/// do not appear in the output.
#[must_use]
pub fn postorder<N, E>(graph: &DirectedGraph<N, E>, entry: NodeId) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(graph.node_count());
    if graph.node(entry).is_none() {
        return order;
    }

    let mut visited = BitSet::new(graph.node_count());
    // (node, successors, next successor position)
    let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();

    visited.insert(entry.index());
    stack.push((entry, graph.successors(entry).collect(), 0));

    while let Some(frame) = stack.last_mut() {
        if frame.2 < frame.1.len() {
            let next = frame.1[frame.2];
            frame.2 += 1;
            if !visited.contains(next.index()) {
                visited.insert(next.index());
                stack.push((next, graph.successors(next).collect(), 0));
            }
        } else {
            order.push(frame.0);
            stack.pop();
        }
    }

    order
}

/// Computes the reverse postorder of all nodes reachable from `entry`.
///
/// This is the canonical iteration order for forward dataflow analyses: a
/// node appears before all of its successors except along back edges.
#[must_use]
pub fn reverse_postorder<N, E>(graph: &DirectedGraph<N, E>, entry: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, entry);
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_indices(order: &[NodeId]) -> Vec<usize> {
        order.iter().map(|n| n.index()).collect()
    }

    #[test]
    fn test_postorder_linear_chain() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());

        assert_eq!(node_indices(&postorder(&graph, a)), vec![2, 1, 0]);
        assert_eq!(node_indices(&reverse_postorder(&graph, a)), vec![0, 1, 2]);
    }

    #[test]
    fn test_reverse_postorder_diamond() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let d = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(a, c, ());
        graph.add_edge(b, d, ());
        graph.add_edge(c, d, ());

        let rpo = reverse_postorder(&graph, a);
        let pos = |n: NodeId| rpo.iter().position(|&x| x == n).unwrap();

        assert_eq!(rpo.len(), 4);
        assert_eq!(rpo[0], a);
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_traversal_with_cycle_terminates() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());
        graph.add_edge(c, b, ());

        let rpo = reverse_postorder(&graph, a);
        assert_eq!(rpo.len(), 3);
        assert_eq!(rpo[0], a);
    }

    #[test]
    fn test_unreachable_nodes_excluded() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let orphan = graph.add_node(());
        graph.add_edge(a, b, ());

        let order = postorder(&graph, a);
        assert_eq!(order.len(), 2);
        assert!(!order.contains(&orphan));
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        assert!(postorder(&graph, NodeId::new(0)).is_empty());
    }

    #[test]
    fn test_single_node_self_loop() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        graph.add_edge(a, a, ());

        assert_eq!(postorder(&graph, a), vec![a]);
    }
}
