//! Strongly connected component computation.
//!
//! The call graph uses SCCs to recognize recursion: any component with more
//! than one node, or a single node with a self edge, is a recursive group
//! that the interprocedural driver must summarize instead of inlining
//! without bound.
//!
//! The implementation is Tarjan's algorithm, driven by an explicit frame
//! stack rather than recursion so call graphs of arbitrary depth cannot
//! overflow the stack.

use crate::utils::{
    graph::{DirectedGraph, NodeId},
    BitSet,
};

/// Computes the strongly connected components of `graph`.
///
/// Components are emitted in Tarjan completion order, which is a reverse
/// topological order of the condensation: a component appears before every
/// component that has an edge into it. For a call graph (edges from caller to
/// callee) this means callees come first, the natural bottom-up summary
/// order. Nodes within a component are sorted by id for determinism.
#[must_use]
pub fn strongly_connected_components<N, E>(graph: &DirectedGraph<N, E>) -> Vec<Vec<NodeId>> {
    let count = graph.node_count();
    let mut components = Vec::new();
    if count == 0 {
        return components;
    }

    const UNVISITED: u32 = u32::MAX;
    let mut index_of = vec![UNVISITED; count];
    let mut lowlink = vec![0u32; count];
    let mut on_stack = BitSet::new(count);
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index = 0u32;

    // (node, successors, next successor position)
    let mut frames: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();

    for start in graph.node_ids() {
        if index_of[start.index()] != UNVISITED {
            continue;
        }

        index_of[start.index()] = next_index;
        lowlink[start.index()] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack.insert(start.index());
        frames.push((start, graph.successors(start).collect(), 0));

        while !frames.is_empty() {
            let last = frames.len() - 1;
            let (node, next_succ) = {
                let frame = &mut frames[last];
                if frame.2 < frame.1.len() {
                    let succ = frame.1[frame.2];
                    frame.2 += 1;
                    (frame.0, Some(succ))
                } else {
                    (frame.0, None)
                }
            };

            match next_succ {
                Some(succ) if index_of[succ.index()] == UNVISITED => {
                    index_of[succ.index()] = next_index;
                    lowlink[succ.index()] = next_index;
                    next_index += 1;
                    stack.push(succ);
                    on_stack.insert(succ.index());
                    frames.push((succ, graph.successors(succ).collect(), 0));
                }
                Some(succ) if on_stack.contains(succ.index()) => {
                    let ni = node.index();
                    lowlink[ni] = lowlink[ni].min(index_of[succ.index()]);
                }
                Some(_) => {}
                None => {
                    frames.pop();
                    let ni = node.index();
                    if lowlink[ni] == index_of[ni] {
                        let mut component = Vec::new();
                        while let Some(member) = stack.pop() {
                            on_stack.remove(member.index());
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }
                        component.sort();
                        components.push(component);
                    }
                    if let Some(parent) = frames.last() {
                        let pi = parent.0.index();
                        lowlink[pi] = lowlink[pi].min(lowlink[ni]);
                    }
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(components: &[Vec<NodeId>]) -> Vec<Vec<usize>> {
        components
            .iter()
            .map(|c| c.iter().map(|n| n.index()).collect())
            .collect()
    }

    #[test]
    fn test_acyclic_graph_singletons() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs.len(), 3);
        // Callee-first emission: c completes before b before a.
        assert_eq!(indices(&sccs), vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(b, a, ());
        graph.add_edge(b, c, ());

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs.len(), 2);
        assert!(sccs.contains(&vec![a, b]));
        assert!(sccs.contains(&vec![c]));
        // c is a callee of the cycle, so it completes first.
        assert_eq!(sccs[0], vec![c]);
    }

    #[test]
    fn test_self_loop_is_singleton_component() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        graph.add_edge(a, a, ());

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs, vec![vec![a]]);
    }

    #[test]
    fn test_disconnected_components() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let d = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(c, d, ());
        graph.add_edge(d, c, ());

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs.len(), 3);
        assert!(sccs.contains(&vec![a]));
        assert!(sccs.contains(&vec![b]));
        assert!(sccs.contains(&vec![c, d]));
    }

    #[test]
    fn test_nested_cycles_single_component() {
        // a -> b -> c -> a plus b -> c shortcut: one component of three.
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());
        graph.add_edge(c, a, ());
        graph.add_edge(b, a, ());

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs, vec![vec![a, b, c]]);
    }

    #[test]
    fn test_empty_graph() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        assert!(strongly_connected_components(&graph).is_empty());
    }
}
