//! Control flow graph implementation.
//!
//! This module provides the main [`Cfg`] structure that wraps lowered basic
//! blocks with proper graph semantics and provides access to dominator trees,
//! natural loops, and deterministic traversal orders.

use std::{collections::HashSet, fmt::Write, sync::OnceLock};

use crate::{
    analysis::cfg::{builder, BasicBlock, EdgeKind},
    ir::{FunctionId, Module, VarId, VarInfo},
    utils::{
        escape_dot,
        graph::{reverse_postorder, DirectedGraph, DominatorTree, NodeId},
    },
    Result,
};

/// Information about a natural loop in the control flow graph.
///
/// A natural loop is a strongly connected region with a single entry point
/// (the header). Back edges are edges from within the loop to the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLoop {
    /// The header block of the loop (single entry point).
    pub header: NodeId,
    /// All blocks that are part of the loop body (including the header).
    pub body: HashSet<NodeId>,
    /// Back edges into the header (source nodes within the loop).
    pub back_edges: Vec<NodeId>,
    /// Depth of this loop in the loop nest (0 = outermost).
    pub depth: usize,
}

impl NaturalLoop {
    fn new(header: NodeId) -> Self {
        let mut body = HashSet::new();
        body.insert(header);
        Self {
            header,
            body,
            back_edges: Vec::new(),
            depth: 0,
        }
    }

    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.body.contains(&node)
    }

    /// Returns the number of blocks in the loop body, including the header.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// A control flow graph for one function.
///
/// Built by lowering the function's statement tree; see [`Cfg::build`]. The
/// graph has exactly one entry block and at least one exit block. Short
/// circuit operators are lowered into branch diamonds, `try` regions get
/// [`EdgeKind::Exception`] edges to their handlers, and `finally` bodies
/// appear once with [`EdgeKind::Finally`] continuation edges.
///
/// # Lazy Computation
///
/// Expensive analyses are computed lazily and cached:
///
/// - [`reverse_postorder`](Self::reverse_postorder) - The solver's iteration
///   order
/// - [`dominators`](Self::dominators) - Dominator tree
/// - [`loops`](Self::loops) - Natural loop detection
///
/// # Thread Safety
///
/// `Cfg` is [`Send`] and [`Sync`]. Lazy-initialized fields use [`OnceLock`]
/// for thread-safe initialization, so one `Cfg` can back several concurrent
/// analyses of the same function.
#[derive(Debug)]
pub struct Cfg {
    /// The function this graph was lowered from.
    function: FunctionId,
    /// The underlying directed graph structure.
    graph: DirectedGraph<BasicBlock, EdgeKind>,
    /// The entry block.
    entry: NodeId,
    /// Exit blocks: returns, and throws with no enclosing handler.
    exits: Vec<NodeId>,
    /// Variable table: the function's declared variables followed by the
    /// temporaries lowering introduced.
    vars: Vec<VarInfo>,
    /// Lazily computed reverse postorder.
    rpo: OnceLock<Vec<NodeId>>,
    /// Lazily computed dominator tree.
    dominators: OnceLock<DominatorTree>,
    /// Lazily computed loop information.
    loops: OnceLock<Vec<NaturalLoop>>,
}

impl Cfg {
    /// Lowers a function into its control flow graph.
    ///
    /// Lowering flattens nested expressions into temporaries in evaluation
    /// order, turns `if`/`while`/short-circuit operators into branch
    /// structure, and wires exception and finally edges for `try` regions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`](crate::Error::UnknownFunction) if
    /// the module has no such function, [`Error::InvalidIr`](crate::Error::InvalidIr)
    /// if the body references unregistered variables, fields, or callees, and
    /// [`Error::RecursionLimit`](crate::Error::RecursionLimit) if the body
    /// nests deeper than the lowering guard allows. Callers are expected to
    /// treat any of these as "skip this function".
    pub fn build(module: &Module, function: FunctionId) -> Result<Self> {
        builder::lower(module, function)
    }

    /// Assembles a CFG from lowered parts. Used by the lowering pass.
    pub(crate) fn from_parts(
        function: FunctionId,
        graph: DirectedGraph<BasicBlock, EdgeKind>,
        entry: NodeId,
        exits: Vec<NodeId>,
        vars: Vec<VarInfo>,
    ) -> Self {
        Self {
            function,
            graph,
            entry,
            exits,
            vars,
            rpo: OnceLock::new(),
            dominators: OnceLock::new(),
            loops: OnceLock::new(),
        }
    }

    /// Returns the function this graph belongs to.
    #[must_use]
    pub const fn function(&self) -> FunctionId {
        self.function
    }

    /// Returns the entry block ID. Always the first block.
    #[must_use]
    pub const fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the exit block IDs.
    ///
    /// Exits are blocks ending in a return, plus blocks ending in a throw
    /// with no enclosing handler. Every well-formed graph has at least one.
    #[must_use]
    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Returns the number of blocks in the CFG.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns a reference to the basic block at the given node ID.
    #[must_use]
    pub fn block(&self, node: NodeId) -> Option<&BasicBlock> {
        self.graph.node(node)
    }

    /// Returns the number of variable slots, including lowering temporaries.
    ///
    /// Dense per-variable tables (dataflow states) should be sized by this,
    /// not by the function's declared variable count.
    #[must_use]
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Returns metadata for a variable slot.
    #[must_use]
    pub fn var_info(&self, var: VarId) -> Option<&VarInfo> {
        self.vars.get(var.index())
    }

    /// Returns an iterator over all node IDs in the graph.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_ids()
    }

    /// Returns the successor block IDs for a given block.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.successors(node)
    }

    /// Returns the predecessor block IDs for a given block.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.predecessors(node)
    }

    /// Returns the outgoing edges of a block as `(target, kind)` pairs.
    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = (NodeId, EdgeKind)> + '_ {
        self.graph
            .outgoing_edges(node)
            .map(|edge| (edge.target, edge.data))
    }

    /// Returns blocks in reverse postorder, computed once and cached.
    ///
    /// Reverse postorder visits predecessors before successors in acyclic
    /// regions, which is what the forward fixpoint solver iterates in.
    /// Unreachable blocks are not included.
    #[must_use]
    pub fn reverse_postorder(&self) -> &[NodeId] {
        self.rpo
            .get_or_init(|| reverse_postorder(&self.graph, self.entry))
    }

    /// Returns the dominator tree for this CFG, computed once and cached.
    #[must_use]
    pub fn dominators(&self) -> &DominatorTree {
        self.dominators
            .get_or_init(|| DominatorTree::compute(&self.graph, self.entry))
    }

    /// Checks if a block dominates another block.
    ///
    /// Block A dominates block B if every path from the entry to B must go
    /// through A.
    #[must_use]
    pub fn dominates(&self, dominator: NodeId, dominated: NodeId) -> bool {
        self.dominators().dominates(dominator, dominated)
    }

    /// Returns the immediate dominator of a block, or `None` for the entry
    /// and unreachable blocks.
    #[must_use]
    pub fn idom(&self, node: NodeId) -> Option<NodeId> {
        self.dominators().immediate_dominator(node)
    }

    /// Returns the natural loops detected in this CFG.
    ///
    /// Natural loops are identified from back edges: an edge `n -> h` where
    /// `h` dominates `n`. The loop body is every block that reaches the back
    /// edge source without passing through the header. Computed lazily on
    /// first access and cached, sorted by header for deterministic order.
    #[must_use]
    pub fn loops(&self) -> &[NaturalLoop] {
        self.loops.get_or_init(|| self.detect_loops())
    }

    /// Returns true if this CFG contains any loops.
    #[must_use]
    pub fn has_loops(&self) -> bool {
        !self.loops().is_empty()
    }

    /// Returns true if the block is the header of some natural loop.
    ///
    /// The solver widens its revisit budget accounting at loop headers, so
    /// this is on the hot path; loop detection has already been cached by
    /// the first call.
    #[must_use]
    pub fn is_loop_header(&self, node: NodeId) -> bool {
        self.loops().iter().any(|l| l.header == node)
    }

    fn detect_loops(&self) -> Vec<NaturalLoop> {
        let dominators = self.dominators();
        let mut loops: Vec<NaturalLoop> = Vec::new();

        // Find all back edges: edge (n -> h) where h dominates n.
        for node in self.graph.node_ids() {
            for succ in self.graph.successors(node) {
                if dominators.dominates(succ, node) {
                    let header = succ;
                    if let Some(existing) = loops.iter_mut().find(|l| l.header == header) {
                        existing.back_edges.push(node);
                        self.expand_loop_body(existing, node);
                    } else {
                        let mut natural_loop = NaturalLoop::new(header);
                        natural_loop.back_edges.push(node);
                        self.expand_loop_body(&mut natural_loop, node);
                        loops.push(natural_loop);
                    }
                }
            }
        }

        Self::compute_loop_depths(&mut loops);
        loops.sort_by_key(|l| l.header.index());
        loops
    }

    /// Expands the loop body to all nodes that can reach the back edge source
    /// without going through the header.
    fn expand_loop_body(&self, natural_loop: &mut NaturalLoop, back_edge_source: NodeId) {
        if natural_loop.body.contains(&back_edge_source) {
            return;
        }

        let mut worklist = vec![back_edge_source];
        while let Some(node) = worklist.pop() {
            if natural_loop.body.insert(node) {
                for pred in self.graph.predecessors(node) {
                    if pred != natural_loop.header && !natural_loop.body.contains(&pred) {
                        worklist.push(pred);
                    }
                }
            }
        }
    }

    /// A loop is nested inside another when its header lies in the other's
    /// body; depth counts the enclosing loops.
    fn compute_loop_depths(loops: &mut [NaturalLoop]) {
        for i in 0..loops.len() {
            let mut depth = 0;
            for j in 0..loops.len() {
                if i != j && loops[j].body.contains(&loops[i].header) {
                    depth += 1;
                }
            }
            loops[i].depth = depth;
        }
    }

    /// Generates a DOT format representation of this control flow graph.
    ///
    /// The output renders with Graphviz. The entry block is highlighted in
    /// green, exit blocks in red, and edges are labeled by kind.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for node in self.graph.node_ids() {
            let Some(block) = self.block(node) else {
                continue;
            };
            let is_entry = node == self.entry;
            let is_exit = self.exits.contains(&node);

            let mut label = format!("{node}");
            if is_entry {
                label.push_str(" (entry)");
            }
            if is_exit {
                label.push_str(" (exit)");
            }
            label.push_str("\\l");
            for instr in block.instrs() {
                let _ = write!(label, "{}\\l", escape_dot(&instr.to_string()));
            }
            let _ = write!(label, "{}\\l", escape_dot(&block.terminator().to_string()));

            let style = if is_entry {
                ", style=filled, fillcolor=lightgreen"
            } else if is_exit {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };

            let _ = writeln!(dot, "    {node} [label=\"{label}\"{style}];");
        }

        dot.push('\n');

        for node in self.graph.node_ids() {
            for (target, kind) in self.outgoing_edges(node) {
                let (edge_label, color) = match kind {
                    EdgeKind::Normal => ("", "black"),
                    EdgeKind::ConditionalTrue => ("true", "green"),
                    EdgeKind::ConditionalFalse => ("false", "red"),
                    EdgeKind::Exception => ("exception", "purple"),
                    EdgeKind::Finally => ("finally", "blue"),
                };
                let _ = writeln!(dot, "    {node} -> {target} [label=\"{edge_label}\", color={color}];");
            }
        }

        dot.push_str("}\n");
        dot
    }
}
