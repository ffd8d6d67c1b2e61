//! Call graph construction and queries.
//!
//! The call graph is built once per module by walking every function body
//! with an explicit worklist and recording each call site in execution
//! order. Nodes are the module's functions; edges go to defined callees
//! only, one per call site, carrying the site's [`CallKind`]. Calls to
//! external symbols stay visible as sites on the caller node but add no
//! edge.
//!
//! Derived views (strongly connected components, the bottom-up traversal
//! order, entry points) are computed lazily and cached, the same pattern
//! the control flow graph uses for its dominator tree.

use std::{fmt::Write, sync::OnceLock};

use crate::{
    analysis::callgraph::{CallKind, CallSite},
    ir::{Callee, Expr, ExprKind, FunctionId, Module, OpId, Stmt, StmtKind, Target},
    utils::{
        escape_dot,
        graph::{strongly_connected_components, DirectedGraph, NodeId},
    },
};

/// One function node: its id plus every call site in its body.
#[derive(Debug, Clone)]
pub struct CallGraphNode {
    function: FunctionId,
    call_sites: Vec<CallSite>,
}

impl CallGraphNode {
    /// The function this node represents.
    #[must_use]
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// All call sites in the function body, in execution order.
    #[must_use]
    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }
}

/// The module-wide caller/callee graph.
///
/// Node ids mirror function ids, so per-function analysis state can be kept
/// in plain vectors and lookups are direct index math. The graph is built
/// eagerly; the SCC decomposition, bottom-up order, and entry point list are
/// computed on first use and cached.
#[derive(Debug)]
pub struct CallGraph {
    graph: DirectedGraph<CallGraphNode, CallKind>,
    sccs: OnceLock<Vec<Vec<NodeId>>>,
    bottom_up: OnceLock<Vec<FunctionId>>,
    entry_points: OnceLock<Vec<FunctionId>>,
}

impl CallGraph {
    /// Builds the call graph for `module`.
    ///
    /// Two passes: every function becomes a node, then each recorded call
    /// site whose target is a defined function becomes an edge. Parallel
    /// edges are kept, so a caller invoking the same callee twice has two
    /// edges to it.
    #[must_use]
    pub fn build(module: &Module) -> Self {
        let count = module.function_count();
        let mut graph: DirectedGraph<CallGraphNode, CallKind> =
            DirectedGraph::with_capacity(count, count * 2);
        let mut pending: Vec<(NodeId, FunctionId, CallKind)> = Vec::new();

        // Edges wait until all nodes exist; a site may target a function
        // declared later in the module.
        for function in module.functions() {
            let call_sites = collect_call_sites(function.body());
            let source = Self::node_of(function.id());
            for site in &call_sites {
                if let Callee::Function(callee) = site.callee() {
                    pending.push((source, callee, site.kind()));
                }
            }
            graph.add_node(CallGraphNode {
                function: function.id(),
                call_sites,
            });
        }

        for (source, callee, kind) in pending {
            graph.add_edge(source, Self::node_of(callee), kind);
        }

        Self {
            graph,
            sccs: OnceLock::new(),
            bottom_up: OnceLock::new(),
            entry_points: OnceLock::new(),
        }
    }

    fn node_of(function: FunctionId) -> NodeId {
        NodeId::new(function.index())
    }

    fn function_of(node: NodeId) -> FunctionId {
        FunctionId::new(node.index() as u32)
    }

    /// Returns the number of functions in the graph.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of call edges between defined functions.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the node for `function`, if it exists.
    #[must_use]
    pub fn node(&self, function: FunctionId) -> Option<&CallGraphNode> {
        self.graph.node(Self::node_of(function))
    }

    /// Iterates over all nodes in function id order.
    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> + '_ {
        self.graph.node_ids().filter_map(|id| self.graph.node(id))
    }

    /// Returns the call sites of `function`, in execution order.
    ///
    /// External targets are included; they carry no edge but the
    /// interprocedural drivers still want to see them.
    #[must_use]
    pub fn call_sites(&self, function: FunctionId) -> &[CallSite] {
        self.graph
            .node(Self::node_of(function))
            .map_or(&[], |node| node.call_sites.as_slice())
    }

    /// Iterates over the defined functions `function` calls, once per call
    /// site.
    pub fn callees(&self, function: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.graph
            .successors(Self::node_of(function))
            .map(Self::function_of)
    }

    /// Iterates over the functions that call `function`, once per call site.
    pub fn callers(&self, function: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.graph
            .predecessors(Self::node_of(function))
            .map(Self::function_of)
    }

    /// Returns the functions no defined function calls.
    ///
    /// These are the natural analysis roots: exported handlers, main, and
    /// anything reached only from outside the module.
    #[must_use]
    pub fn entry_points(&self) -> &[FunctionId] {
        self.entry_points.get_or_init(|| {
            self.graph
                .node_ids()
                .filter(|&id| self.graph.predecessors(id).next().is_none())
                .map(Self::function_of)
                .collect()
        })
    }

    /// Returns the functions that call no defined function.
    #[must_use]
    pub fn leaf_functions(&self) -> Vec<FunctionId> {
        self.graph
            .node_ids()
            .filter(|&id| self.graph.successors(id).next().is_none())
            .map(Self::function_of)
            .collect()
    }

    /// Returns the strongly connected components of the graph.
    ///
    /// Components are emitted callees first, with the nodes of each
    /// component sorted by id. A component with more than one node, or a
    /// single node with a self edge, is a recursive group.
    #[must_use]
    pub fn sccs(&self) -> &[Vec<NodeId>] {
        self.sccs
            .get_or_init(|| strongly_connected_components(&self.graph))
    }

    /// Returns all functions in bottom-up order: callees before callers.
    ///
    /// Within a recursive group the order is by function id. The order is
    /// deterministic for a given module, so the analysis session uses it to
    /// schedule functions with their callee summaries already warm.
    #[must_use]
    pub fn bottom_up_order(&self) -> &[FunctionId] {
        self.bottom_up.get_or_init(|| {
            self.sccs()
                .iter()
                .flatten()
                .map(|&node| Self::function_of(node))
                .collect()
        })
    }

    /// Returns `true` if `function` calls itself, directly or through a
    /// cycle of other functions.
    #[must_use]
    pub fn is_recursive(&self, function: FunctionId) -> bool {
        let node = Self::node_of(function);
        self.graph.successors(node).any(|succ| succ == node)
            || self
                .sccs()
                .iter()
                .any(|scc| scc.len() > 1 && scc.binary_search(&node).is_ok())
    }

    /// Returns `true` if any function in the module is recursive.
    #[must_use]
    pub fn has_recursion(&self) -> bool {
        self.sccs().iter().any(|scc| scc.len() > 1)
            || self
                .graph
                .node_ids()
                .any(|node| self.graph.successors(node).any(|succ| succ == node))
    }

    /// Returns all recursive functions, sorted and deduplicated.
    #[must_use]
    pub fn recursive_functions(&self) -> Vec<FunctionId> {
        let mut recursive: Vec<FunctionId> = self
            .graph
            .node_ids()
            .filter(|&node| self.graph.successors(node).any(|succ| succ == node))
            .map(Self::function_of)
            .collect();

        for scc in self.sccs() {
            if scc.len() > 1 {
                recursive.extend(scc.iter().map(|&node| Self::function_of(node)));
            }
        }

        recursive.sort_unstable();
        recursive.dedup();
        recursive
    }

    /// Returns a reference to the underlying directed graph for custom
    /// traversals.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<CallGraphNode, CallKind> {
        &self.graph
    }

    /// Returns aggregate metrics about the graph.
    #[must_use]
    pub fn stats(&self) -> CallGraphStats {
        let total_call_sites: usize = self.nodes().map(|n| n.call_sites().len()).sum();

        let external_call_sites = self
            .nodes()
            .flat_map(CallGraphNode::call_sites)
            .filter(|site| !site.is_defined())
            .count();

        let closure_sites = self
            .nodes()
            .flat_map(CallGraphNode::call_sites)
            .filter(|site| site.kind() == CallKind::Closure)
            .count();

        CallGraphStats {
            function_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            total_call_sites,
            external_call_sites,
            closure_sites,
            entry_points: self.entry_points().len(),
            leaf_functions: self.leaf_functions().len(),
            scc_count: self.sccs().len(),
            recursive_functions: self.recursive_functions().len(),
        }
    }

    /// Renders the graph in DOT format for Graphviz.
    ///
    /// Entry points are filled green, leaf functions blue. Closure and
    /// dispose edges are labeled; plain calls are not.
    #[must_use]
    pub fn to_dot(&self, module: &Module, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CallGraph {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        } else {
            dot.push_str("    label=\"Call Graph\";\n");
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n");
        dot.push_str("    rankdir=TB;\n\n");

        let entries = self.entry_points();

        for node_id in self.graph.node_ids() {
            let function = Self::function_of(node_id);
            let style = if entries.contains(&function) {
                ", style=filled, fillcolor=lightgreen"
            } else if self.graph.successors(node_id).next().is_none() {
                ", style=filled, fillcolor=lightblue"
            } else {
                ""
            };

            let name = module
                .function(function)
                .map_or_else(|| function.to_string(), |f| f.name().to_string());
            let _ = writeln!(
                dot,
                "    \"{function}\" [label=\"{}\"{style}];",
                escape_dot(&name),
            );
        }

        dot.push('\n');

        for node_id in self.graph.node_ids() {
            for edge in self.graph.outgoing_edges(node_id) {
                let source = Self::function_of(edge.source);
                let target = Self::function_of(edge.target);
                match edge.data {
                    CallKind::Direct => {
                        let _ = writeln!(dot, "    \"{source}\" -> \"{target}\";");
                    }
                    kind => {
                        let _ =
                            writeln!(dot, "    \"{source}\" -> \"{target}\" [label=\"{kind}\"];");
                    }
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

/// Statistics about a call graph.
#[derive(Debug, Clone, Default)]
pub struct CallGraphStats {
    /// Number of functions (nodes) in the graph.
    pub function_count: usize,
    /// Number of call edges between defined functions.
    pub edge_count: usize,
    /// Total number of call sites across all bodies.
    pub total_call_sites: usize,
    /// Number of call sites targeting external symbols.
    pub external_call_sites: usize,
    /// Number of closure creation sites.
    pub closure_sites: usize,
    /// Number of entry points (functions with no callers).
    pub entry_points: usize,
    /// Number of leaf functions (functions with no defined callees).
    pub leaf_functions: usize,
    /// Number of strongly connected components.
    pub scc_count: usize,
    /// Number of functions involved in direct or mutual recursion.
    pub recursive_functions: usize,
}

impl CallGraphStats {
    /// Returns the share of call sites whose target is defined in the
    /// module, as a percentage. Returns 100.0 if there are no call sites.
    ///
    /// A low rate means most calls take the conservative external summary,
    /// which caps how much precision interprocedural analysis can add.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn defined_rate(&self) -> f64 {
        if self.total_call_sites == 0 {
            100.0
        } else {
            let defined = self.total_call_sites - self.external_call_sites;
            (defined as f64 / self.total_call_sites as f64) * 100.0
        }
    }
}

/// One pending item of the body walk.
enum Work<'b> {
    Stmt(&'b Stmt),
    Expr(&'b Expr),
    /// A call recorded once the items pushed above it have drained.
    Site(OpId, Callee, CallKind),
}

fn push_stmts<'b>(work: &mut Vec<Work<'b>>, stmts: &'b [Stmt]) {
    for stmt in stmts.iter().rev() {
        work.push(Work::Stmt(stmt));
    }
}

/// Collects the call sites of one body, in execution order.
///
/// The walk is an explicit stack so deeply nested bodies cannot overflow
/// the call stack. Children are pushed in reverse evaluation order, which
/// makes pop order match execution order; `Site` markers are pushed where
/// the call itself fires: after its arguments, or after a `using` body for
/// the implicit dispose.
fn collect_call_sites(body: &[Stmt]) -> Vec<CallSite> {
    let mut sites = Vec::new();
    let mut work: Vec<Work<'_>> = Vec::new();
    push_stmts(&mut work, body);

    while let Some(item) = work.pop() {
        match item {
            Work::Site(op, callee, kind) => sites.push(CallSite::new(op, callee, kind)),
            Work::Stmt(stmt) => match &stmt.kind {
                StmtKind::Expr(expr) | StmtKind::Throw(expr) => work.push(Work::Expr(expr)),
                StmtKind::Assign { target, value } => {
                    // Target bases evaluate before the value.
                    work.push(Work::Expr(value));
                    match target {
                        Target::Var(_) => {}
                        Target::Field { base, .. } => work.push(Work::Expr(base)),
                        Target::Elem { base, index } => {
                            work.push(Work::Expr(index));
                            work.push(Work::Expr(base));
                        }
                    }
                }
                StmtKind::If {
                    condition,
                    then_body,
                    else_body,
                } => {
                    push_stmts(&mut work, else_body);
                    push_stmts(&mut work, then_body);
                    work.push(Work::Expr(condition));
                }
                StmtKind::While { condition, body } => {
                    push_stmts(&mut work, body);
                    work.push(Work::Expr(condition));
                }
                StmtKind::Return(value) => {
                    if let Some(expr) = value {
                        work.push(Work::Expr(expr));
                    }
                }
                StmtKind::Try {
                    body,
                    catches,
                    finally_body,
                } => {
                    if let Some(finally) = finally_body {
                        push_stmts(&mut work, finally);
                    }
                    for clause in catches.iter().rev() {
                        push_stmts(&mut work, &clause.body);
                    }
                    push_stmts(&mut work, body);
                }
                StmtKind::Using {
                    init,
                    dispose,
                    body,
                    ..
                } => {
                    work.push(Work::Site(stmt.id, *dispose, CallKind::Dispose));
                    push_stmts(&mut work, body);
                    work.push(Work::Expr(init));
                }
            },
            Work::Expr(expr) => match &expr.kind {
                ExprKind::Literal(_) | ExprKind::Local(_) => {}
                ExprKind::FieldLoad { base, .. } => work.push(Work::Expr(base)),
                ExprKind::ElemLoad { base, index } => {
                    work.push(Work::Expr(index));
                    work.push(Work::Expr(base));
                }
                ExprKind::New { args, .. } => {
                    for arg in args.iter().rev() {
                        work.push(Work::Expr(arg));
                    }
                }
                ExprKind::Call { callee, args } => {
                    work.push(Work::Site(expr.id, *callee, CallKind::Direct));
                    for arg in args.iter().rev() {
                        work.push(Work::Expr(&arg.expr));
                    }
                }
                ExprKind::Binary { lhs, rhs, .. }
                | ExprKind::And { lhs, rhs }
                | ExprKind::Or { lhs, rhs }
                | ExprKind::Coalesce { lhs, rhs } => {
                    work.push(Work::Expr(rhs));
                    work.push(Work::Expr(lhs));
                }
                ExprKind::Unary { operand, .. } => work.push(Work::Expr(operand)),
                ExprKind::Closure { function, .. } => {
                    sites.push(CallSite::new(
                        expr.id,
                        Callee::Function(*function),
                        CallKind::Closure,
                    ));
                }
            },
        }
    }

    sites
}
