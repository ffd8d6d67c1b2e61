//! Lowering from the structured statement tree to basic blocks.
//!
//! The lowering pass flattens a function body into the instruction form the
//! dataflow analyses consume:
//!
//! - Nested expressions evaluate left to right into fresh temporaries, so
//!   every intermediate value has a variable slot and instruction order is
//!   evaluation order.
//! - `&&`, `||`, and `??` become branch diamonds; the right operand's blocks
//!   are only reachable when the left operand did not decide the result.
//! - Every block inside a `try` region receives an [`EdgeKind::Exception`]
//!   edge to the handler entries of its innermost enclosing `try`. Handler
//!   blocks themselves are protected by the next region out.
//! - A `finally` body is lowered exactly once. Its terminal block ends in
//!   [`Terminator::EndFinally`] and fans out over [`EdgeKind::Finally`] edges
//!   to every continuation: the code after the `try`, an outer pending
//!   `finally`, or the synthetic return block when a `return` was routed
//!   through the region.
//!
//! Lowering never panics on malformed bodies; it reports
//! [`Error::InvalidIr`](crate::Error::InvalidIr) so callers can skip the
//! function and keep going.

use crate::{
    analysis::cfg::{BasicBlock, Cfg, EdgeKind},
    ir::{
        Arg, CallArg, Callee, CatchClause, Expr, ExprKind, FieldId, Function, FunctionId, Instr,
        Literal, Module, OpId, Operand, ParamMode, Place, Rvalue, Stmt, StmtKind, Target,
        Terminator, TypeId, VarId, VarInfo, VarKind,
    },
    utils::graph::{DirectedGraph, NodeId},
    Error, Result,
};

/// Maximum statement and expression nesting before lowering gives up on the
/// body. Deeper trees would risk exhausting the stack.
const MAX_NESTING_DEPTH: usize = 256;

/// Lowers `function` from `module` into a [`Cfg`].
pub(crate) fn lower(module: &Module, function: FunctionId) -> Result<Cfg> {
    let func = module
        .function(function)
        .ok_or(Error::UnknownFunction(function))?;
    Lowerer::new(module, func).run()
}

/// A block under construction.
#[derive(Default)]
struct ProtoBlock {
    instrs: Vec<Instr>,
    terminator: Option<Terminator>,
}

/// One section of a protected region on the lowering stack.
struct Frame {
    /// Exception edge targets for blocks created under this frame. Empty for
    /// sections whose exceptions propagate straight to the enclosing region.
    targets: Vec<NodeId>,
    /// The finally entry a `return` inside this section must run first.
    pending_finally: Option<NodeId>,
    /// True while lowering a finally body; `return` is rejected there.
    in_finally: bool,
    /// Set when a `return` was routed through this section's finally.
    return_routed: bool,
}

/// The implicit finally body of a `using` statement.
struct DisposeCall {
    callee: Callee,
    resource: VarId,
    op: OpId,
}

enum FinallySource<'t> {
    Stmts(&'t [Stmt]),
    Dispose(DisposeCall),
}

struct Lowerer<'m> {
    module: &'m Module,
    func: &'m Function,
    /// Variable count of the source function; tree references must stay
    /// below this, temporaries are appended above it.
    declared_vars: usize,
    vars: Vec<VarInfo>,
    blocks: Vec<ProtoBlock>,
    edges: Vec<(NodeId, NodeId, EdgeKind)>,
    /// The open block instructions append to. `None` right after a
    /// terminator; re-opened lazily if dead code follows.
    current: Option<NodeId>,
    frames: Vec<Frame>,
    /// Blocks that already have exception edges to their innermost handler.
    exception_marked: Vec<bool>,
    /// End-finally blocks whose return continuation is the synthetic return
    /// block, wired once that block exists.
    pending_return_edges: Vec<NodeId>,
    /// Holds the value of a `return` routed through a finally.
    ret_slot: Option<VarId>,
    routed_value: bool,
    depth: usize,
}

impl<'m> Lowerer<'m> {
    fn new(module: &'m Module, func: &'m Function) -> Self {
        Self {
            module,
            func,
            declared_vars: func.vars.len(),
            vars: func.vars.clone(),
            blocks: vec![ProtoBlock::default()],
            edges: Vec::new(),
            current: Some(NodeId::new(0)),
            frames: Vec::new(),
            exception_marked: Vec::new(),
            pending_return_edges: Vec::new(),
            ret_slot: None,
            routed_value: false,
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Cfg> {
        for stmt in self.func.body() {
            self.lower_stmt(stmt)?;
        }

        // Implicit void return at the end of the body.
        if let Some(block) = self.current.take() {
            self.seal(block, Terminator::Return(None));
        }

        // Returns routed through finally regions converge here.
        if !self.pending_return_edges.is_empty() {
            let return_block = self.new_block();
            let operand = if self.routed_value {
                self.ret_slot.map(Operand::Var)
            } else {
                None
            };
            self.seal(return_block, Terminator::Return(operand));
            let pending = std::mem::take(&mut self.pending_return_edges);
            for end_finally in pending {
                self.edges.push((end_finally, return_block, EdgeKind::Finally));
            }
        }

        self.assemble()
    }

    fn assemble(self) -> Result<Cfg> {
        let Lowerer {
            func,
            blocks,
            edges,
            vars,
            ..
        } = self;

        let mut exception_source = vec![false; blocks.len()];
        for (source, _, kind) in &edges {
            if *kind == EdgeKind::Exception {
                exception_source[source.index()] = true;
            }
        }

        let mut graph = DirectedGraph::with_capacity(blocks.len(), edges.len());
        let mut exits = Vec::new();
        for (index, proto) in blocks.into_iter().enumerate() {
            let Some(terminator) = proto.terminator else {
                return Err(invalid_ir!("block n{} was left unterminated", index));
            };
            let is_exit = match &terminator {
                Terminator::Return(_) => true,
                // A throw with no enclosing handler leaves the function.
                Terminator::Throw(_) => !exception_source[index],
                _ => false,
            };
            if is_exit {
                exits.push(NodeId::new(index));
            }
            graph.add_node(BasicBlock {
                instrs: proto.instrs,
                terminator,
            });
        }
        for (source, target, kind) in edges {
            graph.add_edge(source, target, kind);
        }

        Ok(Cfg::from_parts(
            func.id(),
            graph,
            NodeId::new(0),
            exits,
            vars,
        ))
    }

    // ----- block plumbing -----

    fn new_block(&mut self) -> NodeId {
        let id = NodeId::new(self.blocks.len());
        self.blocks.push(ProtoBlock::default());
        id
    }

    /// The open block, re-opening a fresh one for dead code after a
    /// terminator.
    fn cur(&mut self) -> NodeId {
        if let Some(block) = self.current {
            block
        } else {
            let block = self.new_block();
            self.current = Some(block);
            block
        }
    }

    fn emit(&mut self, op: OpId, dst: Place, rvalue: Rvalue) {
        let block = self.cur();
        self.blocks[block.index()].instrs.push(Instr { op, dst, rvalue });
    }

    /// Terminates `block`, recording the edges the terminator implies.
    fn seal(&mut self, block: NodeId, terminator: Terminator) {
        match &terminator {
            Terminator::Jump(target) => {
                self.edges.push((block, *target, EdgeKind::Normal));
            }
            Terminator::Branch {
                true_target,
                false_target,
                ..
            } => {
                self.edges.push((block, *true_target, EdgeKind::ConditionalTrue));
                self.edges.push((block, *false_target, EdgeKind::ConditionalFalse));
            }
            _ => {}
        }
        self.blocks[block.index()].terminator = Some(terminator);
    }

    /// Seals the open block with a jump to `target`, if one is open.
    fn close_into(&mut self, target: NodeId) {
        if let Some(block) = self.current.take() {
            self.seal(block, Terminator::Jump(target));
        }
    }

    fn temp(&mut self) -> VarId {
        let id = VarId::new(self.vars.len() as u32);
        self.vars.push(VarInfo {
            name: None,
            kind: VarKind::Temp,
        });
        id
    }

    fn return_slot(&mut self) -> VarId {
        if let Some(slot) = self.ret_slot {
            slot
        } else {
            let slot = self.temp();
            self.ret_slot = Some(slot);
            slot
        }
    }

    // ----- validation -----

    fn check_var(&self, var: VarId) -> Result<()> {
        if var.index() < self.declared_vars {
            Ok(())
        } else {
            Err(invalid_ir!(
                "variable {} is not declared in function '{}'",
                var,
                self.func.name()
            ))
        }
    }

    fn check_field(&self, field: FieldId) -> Result<()> {
        if self.module.field_name(field).is_some() {
            Ok(())
        } else {
            Err(invalid_ir!("field {} is not registered", field))
        }
    }

    fn check_type(&self, ty: TypeId) -> Result<()> {
        if self.module.type_name(ty).is_some() {
            Ok(())
        } else {
            Err(invalid_ir!("type {} is not registered", ty))
        }
    }

    fn check_callee(&self, callee: Callee) -> Result<()> {
        match callee {
            Callee::Function(id) if self.module.function(id).is_some() => Ok(()),
            Callee::External(sym) if self.module.symbol_name(sym).is_some() => Ok(()),
            Callee::Function(id) => Err(invalid_ir!("callee {} is not defined", id)),
            Callee::External(sym) => Err(invalid_ir!("external symbol {} is not registered", sym)),
        }
    }

    // ----- statements -----

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }
        let result = self.lower_stmt_inner(stmt);
        self.depth -= 1;
        result
    }

    fn lower_stmt_inner(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.lower_expr(e)?;
            }
            StmtKind::Assign { target, value } => match target {
                Target::Var(var) => {
                    self.check_var(*var)?;
                    let value = self.lower_expr(value)?;
                    self.emit(stmt.id, Place::Var(*var), Rvalue::Use(value));
                }
                Target::Field { base, field } => {
                    self.check_field(*field)?;
                    let base = self.lower_to_var(base)?;
                    let value = self.lower_expr(value)?;
                    self.emit(
                        stmt.id,
                        Place::Field {
                            base,
                            field: *field,
                        },
                        Rvalue::Use(value),
                    );
                }
                Target::Elem { base, index } => {
                    let base = self.lower_to_var(base)?;
                    let index = self.lower_expr(index)?;
                    let value = self.lower_expr(value)?;
                    self.emit(stmt.id, Place::Elem { base, index }, Rvalue::Use(value));
                }
            },
            StmtKind::Return(value) => self.lower_return(stmt.id, value.as_ref())?,
            StmtKind::Throw(e) => {
                let operand = self.lower_expr(e)?;
                let block = self.cur();
                self.seal(block, Terminator::Throw(operand));
                self.current = None;
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let cond = self.lower_expr(condition)?;
                let cond_block = self.cur();
                let then_block = self.new_block();
                let else_block = self.new_block();
                let join = self.new_block();
                self.seal(
                    cond_block,
                    Terminator::Branch {
                        condition: cond,
                        true_target: then_block,
                        false_target: else_block,
                    },
                );
                self.current = Some(then_block);
                for s in then_body {
                    self.lower_stmt(s)?;
                }
                self.close_into(join);
                self.current = Some(else_block);
                for s in else_body {
                    self.lower_stmt(s)?;
                }
                self.close_into(join);
                self.current = Some(join);
            }
            StmtKind::While { condition, body } => {
                let header = self.new_block();
                self.close_into(header);
                self.current = Some(header);
                let cond = self.lower_expr(condition)?;
                let cond_block = self.cur();
                let body_block = self.new_block();
                let exit_block = self.new_block();
                self.seal(
                    cond_block,
                    Terminator::Branch {
                        condition: cond,
                        true_target: body_block,
                        false_target: exit_block,
                    },
                );
                self.current = Some(body_block);
                for s in body {
                    self.lower_stmt(s)?;
                }
                // Back edge: the condition is re-evaluated each iteration.
                self.close_into(header);
                self.current = Some(exit_block);
            }
            StmtKind::Try {
                body,
                catches,
                finally_body,
            } => {
                let finally = finally_body.as_deref().map(FinallySource::Stmts);
                self.lower_protected(stmt.id, body, catches, finally)?;
            }
            StmtKind::Using {
                resource,
                init,
                dispose,
                body,
            } => {
                self.check_var(*resource)?;
                self.check_callee(*dispose)?;
                let init = self.lower_expr(init)?;
                self.emit(stmt.id, Place::Var(*resource), Rvalue::Use(init));
                let finally = FinallySource::Dispose(DisposeCall {
                    callee: *dispose,
                    resource: *resource,
                    op: stmt.id,
                });
                self.lower_protected(stmt.id, body, &[], Some(finally))?;
            }
        }
        Ok(())
    }

    fn lower_return(&mut self, op: OpId, value: Option<&Expr>) -> Result<()> {
        // A return inside a protected region must run the pending finallys
        // first; route it through the innermost one.
        let mut route = None;
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if frame.in_finally {
                return Err(invalid_ir!(
                    "return inside a finally body in function '{}'",
                    self.func.name()
                ));
            }
            if let Some(finally_entry) = frame.pending_finally {
                route = Some((index, finally_entry));
                break;
            }
        }

        let operand = match value {
            Some(e) => Some(self.lower_expr(e)?),
            None => None,
        };

        match route {
            None => {
                let block = self.cur();
                self.seal(block, Terminator::Return(operand));
            }
            Some((frame_index, finally_entry)) => {
                if let Some(operand) = operand {
                    let slot = self.return_slot();
                    self.emit(op, Place::Var(slot), Rvalue::Use(operand));
                    self.routed_value = true;
                }
                self.frames[frame_index].return_routed = true;
                let block = self.cur();
                self.seal(block, Terminator::Jump(finally_entry));
            }
        }
        self.current = None;
        Ok(())
    }

    /// Lowers a `try`/`catch`/`finally` region (or the region a `using`
    /// desugars to).
    fn lower_protected(
        &mut self,
        op: OpId,
        body: &[Stmt],
        catches: &[CatchClause],
        finally: Option<FinallySource<'_>>,
    ) -> Result<()> {
        if catches.is_empty() && finally.is_none() {
            // Degenerate region: nothing handles, nothing runs after.
            for s in body {
                self.lower_stmt(s)?;
            }
            return Ok(());
        }

        for clause in catches {
            if let Some(ty) = clause.exception_ty {
                self.check_type(ty)?;
            }
            if let Some(binding) = clause.binding {
                self.check_var(binding)?;
            }
        }

        let body_entry = self.new_block();
        let catch_entries: Vec<NodeId> = catches.iter().map(|_| self.new_block()).collect();
        let finally_entry = finally.as_ref().map(|_| self.new_block());
        let join = self.new_block();

        // Where normal completion of the body and the handlers continues.
        let handler_exit = finally_entry.unwrap_or(join);
        // The innermost handler the protected body's blocks point at.
        let body_targets = if catch_entries.is_empty() {
            vec![handler_exit]
        } else {
            catch_entries.clone()
        };

        self.close_into(body_entry);

        // Protected body.
        let mut needs_return_path = self.lower_section(
            Frame {
                targets: body_targets,
                pending_finally: finally_entry,
                in_finally: false,
                return_routed: false,
            },
            body_entry,
            handler_exit,
            |lw| {
                for s in body {
                    lw.lower_stmt(s)?;
                }
                Ok(())
            },
        )?;

        // Handlers. An exception inside a handler still runs the finally;
        // without one it propagates to the enclosing region.
        for (clause, entry) in catches.iter().zip(&catch_entries) {
            let targets = finally_entry.map(|fe| vec![fe]).unwrap_or_default();
            let routed = self.lower_section(
                Frame {
                    targets,
                    pending_finally: finally_entry,
                    in_finally: false,
                    return_routed: false,
                },
                *entry,
                handler_exit,
                |lw| {
                    if let Some(binding) = clause.binding {
                        lw.emit(op, Place::Var(binding), Rvalue::CaughtException);
                    }
                    for s in &clause.body {
                        lw.lower_stmt(s)?;
                    }
                    Ok(())
                },
            )?;
            needs_return_path |= routed;
        }

        // Finally body, lowered once. Its blocks are protected by the
        // enclosing region, not by this one.
        if let (Some(finally_entry), Some(source)) = (finally_entry, finally) {
            self.frames.push(Frame {
                targets: Vec::new(),
                pending_finally: None,
                in_finally: true,
                return_routed: false,
            });
            self.current = Some(finally_entry);
            match source {
                FinallySource::Stmts(stmts) => {
                    for s in stmts {
                        self.lower_stmt(s)?;
                    }
                }
                FinallySource::Dispose(call) => {
                    let result = self.temp();
                    self.emit(
                        call.op,
                        Place::Var(result),
                        Rvalue::Call {
                            callee: call.callee,
                            args: vec![CallArg::Value(Operand::Var(call.resource))],
                        },
                    );
                }
            }
            let end_block = self.cur();
            self.seal(end_block, Terminator::EndFinally);
            self.current = None;
            self.frames.pop();

            // Fan out to every continuation the finally can resume.
            self.edges.push((end_block, join, EdgeKind::Finally));
            if needs_return_path {
                let mut outer = None;
                for (index, frame) in self.frames.iter().enumerate().rev() {
                    if let Some(outer_entry) = frame.pending_finally {
                        outer = Some((index, outer_entry));
                        break;
                    }
                }
                match outer {
                    Some((frame_index, outer_entry)) => {
                        self.edges.push((end_block, outer_entry, EdgeKind::Finally));
                        self.frames[frame_index].return_routed = true;
                    }
                    None => self.pending_return_edges.push(end_block),
                }
            }
        }

        self.current = Some(join);
        Ok(())
    }

    /// Lowers one section of a protected region under `frame`, then wires
    /// exception edges for the blocks the section created.
    fn lower_section(
        &mut self,
        frame: Frame,
        entry: NodeId,
        exit: NodeId,
        build: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<bool> {
        self.frames.push(frame);
        let span_start = self.blocks.len();
        self.current = Some(entry);
        let result = build(self);
        self.close_into(exit);
        let span_end = self.blocks.len();
        let Some(frame) = self.frames.pop() else {
            return Err(invalid_ir!("unbalanced region nesting"));
        };
        result?;

        if !frame.targets.is_empty() {
            self.exception_marked.resize(self.blocks.len(), false);
            for index in std::iter::once(entry.index()).chain(span_start..span_end) {
                // Blocks protected by an inner region keep their edges; the
                // inner handler's own blocks pick ours up instead.
                if self.exception_marked[index] {
                    continue;
                }
                self.exception_marked[index] = true;
                for &target in &frame.targets {
                    self.edges.push((NodeId::new(index), target, EdgeKind::Exception));
                }
            }
        }

        Ok(frame.return_routed)
    }

    // ----- expressions -----

    fn lower_expr(&mut self, e: &Expr) -> Result<Operand> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }
        let result = self.lower_expr_inner(e);
        self.depth -= 1;
        result
    }

    fn lower_expr_inner(&mut self, e: &Expr) -> Result<Operand> {
        match &e.kind {
            ExprKind::Literal(lit) => Ok(Operand::Literal(lit.clone())),
            ExprKind::Local(var) => {
                self.check_var(*var)?;
                Ok(Operand::Var(*var))
            }
            ExprKind::FieldLoad { base, field } => {
                self.check_field(*field)?;
                let base = self.lower_to_var(base)?;
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::FieldLoad {
                        base,
                        field: *field,
                    },
                );
                Ok(Operand::Var(result))
            }
            ExprKind::ElemLoad { base, index } => {
                let base = self.lower_to_var(base)?;
                let index = self.lower_expr(index)?;
                let result = self.temp();
                self.emit(e.id, Place::Var(result), Rvalue::ElemLoad { base, index });
                Ok(Operand::Var(result))
            }
            ExprKind::New { ty, args } => {
                self.check_type(*ty)?;
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push(self.lower_expr(arg)?);
                }
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::New {
                        ty: *ty,
                        args: operands,
                    },
                );
                Ok(Operand::Var(result))
            }
            ExprKind::Call { callee, args } => {
                self.check_callee(*callee)?;
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower_arg(arg)?);
                }
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::Call {
                        callee: *callee,
                        args: lowered,
                    },
                );
                Ok(Operand::Var(result))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::Binary {
                        op: *op,
                        lhs,
                        rhs,
                    },
                );
                Ok(Operand::Var(result))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand)?;
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::Unary {
                        op: *op,
                        operand,
                    },
                );
                Ok(Operand::Var(result))
            }
            ExprKind::And { lhs, rhs } => {
                self.lower_short_circuit(e.id, lhs, rhs, false)
            }
            ExprKind::Or { lhs, rhs } => {
                self.lower_short_circuit(e.id, lhs, rhs, true)
            }
            ExprKind::Coalesce { lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let is_present = self.temp();
                self.emit(
                    e.id,
                    Place::Var(is_present),
                    Rvalue::Binary {
                        op: crate::ir::BinOp::Ne,
                        lhs: lhs.clone(),
                        rhs: Operand::Literal(Literal::Null),
                    },
                );
                let cond_block = self.cur();
                let keep_block = self.new_block();
                let rhs_block = self.new_block();
                let join = self.new_block();
                let result = self.temp();
                self.seal(
                    cond_block,
                    Terminator::Branch {
                        condition: Operand::Var(is_present),
                        true_target: keep_block,
                        false_target: rhs_block,
                    },
                );
                self.current = Some(keep_block);
                self.emit(e.id, Place::Var(result), Rvalue::Use(lhs));
                self.close_into(join);
                self.current = Some(rhs_block);
                let rhs = self.lower_expr(rhs)?;
                self.emit(e.id, Place::Var(result), Rvalue::Use(rhs));
                self.close_into(join);
                self.current = Some(join);
                Ok(Operand::Var(result))
            }
            ExprKind::Closure { function, captures } => {
                self.check_callee(Callee::Function(*function))?;
                for capture in captures {
                    self.check_var(*capture)?;
                }
                let result = self.temp();
                self.emit(
                    e.id,
                    Place::Var(result),
                    Rvalue::Closure {
                        function: *function,
                        captures: captures.clone(),
                    },
                );
                Ok(Operand::Var(result))
            }
        }
    }

    /// `&&` and `||` share one diamond; only the short-circuit constant
    /// differs. The right operand's blocks are entered only when the left
    /// operand did not decide the result, so evaluation order is preserved.
    fn lower_short_circuit(
        &mut self,
        op: OpId,
        lhs: &Expr,
        rhs: &Expr,
        short_value: bool,
    ) -> Result<Operand> {
        let lhs = self.lower_expr(lhs)?;
        let cond_block = self.cur();
        let rhs_block = self.new_block();
        let short_block = self.new_block();
        let join = self.new_block();
        let result = self.temp();

        // For `&&` the false edge short-circuits; for `||` the true edge.
        let (true_target, false_target) = if short_value {
            (short_block, rhs_block)
        } else {
            (rhs_block, short_block)
        };
        self.seal(
            cond_block,
            Terminator::Branch {
                condition: lhs,
                true_target,
                false_target,
            },
        );

        self.current = Some(rhs_block);
        let rhs = self.lower_expr(rhs)?;
        self.emit(op, Place::Var(result), Rvalue::Use(rhs));
        self.close_into(join);

        self.current = Some(short_block);
        self.emit(
            op,
            Place::Var(result),
            Rvalue::Use(Operand::Literal(Literal::Bool(short_value))),
        );
        self.close_into(join);

        self.current = Some(join);
        Ok(Operand::Var(result))
    }

    fn lower_arg(&mut self, arg: &Arg) -> Result<CallArg> {
        match arg.mode {
            ParamMode::ByValue => Ok(CallArg::Value(self.lower_expr(&arg.expr)?)),
            ParamMode::ByRef | ParamMode::Out => {
                let ExprKind::Local(var) = &arg.expr.kind else {
                    return Err(invalid_ir!(
                        "{} argument must be a plain variable",
                        arg.mode
                    ));
                };
                self.check_var(*var)?;
                Ok(match arg.mode {
                    ParamMode::ByRef => CallArg::ByRef(*var),
                    _ => CallArg::Out(*var),
                })
            }
        }
    }

    /// Lowers an expression and materializes it into a variable slot if it
    /// was a bare literal.
    fn lower_to_var(&mut self, e: &Expr) -> Result<VarId> {
        match self.lower_expr(e)? {
            Operand::Var(var) => Ok(var),
            literal @ Operand::Literal(_) => {
                let result = self.temp();
                self.emit(e.id, Place::Var(result), Rvalue::Use(literal));
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, ModuleBuilder};

    fn lower_single(
        build: impl FnOnce(&mut ModuleBuilder, &mut FunctionBuilder),
    ) -> Result<Cfg> {
        let mut mb = ModuleBuilder::new();
        let mut f = mb.start_function("test");
        build(&mut mb, &mut f);
        mb.finish_function(f)?;
        let module = mb.finish()?;
        Cfg::build(&module, FunctionId::new(0))
    }

    fn edges_of(cfg: &Cfg, node: NodeId) -> Vec<(NodeId, EdgeKind)> {
        cfg.outgoing_edges(node).collect()
    }

    #[test]
    fn test_temporaries_follow_evaluation_order() {
        let cfg = lower_single(|mb, f| {
            let first = mb.external("First");
            let second = mb.external("Second");
            let x = f.local("x");
            let a = f.call_ext(first, vec![]);
            let b = f.call_ext(second, vec![]);
            let sum = f.binary(crate::ir::BinOp::Add, a, b);
            f.assign(x, sum);
            f.ret(None);
        })
        .unwrap();

        let block = cfg.block(cfg.entry()).unwrap();
        assert!(matches!(block.instrs()[0].rvalue, Rvalue::Call { .. }));
        assert!(matches!(block.instrs()[1].rvalue, Rvalue::Call { .. }));
        assert!(matches!(block.instrs()[2].rvalue, Rvalue::Binary { .. }));
        assert!(matches!(block.instrs()[3].rvalue, Rvalue::Use(_)));
    }

    #[test]
    fn test_and_short_circuits_right_operand() {
        let cfg = lower_single(|_, f| {
            let a = f.local("a");
            let b = f.local("b");
            let x = f.local("x");
            let lhs = f.read(a);
            let rhs = f.read(b);
            let both = f.and(lhs, rhs);
            f.assign(x, both);
            f.ret(None);
        })
        .unwrap();

        // Diamond: condition, rhs arm, short arm, join.
        assert_eq!(cfg.block_count(), 4);
        let edges = edges_of(&cfg, cfg.entry());
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].1, EdgeKind::ConditionalTrue);
        assert_eq!(edges[1].1, EdgeKind::ConditionalFalse);

        // The true arm evaluates b; the false arm writes the constant.
        let true_arm = cfg.block(edges[0].0).unwrap();
        assert!(matches!(
            &true_arm.instrs()[0].rvalue,
            Rvalue::Use(Operand::Var(v)) if v.index() == 1
        ));
        let false_arm = cfg.block(edges[1].0).unwrap();
        assert!(matches!(
            &false_arm.instrs()[0].rvalue,
            Rvalue::Use(Operand::Literal(Literal::Bool(false)))
        ));
    }

    #[test]
    fn test_or_short_circuits_on_true() {
        let cfg = lower_single(|_, f| {
            let a = f.local("a");
            let b = f.local("b");
            let x = f.local("x");
            let lhs = f.read(a);
            let rhs = f.read(b);
            let either = f.or(lhs, rhs);
            f.assign(x, either);
            f.ret(None);
        })
        .unwrap();

        let edges = edges_of(&cfg, cfg.entry());
        let true_arm = cfg.block(edges[0].0).unwrap();
        assert!(matches!(
            &true_arm.instrs()[0].rvalue,
            Rvalue::Use(Operand::Literal(Literal::Bool(true)))
        ));
    }

    #[test]
    fn test_coalesce_tests_against_null() {
        let cfg = lower_single(|_, f| {
            let a = f.local("a");
            let x = f.local("x");
            let lhs = f.read(a);
            let fallback = f.lit_str("default");
            let value = f.coalesce(lhs, fallback);
            f.assign(x, value);
            f.ret(None);
        })
        .unwrap();

        assert_eq!(cfg.block_count(), 4);
        let entry = cfg.block(cfg.entry()).unwrap();
        assert!(matches!(
            &entry.instrs()[0].rvalue,
            Rvalue::Binary {
                op: crate::ir::BinOp::Ne,
                rhs: Operand::Literal(Literal::Null),
                ..
            }
        ));
    }

    #[test]
    fn test_try_catch_wires_exception_edges() {
        let cfg = lower_single(|mb, f| {
            let risky = mb.external("Risky");
            let e = f.local("e");
            let y = f.local("y");
            let clause = f.catch_clause(None, Some(e), |f| {
                let zero = f.lit_int(0);
                f.assign(y, zero);
            });
            f.try_catch(
                |f| {
                    let call = f.call_ext(risky, vec![]);
                    f.eval(call);
                },
                vec![clause],
            );
            let one = f.lit_int(1);
            f.assign(y, one);
            f.ret(None);
        })
        .unwrap();

        // Entry, protected body, handler, join.
        assert_eq!(cfg.block_count(), 4);

        let body_block = cfg
            .node_ids()
            .find(|&n| {
                cfg.block(n).is_some_and(|b| {
                    b.instrs()
                        .iter()
                        .any(|i| matches!(i.rvalue, Rvalue::Call { .. }))
                })
            })
            .unwrap();
        let exception_edges: Vec<_> = edges_of(&cfg, body_block)
            .into_iter()
            .filter(|(_, k)| *k == EdgeKind::Exception)
            .collect();
        assert_eq!(exception_edges.len(), 1);

        // The handler starts by capturing the in-flight exception.
        let handler = cfg.block(exception_edges[0].0).unwrap();
        assert!(matches!(
            handler.instrs()[0].rvalue,
            Rvalue::CaughtException
        ));
    }

    #[test]
    fn test_try_finally_shapes() {
        let cfg = lower_single(|_, f| {
            let a = f.local("a");
            let b = f.local("b");
            f.try_finally(
                |f| {
                    let one = f.lit_int(1);
                    f.assign(a, one);
                },
                |f| {
                    let two = f.lit_int(2);
                    f.assign(b, two);
                },
            );
            f.ret(None);
        })
        .unwrap();

        // Find the end-finally block.
        let end_finally = cfg
            .node_ids()
            .find(|&n| {
                matches!(
                    cfg.block(n).map(BasicBlock::terminator),
                    Some(Terminator::EndFinally)
                )
            })
            .unwrap();

        let continuations = edges_of(&cfg, end_finally);
        assert_eq!(continuations.len(), 1);
        assert_eq!(continuations[0].1, EdgeKind::Finally);

        // The protected body block reaches the finally both normally and
        // exceptionally.
        let body_block = cfg
            .node_ids()
            .find(|&n| {
                edges_of(&cfg, n)
                    .iter()
                    .any(|(_, k)| *k == EdgeKind::Exception)
            })
            .unwrap();
        let kinds: Vec<EdgeKind> = edges_of(&cfg, body_block).iter().map(|(_, k)| *k).collect();
        assert!(kinds.contains(&EdgeKind::Normal));
        assert!(kinds.contains(&EdgeKind::Exception));
    }

    #[test]
    fn test_return_routed_through_finally() {
        let cfg = lower_single(|_, f| {
            let b = f.local("b");
            f.try_finally(
                |f| {
                    let one = f.lit_int(1);
                    f.ret(Some(one));
                },
                |f| {
                    let two = f.lit_int(2);
                    f.assign(b, two);
                },
            );
        })
        .unwrap();

        let end_finally = cfg
            .node_ids()
            .find(|&n| {
                matches!(
                    cfg.block(n).map(BasicBlock::terminator),
                    Some(Terminator::EndFinally)
                )
            })
            .unwrap();

        // Fan-out: the after-try continuation and the synthetic return.
        let continuations = edges_of(&cfg, end_finally);
        assert_eq!(continuations.len(), 2);
        assert!(continuations.iter().all(|(_, k)| *k == EdgeKind::Finally));

        // The routed value comes back out through the synthetic return.
        let returns_value = cfg.node_ids().any(|n| {
            matches!(
                cfg.block(n).map(BasicBlock::terminator),
                Some(Terminator::Return(Some(Operand::Var(_))))
            )
        });
        assert!(returns_value);
    }

    #[test]
    fn test_using_lowers_to_dispose_in_finally() {
        let cfg = lower_single(|mb, f| {
            let conn_ty = mb.ty("Connection");
            let close = mb.external("Connection.Close");
            let query = mb.external("Connection.Query");
            let conn = f.local("conn");
            let init = f.new_object(conn_ty, vec![]);
            f.using_stmt(conn, init, Callee::External(close), |f| {
                let arg = f.read(conn);
                let call = f.call_ext(query, vec![arg]);
                f.eval(call);
            });
            f.ret(None);
        })
        .unwrap();

        // The dispose call lives in the finally body, just before the
        // end-finally terminator.
        let dispose_block = cfg
            .node_ids()
            .find(|&n| {
                matches!(
                    cfg.block(n).map(BasicBlock::terminator),
                    Some(Terminator::EndFinally)
                )
            })
            .unwrap();
        let block = cfg.block(dispose_block).unwrap();
        assert!(matches!(
            &block.instrs()[0].rvalue,
            Rvalue::Call { callee: Callee::External(_), .. }
        ));
    }

    #[test]
    fn test_nested_try_points_at_innermost_handler() {
        let cfg = lower_single(|mb, f| {
            let risky = mb.external("Risky");
            let x = f.local("x");
            let y = f.local("y");
            let outer_clause = f.catch_clause(None, None, |f| {
                let two = f.lit_int(2);
                f.assign(y, two);
            });
            f.try_catch(
                |f| {
                    let inner_clause = f.catch_clause(None, None, |f| {
                        let one = f.lit_int(1);
                        f.assign(x, one);
                    });
                    f.try_catch(
                        |f| {
                            let call = f.call_ext(risky, vec![]);
                            f.eval(call);
                        },
                        vec![inner_clause],
                    );
                },
                vec![outer_clause],
            );
            f.ret(None);
        })
        .unwrap();

        // The block with the risky call has exactly one exception edge.
        let call_block = cfg
            .node_ids()
            .find(|&n| {
                cfg.block(n).is_some_and(|b| {
                    b.instrs()
                        .iter()
                        .any(|i| matches!(i.rvalue, Rvalue::Call { .. }))
                })
            })
            .unwrap();
        let exception_edges: Vec<_> = edges_of(&cfg, call_block)
            .into_iter()
            .filter(|(_, k)| *k == EdgeKind::Exception)
            .collect();
        assert_eq!(exception_edges.len(), 1);

        // Its handler in turn is protected by the outer region.
        let inner_handler = exception_edges[0].0;
        assert!(edges_of(&cfg, inner_handler)
            .iter()
            .any(|(_, k)| *k == EdgeKind::Exception));
    }

    #[test]
    fn test_byref_argument_must_be_variable() {
        let result = lower_single(|mb, f| {
            let swap = mb.external("Swap");
            let lit = f.lit_int(1);
            let call = f.call(
                Callee::External(swap),
                vec![Arg {
                    mode: ParamMode::ByRef,
                    expr: lit,
                }],
            );
            f.eval(call);
        });

        let err = result.unwrap_err();
        assert!(err.to_string().contains("must be a plain variable"));
    }

    #[test]
    fn test_deep_nesting_reports_recursion_limit() {
        let result = lower_single(|_, f| {
            let mut e = f.lit_str("x");
            for _ in 0..(MAX_NESTING_DEPTH + 10) {
                let piece = f.lit_str("y");
                e = f.concat(e, piece);
            }
            let x = f.local("x");
            f.assign(x, e);
        });

        assert!(matches!(result, Err(Error::RecursionLimit(_))));
    }

    #[test]
    fn test_dead_code_after_return_is_unreachable() {
        let cfg = lower_single(|_, f| {
            let x = f.local("x");
            f.ret(None);
            let one = f.lit_int(1);
            f.assign(x, one);
        })
        .unwrap();

        assert_eq!(cfg.block_count(), 2);
        // Only the entry is reachable.
        assert_eq!(cfg.reverse_postorder().len(), 1);
    }

    #[test]
    fn test_empty_body_gets_implicit_return() {
        let cfg = lower_single(|_, _| {}).unwrap();
        assert_eq!(cfg.block_count(), 1);
        assert!(matches!(
            cfg.block(cfg.entry()).unwrap().terminator(),
            Terminator::Return(None)
        ));
    }
}
