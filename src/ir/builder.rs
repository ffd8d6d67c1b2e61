//! Fluent builders for modules and function bodies.
//!
//! The builder API is how embedders (and the test suite) construct programs:
//! a [`ModuleBuilder`] interns symbols, types, fields, and tags and collects
//! function definitions; a [`FunctionBuilder`] assembles one body as a
//! structured operation tree, assigning every node its [`OpId`]. Nested
//! bodies (`if`, `while`, `try`, `using`) are built through closures that
//! receive the same builder, so statement order follows source order.
//!
//! ```rust,ignore
//! use flowscope::ir::ModuleBuilder;
//!
//! let mut mb = ModuleBuilder::new();
//! let read = mb.external("Http.ReadParam");
//! let exec = mb.external("Sql.Exec");
//!
//! let mut f = mb.start_function("handler");
//! let q = f.local("q");
//! let input = f.call_ext(read, vec![]);
//! f.assign(q, input);
//! let arg = f.read(q);
//! let call = f.call_ext(exec, vec![arg]);
//! f.eval(call);
//! mb.finish_function(f)?;
//!
//! let module = mb.finish()?;
//! # Ok::<(), flowscope::Error>(())
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::{
    ir::{
        module::{SymbolInfo, TypeInfo},
        ops::{Arg, BinOp, Callee, CatchClause, Expr, ExprKind, Stmt, StmtKind, Target, UnOp},
        types::{
            FieldId, FunctionId, Literal, OpId, ParamMode, SymbolId, TagId, TypeId, VarId, VarKind,
        },
        Function, Module, Param, VarInfo,
    },
    Result,
};

/// Builds a [`Module`]: interning tables plus function definitions.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    declared: Vec<String>,
    function_index: HashMap<String, FunctionId>,
    defined: Vec<Option<Function>>,
    function_tags: Vec<BTreeSet<TagId>>,
    symbols: Vec<SymbolInfo>,
    symbol_index: HashMap<String, SymbolId>,
    types: Vec<TypeInfo>,
    type_index: HashMap<String, TypeId>,
    fields: Vec<String>,
    field_index: HashMap<String, FieldId>,
    tags: Vec<String>,
    tag_index: HashMap<String, TagId>,
}

impl ModuleBuilder {
    /// Creates an empty module builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns an external symbol name, returning the same id for repeated
    /// names.
    pub fn external(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.symbol_index.get(name) {
            return id;
        }
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(SymbolInfo {
            name: name.to_string(),
            tags: BTreeSet::new(),
        });
        self.symbol_index.insert(name.to_string(), id);
        id
    }

    /// Interns a type name.
    pub fn ty(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.type_index.get(name) {
            return id;
        }
        let id = TypeId::new(self.types.len() as u32);
        self.types.push(TypeInfo {
            name: name.to_string(),
            tags: BTreeSet::new(),
        });
        self.type_index.insert(name.to_string(), id);
        id
    }

    /// Interns a field name.
    pub fn field(&mut self, name: &str) -> FieldId {
        if let Some(&id) = self.field_index.get(name) {
            return id;
        }
        let id = FieldId::new(self.fields.len() as u32);
        self.fields.push(name.to_string());
        self.field_index.insert(name.to_string(), id);
        id
    }

    /// Interns a classification tag name.
    pub fn tag(&mut self, name: &str) -> TagId {
        if let Some(&id) = self.tag_index.get(name) {
            return id;
        }
        let id = TagId::new(self.tags.len() as u32);
        self.tags.push(name.to_string());
        self.tag_index.insert(name.to_string(), id);
        id
    }

    /// Attaches a tag to an external symbol.
    pub fn tag_symbol(&mut self, symbol: SymbolId, tag: TagId) {
        if let Some(info) = self.symbols.get_mut(symbol.index()) {
            info.tags.insert(tag);
        }
    }

    /// Attaches a tag to a type.
    pub fn tag_type(&mut self, ty: TypeId, tag: TagId) {
        if let Some(info) = self.types.get_mut(ty.index()) {
            info.tags.insert(tag);
        }
    }

    /// Attaches a tag to a function.
    pub fn tag_function(&mut self, function: FunctionId, tag: TagId) {
        if let Some(tags) = self.function_tags.get_mut(function.index()) {
            tags.insert(tag);
        }
    }

    /// Declares a function by name without defining it yet, so bodies built
    /// earlier can reference it (mutual recursion). Repeated declarations of
    /// the same name return the same id.
    pub fn declare_function(&mut self, name: &str) -> FunctionId {
        if let Some(&id) = self.function_index.get(name) {
            return id;
        }
        let id = FunctionId::new(self.declared.len() as u32);
        self.declared.push(name.to_string());
        self.function_index.insert(name.to_string(), id);
        self.defined.push(None);
        self.function_tags.push(BTreeSet::new());
        id
    }

    /// Starts building the body of `name`, declaring it first if necessary.
    pub fn start_function(&mut self, name: &str) -> FunctionBuilder {
        let id = self.declare_function(name);
        FunctionBuilder::new(id, name)
    }

    /// Registers a finished body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIr`](crate::Error::InvalidIr) if the function
    /// was already defined.
    pub fn finish_function(&mut self, builder: FunctionBuilder) -> Result<FunctionId> {
        let id = builder.id;
        if self.defined[id.index()].is_some() {
            return Err(invalid_ir!(
                "function '{}' is defined twice",
                self.declared[id.index()]
            ));
        }
        self.defined[id.index()] = Some(builder.into_function());
        Ok(id)
    }

    /// Finalizes the module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIr`](crate::Error::InvalidIr) if any declared
    /// function was never defined.
    pub fn finish(self) -> Result<Module> {
        let mut functions = Vec::with_capacity(self.defined.len());
        for (index, slot) in self.defined.into_iter().enumerate() {
            match slot {
                Some(mut function) => {
                    function.tags = self.function_tags[index].clone();
                    functions.push(function);
                }
                None => {
                    return Err(invalid_ir!(
                        "function '{}' was declared but never defined",
                        self.declared[index]
                    ));
                }
            }
        }

        Ok(Module {
            functions,
            function_index: self.function_index,
            symbols: self.symbols,
            symbol_index: self.symbol_index,
            types: self.types,
            type_index: self.type_index,
            fields: self.fields,
            field_index: self.field_index,
            tags: self.tags,
            tag_index: self.tag_index,
        })
    }
}

/// Builds one function body as a structured operation tree.
///
/// Obtained from [`ModuleBuilder::start_function`] and handed back to
/// [`ModuleBuilder::finish_function`]. Expression factory methods allocate
/// the node's [`OpId`] and return the node by value; statement methods append
/// to the body currently being built. Nested bodies are entered through the
/// closure-accepting statement methods.
#[derive(Debug)]
pub struct FunctionBuilder {
    id: FunctionId,
    name: String,
    params: Vec<Param>,
    vars: Vec<VarInfo>,
    frames: Vec<Vec<Stmt>>,
    next_op: u32,
}

impl FunctionBuilder {
    fn new(id: FunctionId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            params: Vec::new(),
            vars: Vec::new(),
            frames: vec![Vec::new()],
            next_op: 0,
        }
    }

    fn into_function(mut self) -> Function {
        // Only the top-level frame can remain; nested frames are always
        // popped by the statement method that pushed them.
        let body = self.frames.swap_remove(0);
        Function {
            id: self.id,
            name: self.name,
            params: self.params,
            vars: self.vars,
            body,
            tags: BTreeSet::new(),
            op_count: self.next_op,
        }
    }

    /// Returns the id of the function being built.
    #[must_use]
    pub const fn id(&self) -> FunctionId {
        self.id
    }

    fn next_op(&mut self) -> OpId {
        let id = OpId::new(self.next_op);
        self.next_op += 1;
        id
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_op(),
            kind,
        }
    }

    fn push_stmt(&mut self, kind: StmtKind) {
        let id = self.next_op();
        // frames is never empty: the top-level frame lives for the whole
        // builder.
        if let Some(frame) = self.frames.last_mut() {
            frame.push(Stmt { id, kind });
        }
    }

    fn nested_body(&mut self, build: impl FnOnce(&mut Self)) -> Vec<Stmt> {
        self.frames.push(Vec::new());
        build(self);
        self.frames.pop().unwrap_or_default()
    }

    fn add_var(&mut self, name: &str, kind: VarKind) -> VarId {
        let id = VarId::new(self.vars.len() as u32);
        self.vars.push(VarInfo {
            name: Some(name.to_string()),
            kind,
        });
        id
    }

    // ----- declarations -----

    /// Declares a by-value parameter.
    pub fn param(&mut self, name: &str) -> VarId {
        self.param_with_mode(name, ParamMode::ByValue)
    }

    /// Declares a by-ref parameter.
    pub fn ref_param(&mut self, name: &str) -> VarId {
        self.param_with_mode(name, ParamMode::ByRef)
    }

    /// Declares an out parameter.
    pub fn out_param(&mut self, name: &str) -> VarId {
        self.param_with_mode(name, ParamMode::Out)
    }

    fn param_with_mode(&mut self, name: &str, mode: ParamMode) -> VarId {
        let position = self.params.len() as u16;
        let var = self.add_var(name, VarKind::Param(position));
        self.params.push(Param { var, mode });
        var
    }

    /// Declares a local variable.
    pub fn local(&mut self, name: &str) -> VarId {
        self.add_var(name, VarKind::Local)
    }

    // ----- expressions -----

    /// The null literal.
    pub fn null(&mut self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Null))
    }

    /// A boolean literal.
    pub fn lit_bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    /// An integer literal.
    pub fn lit_int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    /// A string literal.
    pub fn lit_str(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::Literal(Literal::Str(value.to_string())))
    }

    /// Reads a variable.
    pub fn read(&mut self, var: VarId) -> Expr {
        self.expr(ExprKind::Local(var))
    }

    /// Loads a field from `base`.
    pub fn field_load(&mut self, base: Expr, field: FieldId) -> Expr {
        self.expr(ExprKind::FieldLoad {
            base: Box::new(base),
            field,
        })
    }

    /// Loads an element from `base` at `index`.
    pub fn elem_load(&mut self, base: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::ElemLoad {
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    /// Allocates a new object of `ty`. The returned expression's id is the
    /// allocation site.
    pub fn new_object(&mut self, ty: TypeId, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New { ty, args })
    }

    /// Calls a module function with by-value arguments.
    pub fn call_fn(&mut self, function: FunctionId, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Arg::by_value).collect();
        self.expr(ExprKind::Call {
            callee: Callee::Function(function),
            args,
        })
    }

    /// Calls an external symbol with by-value arguments.
    pub fn call_ext(&mut self, symbol: SymbolId, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Arg::by_value).collect();
        self.expr(ExprKind::Call {
            callee: Callee::External(symbol),
            args,
        })
    }

    /// Calls a callee with explicit argument modes.
    pub fn call(&mut self, callee: Callee, args: Vec<Arg>) -> Expr {
        self.expr(ExprKind::Call { callee, args })
    }

    /// A by-ref argument reading `var`.
    pub fn ref_arg(&mut self, var: VarId) -> Arg {
        let expr = self.read(var);
        Arg {
            mode: ParamMode::ByRef,
            expr,
        }
    }

    /// An out argument writing `var`.
    pub fn out_arg(&mut self, var: VarId) -> Arg {
        let expr = self.read(var);
        Arg {
            mode: ParamMode::Out,
            expr,
        }
    }

    /// A binary operation.
    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// String concatenation.
    pub fn concat(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinOp::Concat, lhs, rhs)
    }

    /// A unary operation.
    pub fn unary(&mut self, op: UnOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Short-circuit `lhs && rhs`.
    pub fn and(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::And {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Short-circuit `lhs || rhs`.
    pub fn or(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Or {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Null-coalescing `lhs ?? rhs`.
    pub fn coalesce(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Coalesce {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// A closure over `function` capturing the listed variables.
    pub fn closure(&mut self, function: FunctionId, captures: Vec<VarId>) -> Expr {
        self.expr(ExprKind::Closure { function, captures })
    }

    // ----- statements -----

    /// Evaluates an expression for its effects.
    pub fn eval(&mut self, expr: Expr) {
        self.push_stmt(StmtKind::Expr(expr));
    }

    /// Assigns to a variable.
    pub fn assign(&mut self, var: VarId, value: Expr) {
        self.push_stmt(StmtKind::Assign {
            target: Target::Var(var),
            value,
        });
    }

    /// Assigns to a field of `base`.
    pub fn assign_field(&mut self, base: Expr, field: FieldId, value: Expr) {
        self.push_stmt(StmtKind::Assign {
            target: Target::Field { base, field },
            value,
        });
    }

    /// Assigns to an element of `base` at `index`.
    pub fn assign_elem(&mut self, base: Expr, index: Expr, value: Expr) {
        self.push_stmt(StmtKind::Assign {
            target: Target::Elem { base, index },
            value,
        });
    }

    /// Returns from the function.
    pub fn ret(&mut self, value: Option<Expr>) {
        self.push_stmt(StmtKind::Return(value));
    }

    /// Throws an exception value.
    pub fn throw(&mut self, value: Expr) {
        self.push_stmt(StmtKind::Throw(value));
    }

    /// `if (condition) { then } else { else }`.
    pub fn if_else(
        &mut self,
        condition: Expr,
        then_build: impl FnOnce(&mut Self),
        else_build: impl FnOnce(&mut Self),
    ) {
        let then_body = self.nested_body(then_build);
        let else_body = self.nested_body(else_build);
        self.push_stmt(StmtKind::If {
            condition,
            then_body,
            else_body,
        });
    }

    /// `if (condition) { then }` with no else branch.
    pub fn if_then(&mut self, condition: Expr, then_build: impl FnOnce(&mut Self)) {
        self.if_else(condition, then_build, |_| {});
    }

    /// `while (condition) { body }`.
    pub fn while_loop(&mut self, condition: Expr, body_build: impl FnOnce(&mut Self)) {
        let body = self.nested_body(body_build);
        self.push_stmt(StmtKind::While { condition, body });
    }

    /// Builds a catch clause for use with the `try_*` methods.
    pub fn catch_clause(
        &mut self,
        exception_ty: Option<TypeId>,
        binding: Option<VarId>,
        body_build: impl FnOnce(&mut Self),
    ) -> CatchClause {
        let body = self.nested_body(body_build);
        CatchClause {
            exception_ty,
            binding,
            body,
        }
    }

    /// `try { body } catch ... ` with the given handlers.
    pub fn try_catch(&mut self, body_build: impl FnOnce(&mut Self), catches: Vec<CatchClause>) {
        let body = self.nested_body(body_build);
        self.push_stmt(StmtKind::Try {
            body,
            catches,
            finally_body: None,
        });
    }

    /// `try { body } finally { finally }`.
    pub fn try_finally(
        &mut self,
        body_build: impl FnOnce(&mut Self),
        finally_build: impl FnOnce(&mut Self),
    ) {
        let body = self.nested_body(body_build);
        let finally_body = self.nested_body(finally_build);
        self.push_stmt(StmtKind::Try {
            body,
            catches: Vec::new(),
            finally_body: Some(finally_body),
        });
    }

    /// `try { body } catch ... finally { finally }`.
    pub fn try_catch_finally(
        &mut self,
        body_build: impl FnOnce(&mut Self),
        catches: Vec<CatchClause>,
        finally_build: impl FnOnce(&mut Self),
    ) {
        let body = self.nested_body(body_build);
        let finally_body = self.nested_body(finally_build);
        self.push_stmt(StmtKind::Try {
            body,
            catches,
            finally_body: Some(finally_body),
        });
    }

    /// `using (resource = init) { body }`, invoking `dispose` on every path
    /// out of the body.
    pub fn using_stmt(
        &mut self,
        resource: VarId,
        init: Expr,
        dispose: Callee,
        body_build: impl FnOnce(&mut Self),
    ) {
        let body = self.nested_body(body_build);
        self.push_stmt(StmtKind::Using {
            resource,
            init,
            dispose,
            body,
        });
    }
}

impl Arg {
    /// A by-value argument.
    #[must_use]
    pub fn by_value(expr: Expr) -> Self {
        Arg {
            mode: ParamMode::ByValue,
            expr,
        }
    }
}
