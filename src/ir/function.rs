//! Function definitions.

use std::collections::BTreeSet;

use crate::ir::{
    ops::Stmt,
    types::{FunctionId, ParamMode, TagId, VarId, VarKind},
};

/// A declared parameter of a [`Function`].
#[derive(Debug, Clone)]
pub struct Param {
    /// The variable slot the parameter occupies.
    pub var: VarId,
    /// How the parameter is passed.
    pub mode: ParamMode,
}

/// Metadata about one variable slot of a function.
#[derive(Debug, Clone)]
pub struct VarInfo {
    /// The declared name; lowering temporaries have none.
    pub name: Option<String>,
    /// Where the slot came from.
    pub kind: VarKind,
}

/// A function defined in a [`Module`](crate::ir::Module).
///
/// Functions are immutable once the module builder finishes. The body is the
/// structured operation tree; the control-flow graph builder lowers it on
/// demand. Variable slots cover parameters and locals; lowering extends the
/// table with temporaries in its own copy, so `var_count` here is the
/// declared count only.
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) id: FunctionId,
    pub(crate) name: String,
    pub(crate) params: Vec<Param>,
    pub(crate) vars: Vec<VarInfo>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) tags: BTreeSet<TagId>,
    pub(crate) op_count: u32,
}

impl Function {
    /// Returns this function's id.
    #[must_use]
    pub const fn id(&self) -> FunctionId {
        self.id
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameters in order.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns the variable slot of the parameter at `index`, if it exists.
    #[must_use]
    pub fn param_var(&self, index: usize) -> Option<VarId> {
        self.params.get(index).map(|p| p.var)
    }

    /// Returns the number of declared variable slots (parameters + locals).
    #[must_use]
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Returns the metadata of a variable slot, if it exists.
    #[must_use]
    pub fn var_info(&self, var: VarId) -> Option<&VarInfo> {
        self.vars.get(var.index())
    }

    /// Returns the body's top-level statements.
    #[must_use]
    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// Returns the tags attached to this function.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<TagId> {
        &self.tags
    }

    /// Returns `true` if this function carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }

    /// Returns the number of operation ids allocated while building the body.
    ///
    /// Useful for sizing dense per-operation maps.
    #[must_use]
    pub const fn op_count(&self) -> u32 {
        self.op_count
    }
}
