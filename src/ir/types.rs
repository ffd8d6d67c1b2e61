//! Core identifier and value types for the program IR.
//!
//! Everything in a [`Module`](crate::ir::Module) is referenced through dense,
//! strongly-typed ids: functions, variables, operations, fields, external
//! symbols, types, and tags. Ids are assigned sequentially by the builders,
//! so they double as indices into per-entity state vectors inside the
//! analyses. [`OpId`] is the unit of program-point identity: findings address
//! operations as `(FunctionId, OpId)` pairs and the embedder maps them back
//! to source locations.

use std::fmt;

use strum::Display;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Creates an id from a raw index value.
            ///
            /// Primarily intended for internal use and testing; normal usage
            /// obtains ids from the module and function builders.
            #[must_use]
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw index value of this id.
            #[must_use]
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id! {
    /// Identifies a function within its [`Module`](crate::ir::Module).
    ///
    /// Assigned sequentially by
    /// [`ModuleBuilder::declare_function`](crate::ir::ModuleBuilder::declare_function)
    /// in declaration order.
    FunctionId, "fn"
}

define_id! {
    /// Identifies a variable within its function.
    ///
    /// Parameters, locals, and lowering-introduced temporaries share one
    /// dense namespace: parameters come first (in declaration order),
    /// followed by locals, followed by temporaries. Analysis states index
    /// their per-variable vectors by `VarId`.
    VarId, "v"
}

define_id! {
    /// Identifies an operation (statement or expression) within its function.
    ///
    /// `OpId`s are assigned by the function builder as the body is
    /// constructed and survive lowering: every flat instruction carries the
    /// id of the structured operation it came from, so findings can point at
    /// source-level operations. Allocation sites are identified by the
    /// `OpId` of their `new` expression.
    OpId, "op"
}

define_id! {
    /// Identifies an interned field name within a [`Module`](crate::ir::Module).
    FieldId, "fld"
}

define_id! {
    /// Identifies an interned external symbol within a [`Module`](crate::ir::Module).
    ///
    /// External symbols name callees whose bodies are not part of the module,
    /// such as `"Http.ReadParam"` or `"Sql.Exec"`. Rule specifications
    /// resolve their source/sanitizer/sink names against this table.
    SymbolId, "sym"
}

define_id! {
    /// Identifies an interned type name within a [`Module`](crate::ir::Module).
    TypeId, "ty"
}

define_id! {
    /// Identifies an interned classification tag within a [`Module`](crate::ir::Module).
    ///
    /// Tags are the module's capability table: symbols, types, and functions
    /// carry tag sets (for example `"pure"`, `"web-entry"`,
    /// `"dangerous-deserializer"`), and rules match against tags instead of
    /// walking a type hierarchy.
    TagId, "tag"
}

/// A compile-time constant value.
///
/// Literals flow through lowering unchanged; the analyses inspect them for
/// null tracking (points-to), constant array indices, and property-mapper
/// inputs (property-set rules map assigned literals to flag states).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    /// The null reference.
    Null,
    /// A boolean constant.
    Bool(bool),
    /// An integer constant.
    Int(i64),
    /// A string constant.
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// How an argument or parameter is passed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamMode {
    /// Passed by value; the callee sees a copy of the reference.
    #[strum(serialize = "value")]
    ByValue,
    /// Passed by reference; the callee may replace the caller's variable.
    #[strum(serialize = "ref")]
    ByRef,
    /// Output parameter; uninitialized on entry, assigned by the callee.
    #[strum(serialize = "out")]
    Out,
}

/// The origin of a variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// A declared parameter; the payload is the parameter position.
    Param(u16),
    /// A declared local.
    Local,
    /// A temporary introduced by lowering.
    Temp,
}

/// A module-wide reference to one operation: which function, which op.
///
/// [`OpId`]s are only dense within their own function, so any fact that
/// leaves a single-function context carries the pair. Findings are
/// reported in this coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpRef {
    /// The containing function.
    pub function: FunctionId,
    /// The operation within it.
    pub op: OpId,
}

impl OpRef {
    /// Creates a reference to `op` inside `function`.
    #[must_use]
    pub const fn new(function: FunctionId, op: OpId) -> Self {
        Self { function, op }
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.function, self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let f = FunctionId::new(3);
        assert_eq!(f.index(), 3);
        assert_eq!(format!("{f}"), "fn3");
        assert_eq!(format!("{f:?}"), "FunctionId(3)");
    }

    #[test]
    fn test_ids_are_ordered() {
        let mut vars = vec![VarId::new(2), VarId::new(0), VarId::new(1)];
        vars.sort();
        assert_eq!(vars, vec![VarId::new(0), VarId::new(1), VarId::new(2)]);
    }

    #[test]
    fn test_op_ref_display() {
        let site = OpRef::new(FunctionId::new(2), OpId::new(7));
        assert_eq!(site.to_string(), "fn2:op7");
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Null.to_string(), "null");
        assert_eq!(Literal::Bool(true).to_string(), "true");
        assert_eq!(Literal::Int(-7).to_string(), "-7");
        assert_eq!(Literal::Str("a\"b".into()).to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_param_mode_display() {
        assert_eq!(ParamMode::ByValue.to_string(), "value");
        assert_eq!(ParamMode::ByRef.to_string(), "ref");
        assert_eq!(ParamMode::Out.to_string(), "out");
    }
}
