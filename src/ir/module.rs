//! Module: the compilation unit handed to an analysis session.
//!
//! A module owns its functions plus four interning tables: external symbols,
//! types, fields, and tags. The tag table is the capability/classification
//! mechanism: instead of a rule asking "does this type derive from X", it
//! asks "does this symbol/type carry tag T", and the module answers from the
//! precomputed sets. Rule specifications resolve their names against these
//! tables once per session; a name the module never interned simply fails to
//! resolve and the rule degrades.

use std::collections::{BTreeSet, HashMap};

use crate::ir::{
    ops::Callee,
    types::{FieldId, FunctionId, SymbolId, TagId, TypeId},
    Function,
};

/// An interned external symbol with its tag set.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub(crate) name: String,
    pub(crate) tags: BTreeSet<TagId>,
}

/// An interned type name with its tag set.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub(crate) name: String,
    pub(crate) tags: BTreeSet<TagId>,
}

/// A compilation unit: functions plus the interning tables they reference.
///
/// Built once via [`ModuleBuilder`](crate::ir::ModuleBuilder) and immutable
/// afterwards, so analysis sessions can share it freely across threads.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) functions: Vec<Function>,
    pub(crate) function_index: HashMap<String, FunctionId>,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) symbol_index: HashMap<String, SymbolId>,
    pub(crate) types: Vec<TypeInfo>,
    pub(crate) type_index: HashMap<String, TypeId>,
    pub(crate) fields: Vec<String>,
    pub(crate) field_index: HashMap<String, FieldId>,
    pub(crate) tags: Vec<String>,
    pub(crate) tag_index: HashMap<String, TagId>,
}

impl Module {
    /// Returns the function with the given id, if it is defined.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Iterates over all functions in id order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter()
    }

    /// Returns the number of functions in the module.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Looks up a function id by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.function_index.get(name).copied()
    }

    /// Looks up an external symbol id by name.
    #[must_use]
    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolId> {
        self.symbol_index.get(name).copied()
    }

    /// Returns the name of an external symbol.
    #[must_use]
    pub fn symbol_name(&self, symbol: SymbolId) -> Option<&str> {
        self.symbols.get(symbol.index()).map(|s| s.name.as_str())
    }

    /// Returns the tag set of an external symbol.
    #[must_use]
    pub fn symbol_tags(&self, symbol: SymbolId) -> Option<&BTreeSet<TagId>> {
        self.symbols.get(symbol.index()).map(|s| &s.tags)
    }

    /// Looks up a type id by name.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.type_index.get(name).copied()
    }

    /// Returns the name of a type.
    #[must_use]
    pub fn type_name(&self, ty: TypeId) -> Option<&str> {
        self.types.get(ty.index()).map(|t| t.name.as_str())
    }

    /// Returns the tag set of a type.
    #[must_use]
    pub fn type_tags(&self, ty: TypeId) -> Option<&BTreeSet<TagId>> {
        self.types.get(ty.index()).map(|t| &t.tags)
    }

    /// Returns `true` if the type carries the given tag.
    #[must_use]
    pub fn type_has_tag(&self, ty: TypeId, tag: TagId) -> bool {
        self.type_tags(ty).is_some_and(|tags| tags.contains(&tag))
    }

    /// Looks up a field id by name.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<FieldId> {
        self.field_index.get(name).copied()
    }

    /// Returns the name of a field.
    #[must_use]
    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.fields.get(field.index()).map(String::as_str)
    }

    /// Looks up a tag id by name.
    #[must_use]
    pub fn tag_by_name(&self, name: &str) -> Option<TagId> {
        self.tag_index.get(name).copied()
    }

    /// Returns the name of a tag.
    #[must_use]
    pub fn tag_name(&self, tag: TagId) -> Option<&str> {
        self.tags.get(tag.index()).map(String::as_str)
    }

    /// Returns `true` if the callee carries the given tag.
    ///
    /// For module functions this consults the function's tag set; for
    /// external symbols, the symbol table's.
    #[must_use]
    pub fn callee_has_tag(&self, callee: Callee, tag: TagId) -> bool {
        match callee {
            Callee::Function(id) => self.function(id).is_some_and(|f| f.has_tag(tag)),
            Callee::External(sym) => self
                .symbol_tags(sym)
                .is_some_and(|tags| tags.contains(&tag)),
        }
    }

    /// Renders a callee as a human-readable name for logs and DOT exports.
    #[must_use]
    pub fn callee_name(&self, callee: Callee) -> String {
        match callee {
            Callee::Function(id) => self
                .function(id)
                .map_or_else(|| id.to_string(), |f| f.name().to_string()),
            Callee::External(sym) => self
                .symbol_name(sym)
                .map_or_else(|| sym.to_string(), str::to_string),
        }
    }
}
