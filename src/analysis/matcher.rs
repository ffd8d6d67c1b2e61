//! Callee and type matchers for rule specifications.
//!
//! Rules are written against names (external symbols, defined functions,
//! types, tags) so they can be declared before any module exists. A spec
//! resolves its names against a concrete module once per session; the
//! resolved matchers compare interned ids, so matching inside a transfer
//! function costs an integer compare or one tag-set probe.
//!
//! A name the module never interned cannot match anything, so resolution
//! drops it with a debug log instead of failing the rule.

use tracing::debug;

use crate::ir::{Callee, FunctionId, Module, SymbolId, TagId, TypeId};

/// A callee pattern written in names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalleeSpec {
    /// Calls to the external symbol with this exact name.
    Symbol(String),
    /// Calls to the defined function with this exact name.
    Function(String),
    /// Calls to any callee carrying this tag.
    Tag(String),
}

impl CalleeSpec {
    /// Pattern for calls to the external symbol named `name`.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        CalleeSpec::Symbol(name.into())
    }

    /// Pattern for calls to the defined function named `name`.
    #[must_use]
    pub fn function(name: impl Into<String>) -> Self {
        CalleeSpec::Function(name.into())
    }

    /// Pattern for calls to any callee tagged `tag`.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        CalleeSpec::Tag(name.into())
    }

    /// Resolves the name against `module`, or drops it with a debug log.
    #[must_use]
    pub fn resolve(&self, module: &Module) -> Option<CalleeMatcher> {
        let resolved = match self {
            CalleeSpec::Symbol(name) => module.symbol_by_name(name).map(CalleeMatcher::Symbol),
            CalleeSpec::Function(name) => {
                module.function_by_name(name).map(CalleeMatcher::Function)
            }
            CalleeSpec::Tag(name) => module.tag_by_name(name).map(CalleeMatcher::Tag),
        };
        if resolved.is_none() {
            debug!("dropping unresolvable callee matcher {self:?}");
        }
        resolved
    }
}

/// A resolved callee pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalleeMatcher {
    /// The external symbol itself.
    Symbol(SymbolId),
    /// The defined function itself.
    Function(FunctionId),
    /// Any callee carrying the tag.
    Tag(TagId),
}

impl CalleeMatcher {
    /// Returns `true` if `callee` matches this pattern.
    #[must_use]
    pub fn matches(&self, module: &Module, callee: Callee) -> bool {
        match *self {
            CalleeMatcher::Symbol(symbol) => callee == Callee::External(symbol),
            CalleeMatcher::Function(function) => callee == Callee::Function(function),
            CalleeMatcher::Tag(tag) => module.callee_has_tag(callee, tag),
        }
    }
}

/// A type pattern written in names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// The type with this exact interned name.
    Named(String),
    /// Any type carrying this tag.
    Tag(String),
}

impl TypeSpec {
    /// Pattern for the declared type named `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        TypeSpec::Named(name.into())
    }

    /// Pattern for any type tagged `tag`.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        TypeSpec::Tag(name.into())
    }

    /// Resolves the name against `module`, or drops it with a debug log.
    #[must_use]
    pub fn resolve(&self, module: &Module) -> Option<TypeMatcher> {
        let resolved = match self {
            TypeSpec::Named(name) => module.type_by_name(name).map(TypeMatcher::Type),
            TypeSpec::Tag(name) => module.tag_by_name(name).map(TypeMatcher::Tag),
        };
        if resolved.is_none() {
            debug!("dropping unresolvable type matcher {self:?}");
        }
        resolved
    }
}

/// A resolved type pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMatcher {
    /// The interned type itself.
    Type(TypeId),
    /// Any type carrying the tag.
    Tag(TagId),
}

impl TypeMatcher {
    /// Returns `true` if `ty` matches this pattern.
    #[must_use]
    pub fn matches(&self, module: &Module, ty: TypeId) -> bool {
        match *self {
            TypeMatcher::Type(wanted) => ty == wanted,
            TypeMatcher::Tag(tag) => module.type_has_tag(ty, tag),
        }
    }
}

pub(crate) fn resolve_callees(specs: &[CalleeSpec], module: &Module) -> Vec<CalleeMatcher> {
    specs.iter().filter_map(|spec| spec.resolve(module)).collect()
}

pub(crate) fn resolve_types(specs: &[TypeSpec], module: &Module) -> Vec<TypeMatcher> {
    specs.iter().filter_map(|spec| spec.resolve(module)).collect()
}

pub(crate) fn any_callee(matchers: &[CalleeMatcher], module: &Module, callee: Callee) -> bool {
    matchers.iter().any(|m| m.matches(module, callee))
}

pub(crate) fn any_type(matchers: &[TypeMatcher], module: &Module, ty: TypeId) -> bool {
    matchers.iter().any(|m| m.matches(module, ty))
}
