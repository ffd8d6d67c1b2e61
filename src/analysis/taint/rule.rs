//! Taint rule specifications.
//!
//! A [`TaintRule`] names the sources, sanitizers, and sinks of one flow
//! class, written against symbol, function, and tag names so the same rule
//! can run over any module. Resolving a rule interns the names once per
//! session; a rule whose sinks all fail to resolve, or that has neither a
//! resolvable source nor an entry tag, can never produce a finding and is
//! skipped instead of run.

use tracing::debug;

use crate::{
    analysis::matcher::{resolve_callees, CalleeMatcher, CalleeSpec},
    ir::{Callee, Function, Module, TagId},
};

/// One sink pattern with the argument positions it considers dangerous.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SinkSpec {
    callee: CalleeSpec,
    /// `None` means every argument position is dangerous.
    positions: Option<Vec<u16>>,
}

/// A source-to-sink flow rule, written in names.
///
/// Built fluently and resolved against a module before a run:
///
/// ```
/// use flowscope::analysis::{CalleeSpec, TaintRule};
///
/// let rule = TaintRule::new("sql-injection")
///     .source(CalleeSpec::symbol("Http.ReadParam"))
///     .sanitizer(CalleeSpec::symbol("Sql.Escape"))
///     .sink_arg(CalleeSpec::symbol("Sql.Execute"), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintRule {
    name: String,
    sources: Vec<CalleeSpec>,
    sanitizers: Vec<CalleeSpec>,
    sinks: Vec<SinkSpec>,
    entry_tag: Option<String>,
}

impl TaintRule {
    /// Creates an empty rule named `name`.
    ///
    /// The name identifies the rule in findings and skip records.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            sanitizers: Vec::new(),
            sinks: Vec::new(),
            entry_tag: None,
        }
    }

    /// Adds a source pattern: calls matching it produce tainted values.
    #[must_use]
    pub fn source(mut self, callee: CalleeSpec) -> Self {
        self.sources.push(callee);
        self
    }

    /// Adds a sanitizer pattern: calls matching it produce clean values
    /// and scrub their by-ref arguments.
    #[must_use]
    pub fn sanitizer(mut self, callee: CalleeSpec) -> Self {
        self.sanitizers.push(callee);
        self
    }

    /// Adds a sink pattern with every argument position dangerous.
    #[must_use]
    pub fn sink(mut self, callee: CalleeSpec) -> Self {
        self.sinks.push(SinkSpec {
            callee,
            positions: None,
        });
        self
    }

    /// Adds a sink pattern where only argument `position` is dangerous.
    ///
    /// Repeat the call to mark several positions of the same callee.
    #[must_use]
    pub fn sink_arg(mut self, callee: CalleeSpec, position: u16) -> Self {
        self.sinks.push(SinkSpec {
            callee,
            positions: Some(vec![position]),
        });
        self
    }

    /// Treats the parameters of every function tagged `tag` as tainted.
    ///
    /// This is how untrusted input that arrives through an entry point
    /// rather than a source call enters the analysis.
    #[must_use]
    pub fn entry_tag(mut self, tag: impl Into<String>) -> Self {
        self.entry_tag = Some(tag.into());
        self
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the rule's names against `module`.
    ///
    /// Returns `None` when the rule cannot fire there: no sink resolved,
    /// or no source resolved and no entry tag is set. Individual names
    /// that fail to resolve are dropped with a debug log; the rule keeps
    /// running on whatever did resolve.
    #[must_use]
    pub fn resolve(&self, module: &Module) -> Option<ResolvedTaintRule> {
        let sources = resolve_callees(&self.sources, module);
        let sanitizers = resolve_callees(&self.sanitizers, module);
        let sinks: Vec<ResolvedSink> = self
            .sinks
            .iter()
            .filter_map(|sink| {
                Some(ResolvedSink {
                    matcher: sink.callee.resolve(module)?,
                    positions: sink.positions.clone(),
                })
            })
            .collect();
        let entry_tag = match &self.entry_tag {
            Some(name) => {
                let tag = module.tag_by_name(name);
                if tag.is_none() {
                    debug!("rule {}: entry tag {name:?} not interned", self.name);
                }
                tag
            }
            None => None,
        };

        if sinks.is_empty() {
            debug!("rule {}: no sink resolved; rule skipped", self.name);
            return None;
        }
        if sources.is_empty() && entry_tag.is_none() {
            debug!("rule {}: no taint can enter; rule skipped", self.name);
            return None;
        }
        Some(ResolvedTaintRule {
            name: self.name.clone(),
            sources,
            sanitizers,
            sinks,
            entry_tag,
        })
    }
}

/// A sink matcher with its dangerous argument positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedSink {
    pub(crate) matcher: CalleeMatcher,
    pub(crate) positions: Option<Vec<u16>>,
}

impl ResolvedSink {
    /// Returns `true` if argument `position` of a matched call is dangerous.
    pub(crate) fn covers_position(&self, position: u16) -> bool {
        match &self.positions {
            None => true,
            Some(positions) => positions.contains(&position),
        }
    }
}

/// A [`TaintRule`] with its names interned against one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTaintRule {
    name: String,
    sources: Vec<CalleeMatcher>,
    sanitizers: Vec<CalleeMatcher>,
    sinks: Vec<ResolvedSink>,
    entry_tag: Option<TagId>,
}

impl ResolvedTaintRule {
    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_source(&self, module: &Module, callee: Callee) -> bool {
        self.sources.iter().any(|m| m.matches(module, callee))
    }

    pub(crate) fn is_sanitizer(&self, module: &Module, callee: Callee) -> bool {
        self.sanitizers.iter().any(|m| m.matches(module, callee))
    }

    pub(crate) fn matching_sinks<'a>(
        &'a self,
        module: &'a Module,
        callee: Callee,
    ) -> impl Iterator<Item = &'a ResolvedSink> {
        self.sinks
            .iter()
            .filter(move |sink| sink.matcher.matches(module, callee))
    }

    /// Returns `true` if `function` is an entry point whose parameters
    /// carry untrusted input under this rule.
    pub(crate) fn is_entry(&self, function: &Function) -> bool {
        self.entry_tag.is_some_and(|tag| function.has_tag(tag))
    }
}
