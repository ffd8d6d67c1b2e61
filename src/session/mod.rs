//! One module analyzed under many rules, in parallel.
//!
//! A [`Session`] pairs a [`Module`](crate::ir::Module) with a set of taint
//! and property rules and runs every resolved rule over every function.
//! Work fans out across threads; findings land in a concurrent ordered set
//! and are deduplicated and merged only after the parallel phase joins.
//! Failures never propagate: whatever cannot run becomes a [`SkipRecord`]
//! and the rest of the session is unaffected.
//!
//! # Architecture
//!
//! - **Input**: [`Session`] is a fluent builder over the module, an
//!   [`AnalysisConfig`], the rules, and an optional
//!   [`CancellationToken`](crate::utils::CancellationToken)
//! - **Execution**: one task per function and resolved rule, scheduled
//!   with `rayon` in bottom-up call graph order; control flow graphs and
//!   callee summaries are shared through concurrent caches so no lowering
//!   or summary is computed twice
//! - **Output**: [`SessionReport`] holds the sorted [`Finding`]s, a
//!   [`SkipRecord`] for every piece of work that could not run, and
//!   [`SessionStats`] counters
//!
//! A hazard site inlined into several callers can be classified once per
//! calling context. The session reports it once, at its defining
//! function, with the worst classification any context produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::Session;
//! use flowscope::analysis::{CalleeSpec, TaintRule};
//!
//! let report = Session::new(&module)
//!     .taint_rule(
//!         TaintRule::new("sql-injection")
//!             .source(CalleeSpec::symbol("Http.ReadParam"))
//!             .sanitizer(CalleeSpec::symbol("Sql.Escape"))
//!             .sink(CalleeSpec::symbol("Sql.Execute")),
//!     )
//!     .run();
//!
//! for finding in report.findings() {
//!     println!("{finding}");
//! }
//! for skip in report.skips() {
//!     eprintln!("skipped: {skip}");
//! }
//! ```

mod config;
mod findings;

pub use config::AnalysisConfig;
pub use findings::{Classification, Finding, SkipRecord};

use std::collections::BTreeMap;

use crossbeam_skiplist::SkipSet;
use rayon::prelude::*;
use tracing::debug;

use crate::{
    analysis::{
        callgraph::CallGraph,
        cfg::CfgStore,
        interprocedural::SummaryCache,
        property_set::{
            EntryValues, PropertyAnalyzer, PropertyRule, PropertySummary, ResolvedPropertyRule,
        },
        taint::{ResolvedTaintRule, TaintAnalyzer, TaintRule, TaintSummary},
    },
    ir::{FunctionId, Module, OpRef},
    utils::CancellationToken,
};

/// One unit of parallel work: a resolved rule, by index, over one function.
#[derive(Clone, Copy)]
enum Task {
    Taint(usize, FunctionId),
    Property(usize, FunctionId),
}

/// A configured analysis run over one module.
///
/// Built fluently, executed by [`Session::run`]. The same session can be
/// run more than once; each run resolves the rules and recomputes every
/// cache from scratch.
pub struct Session<'m> {
    module: &'m Module,
    config: AnalysisConfig,
    taint_rules: Vec<TaintRule>,
    property_rules: Vec<PropertyRule>,
    token: CancellationToken,
}

impl<'m> Session<'m> {
    /// Creates a session over `module` with the default configuration and
    /// no rules.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            config: AnalysisConfig::default(),
            taint_rules: Vec::new(),
            property_rules: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    /// Replaces the analysis configuration.
    #[must_use]
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a taint rule to the run.
    #[must_use]
    pub fn taint_rule(mut self, rule: TaintRule) -> Self {
        self.taint_rules.push(rule);
        self
    }

    /// Adds a property rule to the run.
    #[must_use]
    pub fn property_rule(mut self, rule: PropertyRule) -> Self {
        self.property_rules.push(rule);
        self
    }

    /// Installs a cancellation token checked before every task and at
    /// every solver step inside one.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Runs every rule over every function and aggregates the results.
    ///
    /// Never fails. A rule that does not resolve, a function whose body
    /// cannot be lowered, a fixpoint that exhausts its budget, and a
    /// cancelled solve each turn into a [`SkipRecord`]; no single one of
    /// them can suppress the findings of the remaining work.
    #[must_use]
    pub fn run(&self) -> SessionReport {
        if self.token.is_cancelled() {
            debug!("session cancelled before start");
            return SessionReport {
                findings: Vec::new(),
                skips: Vec::new(),
                stats: SessionStats {
                    function_count: self.module.function_count(),
                    cancelled: true,
                    ..SessionStats::default()
                },
            };
        }

        let findings: SkipSet<Finding> = SkipSet::new();
        let skips: SkipSet<SkipRecord> = SkipSet::new();

        let mut taint_rules = Vec::with_capacity(self.taint_rules.len());
        for rule in &self.taint_rules {
            match rule.resolve(self.module) {
                Some(resolved) => taint_rules.push(resolved),
                None => {
                    skips.insert(SkipRecord {
                        function: None,
                        rule: Some(rule.name().to_string()),
                        reason: "rule names matched nothing in this module".to_string(),
                    });
                }
            }
        }
        let mut property_rules = Vec::with_capacity(self.property_rules.len());
        for rule in &self.property_rules {
            match rule.resolve(self.module) {
                Some(resolved) => property_rules.push(resolved),
                None => {
                    skips.insert(SkipRecord {
                        function: None,
                        rule: Some(rule.name().to_string()),
                        reason: "rule names matched nothing in this module".to_string(),
                    });
                }
            }
        }

        let call_graph = CallGraph::build(self.module);
        let cfgs = CfgStore::new();
        let taint_caches: Vec<SummaryCache<FunctionId, TaintSummary>> =
            (0..taint_rules.len()).map(|_| SummaryCache::new()).collect();
        let property_caches: Vec<SummaryCache<(FunctionId, EntryValues), PropertySummary>> =
            (0..property_rules.len()).map(|_| SummaryCache::new()).collect();

        // Callees first: tasks scheduled bottom-up tend to find their
        // callee summaries already cached. Correctness does not depend on
        // the order; a task computes missing summaries on demand.
        let rules_per_function = taint_rules.len() + property_rules.len();
        let mut tasks = Vec::with_capacity(call_graph.function_count() * rules_per_function);
        for &function in call_graph.bottom_up_order() {
            for rule in 0..taint_rules.len() {
                tasks.push(Task::Taint(rule, function));
            }
            for rule in 0..property_rules.len() {
                tasks.push(Task::Property(rule, function));
            }
        }

        debug!(
            "session: {} tasks over {} functions ({} taint rules, {} property rules)",
            tasks.len(),
            call_graph.function_count(),
            taint_rules.len(),
            property_rules.len()
        );

        tasks.par_iter().for_each(|&task| {
            if self.token.is_cancelled() {
                return;
            }
            match task {
                Task::Taint(rule, function) => self.run_taint(
                    &taint_rules[rule],
                    function,
                    &cfgs,
                    &taint_caches[rule],
                    &findings,
                    &skips,
                ),
                Task::Property(rule, function) => self.run_property(
                    &property_rules[rule],
                    function,
                    &cfgs,
                    &property_caches[rule],
                    &findings,
                    &skips,
                ),
            }
        });

        let findings = merge_findings(&findings);
        let skips: Vec<SkipRecord> = skips.iter().map(|entry| entry.value().clone()).collect();
        let stats = SessionStats {
            function_count: self.module.function_count(),
            taint_rule_count: taint_rules.len(),
            property_rule_count: property_rules.len(),
            finding_count: findings.len(),
            skip_count: skips.len(),
            cancelled: self.token.is_cancelled(),
        };
        debug!(
            "session finished: {} findings, {} skips",
            stats.finding_count, stats.skip_count
        );
        SessionReport {
            findings,
            skips,
            stats,
        }
    }

    /// Runs one taint rule over one root function.
    fn run_taint(
        &self,
        rule: &ResolvedTaintRule,
        function: FunctionId,
        cfgs: &CfgStore,
        summaries: &SummaryCache<FunctionId, TaintSummary>,
        findings: &SkipSet<Finding>,
        skips: &SkipSet<SkipRecord>,
    ) {
        let cfg = match cfgs.get_or_build(self.module, function) {
            Ok(cfg) => cfg,
            Err(error) => {
                // Every rule hits the same cached failure; the identical
                // records collapse in the set.
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: None,
                    reason: error.to_string(),
                });
                return;
            }
        };
        let report = TaintAnalyzer::new(self.module, rule, cfgs, summaries, &self.config)
            .with_cancellation(self.token.clone())
            .analyze(&cfg);
        match report {
            Ok(report) if report.converged() => {
                for flow in report.flows() {
                    findings.insert(Finding {
                        rule: rule.name().to_string(),
                        hazard: flow.sink(),
                        classification: Classification::Flagged,
                        origin: Some(flow.source()),
                    });
                }
            }
            Ok(_) => {
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: Some(rule.name().to_string()),
                    reason: "fixpoint did not converge within the block visit budget".to_string(),
                });
            }
            Err(error) => {
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: Some(rule.name().to_string()),
                    reason: error.to_string(),
                });
            }
        }
    }

    /// Runs one property rule over one root function.
    fn run_property(
        &self,
        rule: &ResolvedPropertyRule,
        function: FunctionId,
        cfgs: &CfgStore,
        summaries: &SummaryCache<(FunctionId, EntryValues), PropertySummary>,
        findings: &SkipSet<Finding>,
        skips: &SkipSet<SkipRecord>,
    ) {
        let cfg = match cfgs.get_or_build(self.module, function) {
            Ok(cfg) => cfg,
            Err(error) => {
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: None,
                    reason: error.to_string(),
                });
                return;
            }
        };
        let report = PropertyAnalyzer::new(self.module, rule, cfgs, summaries, &self.config)
            .with_cancellation(self.token.clone())
            .analyze(&cfg);
        match report {
            Ok(report) if report.converged() => {
                for usage in report.usages() {
                    findings.insert(Finding {
                        rule: rule.name().to_string(),
                        hazard: usage.site(),
                        classification: usage.classification(),
                        origin: None,
                    });
                }
            }
            Ok(_) => {
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: Some(rule.name().to_string()),
                    reason: "fixpoint did not converge within the block visit budget".to_string(),
                });
            }
            Err(error) => {
                skips.insert(SkipRecord {
                    function: Some(function),
                    rule: Some(rule.name().to_string()),
                    reason: error.to_string(),
                });
            }
        }
    }
}

/// Flattens the concurrent set into the final sorted findings.
///
/// Property findings for the same `(rule, site)` pair are collapsed to one
/// finding carrying the worst classification; the same hazard site shows
/// up once per calling context its function was inlined into. Taint
/// findings stay distinct per origin, and exact duplicates were already
/// absorbed by the set.
fn merge_findings(findings: &SkipSet<Finding>) -> Vec<Finding> {
    let mut merged: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut sites: BTreeMap<(String, OpRef), Classification> = BTreeMap::new();
    for entry in findings.iter() {
        let finding = entry.value();
        if finding.origin.is_some() {
            merged.push(finding.clone());
        } else {
            sites
                .entry((finding.rule.clone(), finding.hazard))
                .and_modify(|worst| *worst = (*worst).max(finding.classification))
                .or_insert(finding.classification);
        }
    }
    for ((rule, hazard), classification) in sites {
        merged.push(Finding {
            rule,
            hazard,
            classification,
            origin: None,
        });
    }
    merged.sort();
    merged
}

/// Everything one [`Session::run`] produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    findings: Vec<Finding>,
    skips: Vec<SkipRecord>,
    stats: SessionStats,
}

impl SessionReport {
    /// The findings, sorted by rule, hazard site, classification, and
    /// origin.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Every piece of work that produced no results, and why.
    #[must_use]
    pub fn skips(&self) -> &[SkipRecord] {
        &self.skips
    }

    /// Counters for the run.
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// Counters describing one session run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Functions in the analyzed module.
    pub function_count: usize,
    /// Taint rules that resolved and ran.
    pub taint_rule_count: usize,
    /// Property rules that resolved and ran.
    pub property_rule_count: usize,
    /// Findings after deduplication and merging.
    pub finding_count: usize,
    /// Skip records, including rules that did not resolve.
    pub skip_count: usize,
    /// Whether the cancellation token had fired by the end of the run.
    pub cancelled: bool,
}
