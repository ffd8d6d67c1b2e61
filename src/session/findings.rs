//! Findings and skip records produced by a session.

use std::fmt;

use strum::Display;

use crate::{
    analysis::taint::TaintOrigin,
    ir::{FunctionId, OpRef},
};

/// How certain the analysis is that a usage site is hazardous.
///
/// The ordering is by severity: [`Classification::Unflagged`] <
/// [`Classification::MaybeFlagged`] < [`Classification::Flagged`], which is
/// also the order findings sort in.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classification {
    /// The tracked value is known safe at the usage site.
    #[strum(serialize = "unflagged")]
    Unflagged,
    /// The tracked value is hazardous on some paths reaching the site.
    #[strum(serialize = "maybe-flagged")]
    MaybeFlagged,
    /// The tracked value is hazardous on every known path.
    #[strum(serialize = "flagged")]
    Flagged,
}

/// One classified hazard discovered by a rule.
///
/// A finding names the rule, the operation where the hazard manifests, the
/// classification, and, for taint rules, the origin the untrusted data
/// entered through. The hazard operation's function is the method context;
/// findings discovered while a callee was inlined into some caller still
/// point into the callee.
///
/// Findings order by rule, then hazard site, then classification and
/// origin. The derived equality is what the session deduplicates on: one
/// `(source, sink)` pair is reported exactly once no matter how many
/// inlined paths rediscover it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Finding {
    pub(crate) rule: String,
    pub(crate) hazard: OpRef,
    pub(crate) classification: Classification,
    pub(crate) origin: Option<TaintOrigin>,
}

impl Finding {
    /// Name of the rule that produced this finding.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// The operation where the hazard manifests.
    #[must_use]
    pub const fn hazard(&self) -> OpRef {
        self.hazard
    }

    /// The function containing the hazard operation.
    #[must_use]
    pub const fn function(&self) -> FunctionId {
        self.hazard.function
    }

    /// How certain the analysis is.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        self.classification
    }

    /// Where the offending data entered the program, for taint findings.
    #[must_use]
    pub const fn origin(&self) -> Option<TaintOrigin> {
        self.origin
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}",
            self.rule, self.classification, self.hazard
        )?;
        if let Some(origin) = self.origin {
            write!(f, " (from {origin})")?;
        }
        Ok(())
    }
}

/// Why a rule or a function produced no results this session.
///
/// Skips are never fatal: a malformed function body, an unresolvable rule,
/// or a cancelled solve only removes its own slice of the work. The record
/// says which slice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SkipRecord {
    pub(crate) function: Option<FunctionId>,
    pub(crate) rule: Option<String>,
    pub(crate) reason: String,
}

impl SkipRecord {
    /// The function that was skipped, or `None` if a whole rule was.
    #[must_use]
    pub const fn function(&self) -> Option<FunctionId> {
        self.function
    }

    /// The rule that was skipped, or `None` if the function was skipped for
    /// every rule (a lowering failure).
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    /// Human-readable reason for the skip.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for SkipRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.function, self.rule.as_deref()) {
            (Some(function), Some(rule)) => {
                write!(f, "skipped {function} for rule {rule}: {}", self.reason)
            }
            (Some(function), None) => write!(f, "skipped {function}: {}", self.reason),
            (None, Some(rule)) => write!(f, "skipped rule {rule}: {}", self.reason),
            (None, None) => write!(f, "skipped: {}", self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::OpId;

    fn op_ref(function: u32, op: u32) -> OpRef {
        OpRef::new(FunctionId::new(function), OpId::new(op))
    }

    #[test]
    fn test_classification_orders_by_severity() {
        assert!(Classification::Unflagged < Classification::MaybeFlagged);
        assert!(Classification::MaybeFlagged < Classification::Flagged);
        assert_eq!(Classification::MaybeFlagged.to_string(), "maybe-flagged");
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding {
            rule: "sql-injection".into(),
            hazard: op_ref(2, 7),
            classification: Classification::Flagged,
            origin: Some(TaintOrigin::Call(op_ref(0, 3))),
        };
        assert_eq!(
            finding.to_string(),
            "[sql-injection] flagged at fn2:op7 (from fn0:op3)"
        );
        assert_eq!(finding.function(), FunctionId::new(2));
    }

    #[test]
    fn test_findings_sort_by_rule_then_site() {
        let mut findings = vec![
            Finding {
                rule: "b".into(),
                hazard: op_ref(0, 0),
                classification: Classification::Flagged,
                origin: None,
            },
            Finding {
                rule: "a".into(),
                hazard: op_ref(1, 4),
                classification: Classification::Flagged,
                origin: None,
            },
            Finding {
                rule: "a".into(),
                hazard: op_ref(0, 2),
                classification: Classification::Flagged,
                origin: None,
            },
        ];
        findings.sort();
        let order: Vec<_> = findings
            .iter()
            .map(|f| (f.rule().to_string(), f.hazard()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), op_ref(0, 2)),
                ("a".to_string(), op_ref(1, 4)),
                ("b".to_string(), op_ref(0, 0)),
            ]
        );
    }

    #[test]
    fn test_skip_record_display() {
        let skip = SkipRecord {
            function: Some(FunctionId::new(3)),
            rule: None,
            reason: "body is empty".into(),
        };
        assert_eq!(skip.to_string(), "skipped fn3: body is empty");

        let rule_skip = SkipRecord {
            function: None,
            rule: Some("xxe".into()),
            reason: "no source names resolved".into(),
        };
        assert_eq!(
            rule_skip.to_string(),
            "skipped rule xxe: no source names resolved"
        );
    }
}
