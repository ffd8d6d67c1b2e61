//! The taint value domain.

use std::collections::BTreeSet;
use std::fmt;

use crate::ir::{FunctionId, OpRef};

/// Where a tainted value came from.
///
/// Origins travel inside taint values through copies, joins, and summary
/// substitution, so a finding at a sink can name the exact site the data
/// entered the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaintOrigin {
    /// A call to a matched source produced the value.
    Call(OpRef),
    /// The value entered through parameter `n` of a function whose tag
    /// marks it as receiving untrusted input.
    EntryParam(FunctionId, u16),
    /// Symbolic stand-in for parameter `n` during summary computation.
    ///
    /// Call sites substitute the caller's actual argument origins for it;
    /// an `Arg` origin never reaches a finding.
    Arg(u16),
}

impl TaintOrigin {
    /// Returns `true` if this origin names a real program point rather
    /// than a symbolic parameter.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        !matches!(self, TaintOrigin::Arg(_))
    }
}

impl fmt::Display for TaintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaintOrigin::Call(site) => write!(f, "{site}"),
            TaintOrigin::EntryParam(function, position) => {
                write!(f, "{function}#param{position}")
            }
            TaintOrigin::Arg(position) => write!(f, "arg{position}"),
        }
    }
}

/// The taint lattice element for one value cell.
///
/// `Untainted` is the bottom: the value is known to carry no untrusted
/// data. `Unknown` means the analysis has no information, as after an
/// unmodeled call. `Tainted` carries its origin set and sits above both,
/// so a taint fact observed on any path survives every join; merging two
/// tainted values unions the origins. Putting `Tainted` above `Unknown`
/// is deliberate: a merge of "tainted from S" with "no idea" keeps the
/// attributable fact instead of erasing it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaintValue {
    /// Known to be clean.
    #[default]
    Untainted,
    /// No information.
    Unknown,
    /// May carry untrusted data from any origin in the set.
    Tainted(BTreeSet<TaintOrigin>),
}

impl TaintValue {
    /// A tainted value with a single origin.
    #[must_use]
    pub fn tainted(origin: TaintOrigin) -> Self {
        TaintValue::Tainted(BTreeSet::from([origin]))
    }

    /// Returns `true` if the value may carry untrusted data.
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        matches!(self, TaintValue::Tainted(_))
    }

    /// Returns `true` if nothing is known about the value.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, TaintValue::Unknown)
    }

    /// The origin set, if the value is tainted.
    #[must_use]
    pub fn origins(&self) -> Option<&BTreeSet<TaintOrigin>> {
        match self {
            TaintValue::Tainted(origins) => Some(origins),
            TaintValue::Untainted | TaintValue::Unknown => None,
        }
    }

    /// Least upper bound of two taint values.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (TaintValue::Tainted(a), TaintValue::Tainted(b)) => {
                TaintValue::Tainted(a.union(b).copied().collect())
            }
            (TaintValue::Tainted(origins), _) | (_, TaintValue::Tainted(origins)) => {
                TaintValue::Tainted(origins.clone())
            }
            (TaintValue::Unknown, _) | (_, TaintValue::Unknown) => TaintValue::Unknown,
            (TaintValue::Untainted, TaintValue::Untainted) => TaintValue::Untainted,
        }
    }
}

impl fmt::Display for TaintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaintValue::Untainted => write!(f, "untainted"),
            TaintValue::Unknown => write!(f, "unknown"),
            TaintValue::Tainted(origins) => {
                write!(f, "tainted{{")?;
                for (index, origin) in origins.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{origin}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::OpId;

    fn call_origin(function: u32, op: u32) -> TaintOrigin {
        TaintOrigin::Call(OpRef::new(FunctionId::new(function), OpId::new(op)))
    }

    #[test]
    fn test_join_unions_origins() {
        let a = TaintValue::tainted(call_origin(0, 1));
        let b = TaintValue::tainted(call_origin(0, 5));

        let joined = a.join(&b);
        let origins = joined.origins().unwrap();
        assert_eq!(origins.len(), 2);
        assert!(origins.contains(&call_origin(0, 1)));
        assert!(origins.contains(&call_origin(0, 5)));
    }

    #[test]
    fn test_tainted_survives_join_with_unknown() {
        let tainted = TaintValue::tainted(call_origin(1, 2));

        assert_eq!(tainted.join(&TaintValue::Unknown), tainted);
        assert_eq!(TaintValue::Unknown.join(&tainted), tainted);
    }

    #[test]
    fn test_untainted_is_identity() {
        let tainted = TaintValue::tainted(call_origin(1, 2));

        assert_eq!(TaintValue::Untainted.join(&tainted), tainted);
        assert_eq!(
            TaintValue::Untainted.join(&TaintValue::Unknown),
            TaintValue::Unknown
        );
        assert_eq!(
            TaintValue::Untainted.join(&TaintValue::Untainted),
            TaintValue::Untainted
        );
    }

    #[test]
    fn test_arg_origins_are_not_reportable() {
        assert!(!TaintOrigin::Arg(0).is_reportable());
        assert!(call_origin(0, 0).is_reportable());
        assert!(TaintOrigin::EntryParam(FunctionId::new(2), 1).is_reportable());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(call_origin(2, 7).to_string(), "fn2:op7");
        assert_eq!(
            TaintOrigin::EntryParam(FunctionId::new(1), 0).to_string(),
            "fn1#param0"
        );
        assert_eq!(TaintOrigin::Arg(3).to_string(), "arg3");
    }
}
