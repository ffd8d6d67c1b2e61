//! DOT format utilities for graph visualization.
//!
//! Control-flow graphs and call graphs can render themselves as DOT for
//! inspection with Graphviz; this module holds the shared label escaping.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Handles all characters with special meaning in DOT labels: quotes,
/// backslashes, newlines, and angle brackets (instruction renderings such as
/// `t3 = call Db.Exec<...>` would otherwise break record labels).
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::utils::escape_dot;
///
/// let escaped = escape_dot("call Parse<T>");
/// assert_eq!(escaped, "call Parse\\<T\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_basic() {
        assert_eq!(escape_dot("entry"), "entry");
    }

    #[test]
    fn test_escape_dot_quotes() {
        assert_eq!(escape_dot("lit \"abc\""), "lit \\\"abc\\\"");
    }

    #[test]
    fn test_escape_dot_backslash() {
        assert_eq!(escape_dot("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_escape_dot_angle_brackets() {
        assert_eq!(escape_dot("call Parse<T>"), "call Parse\\<T\\>");
    }
}
