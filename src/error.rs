use thiserror::Error;

use crate::ir::FunctionId;

macro_rules! invalid_ir {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidIr {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidIr {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers the failure modes of IR construction, control-flow graph
/// lowering, and the dataflow analyses built on top of them. Each variant
/// provides specific context about the failure mode to enable appropriate
/// error handling.
///
/// Analysis failures are deliberately coarse: the session layer treats every
/// error from one function's analysis as "skip that function" and keeps
/// going, so variants exist to explain a skip, not to drive recovery logic.
///
/// # Error Categories
///
/// ## IR Construction Errors
/// - [`Error::InvalidIr`] - A function body violates an IR invariant
/// - [`Error::UnknownFunction`] - A function id has no definition in the module
///
/// ## Analysis Errors
/// - [`Error::RecursionLimit`] - Maximum nesting/recursion depth exceeded
/// - [`Error::Cancelled`] - Cooperative cancellation observed
///
/// # Examples
///
/// ```rust,no_run
/// use flowscope::{analysis::Cfg, Error};
/// # fn get_module() -> flowscope::ir::Module { unimplemented!() }
///
/// let module = get_module();
/// for function in module.functions() {
///     match Cfg::build(&module, function.id()) {
///         Ok(cfg) => println!("{} has {} blocks", function.name(), cfg.block_count()),
///         Err(Error::InvalidIr { message, file, line }) => {
///             // Skip this function, keep analyzing the rest.
///             eprintln!("skipping: {} ({}:{})", message, file, line);
///         }
///         Err(e) => eprintln!("skipping: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A function body violates an IR invariant.
    ///
    /// This error occurs when a body handed to the lowering pass is not
    /// well-formed: a by-ref argument that is not a plain variable, a
    /// variable or field id that was never registered, a declared function
    /// that was never defined, and similar construction mistakes. The error
    /// includes the source location where the violation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invalid IR - {file}:{line}: {message}")]
    InvalidIr {
        /// The message to be printed for the invalid IR error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A function id has no definition in the module.
    ///
    /// This error occurs when an analysis entry point is asked to analyze a
    /// function id that the module does not contain. Call sites targeting
    /// unknown callees do not produce this error; they degrade to the
    /// conservative summary instead.
    #[error("Function {0} is not defined in this module")]
    UnknownFunction(FunctionId),

    /// Recursion limit reached.
    ///
    /// To prevent stack overflow when lowering deeply nested expression
    /// trees, a maximum nesting depth is enforced. This error indicates that
    /// limit was exceeded.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Cooperative cancellation was observed.
    ///
    /// The fixpoint solver checks the session's cancellation token between
    /// worklist iterations. When the token fires, the current function's
    /// analysis is abandoned with this error; the session records the skip
    /// and other functions are unaffected.
    #[error("Analysis was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ir_macro_plain() {
        let err = invalid_ir!("body is empty");
        match err {
            Error::InvalidIr { message, file, .. } => {
                assert_eq!(message, "body is empty");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_ir_macro_format() {
        let err = invalid_ir!("variable {} not registered", 7);
        assert!(err.to_string().contains("variable 7 not registered"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::RecursionLimit(128).to_string(),
            "Reached the maximum recursion level allowed - 128"
        );
        assert_eq!(Error::Cancelled.to_string(), "Analysis was cancelled");
    }
}
