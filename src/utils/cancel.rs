//! Cooperative cancellation for long-running analyses.
//!
//! A [`CancellationToken`] is a cheaply clonable flag shared between the
//! code that requests cancellation and the solvers that honor it. Solvers
//! poll the token between worklist iterations; they never block on it.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::utils::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let worker = token.clone();
//!
//! // From another thread:
//! token.cancel();
//!
//! assert!(worker.is_cancelled());
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared cancellation flag.
///
/// Cloning the token produces another handle to the same flag. Once
/// cancelled, a token stays cancelled; there is no reset.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. All clones of this token observe the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
