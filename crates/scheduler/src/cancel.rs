//! Cooperative cancellation.
//!
//! A render that is superseded is told to stop through a shared flag; the
//! render checks it between stages and bails out with its own "cancelled"
//! error, which callers drop rather than report.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation flag shared between a render's owner and the render itself.
///
/// Clones observe the same state.
///
/// # Example
///
/// ```
/// use stampwork_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let render_token = token.clone();
///
/// token.cancel();
/// assert!(render_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True when both handles share the same flag.
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that may stand for a cancelled operation rather than a failure.
pub trait Interrupted {
    fn is_interrupted(&self) -> bool;
}
