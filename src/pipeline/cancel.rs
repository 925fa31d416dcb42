//! Cooperative cancellation for long-running stages.

use crate::error::{PipelineError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag. Streaming stages call [`check`](Self::check)
/// at every chunk or entry boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that trips automatically once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A token sharing this flag whose deadline is at most `timeout` away.
    pub fn with_deadline_after(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_deadline() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_deadline_after_keeps_flag() {
        let token = CancellationToken::new();
        let limited = token.with_deadline_after(Duration::from_secs(3600));
        assert!(!limited.is_cancelled());
        token.cancel();
        assert!(limited.is_cancelled());

        let expired = CancellationToken::new().with_deadline_after(Duration::ZERO);
        assert!(expired.is_cancelled());
    }
}
