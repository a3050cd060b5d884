//! Cooperative cancellation
//!
//! Every long-running analytic accepts a `CancellationToken` and polls it at
//! coarse intervals (every 500-1000 inner iterations, or at iteration
//! boundaries). A fired token makes the operation return whatever partial
//! result it has plus `GraphError::Cancelled`. Deadlines ride on the same
//! token, so timeouts are external to the algorithms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::models::{GraphError, Result};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Cloneable cancellation handle
///
/// Clones share the same flag: cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Token that never fires unless `cancel()` is called
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// Token that fires after `timeout` (or when cancelled explicitly)
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Fire the token
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Suspension-point check: `token.check()?`
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_live() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.check(), Err(GraphError::Cancelled));
    }

    #[test]
    fn test_expired_deadline_fires() {
        let token = CancellationToken::with_timeout(Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(token.is_cancelled());
    }
}
