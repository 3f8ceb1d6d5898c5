//! Cooperative cancellation for long scans and bulk operations.
//!
//! A cheap `Arc<AtomicBool>` handle, consistent with the workspace's
//! preference for atomic counters over channel-based coordination for
//! simple boolean signals. The core checks a token at safe points only
//! (between WAL records during replay, between leaf pages during scans,
//! between rows during statistics collection) -- never mid-record or
//! mid-page, so a cancelled write is always atomic at WAL-record
//! granularity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation signal shared between a caller and a
/// long-running scan or bulk operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel` has been called on this token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_observes_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
