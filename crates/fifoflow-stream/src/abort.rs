//! Cancellation for in-flight copies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    notify: Notify,
}

/// A cloneable signal for cancelling a copy from another task.
///
/// Multiple clones may call [`abort`](Self::abort); only the first has any
/// effect. A controller watching the signal stops at its next suspension
/// point, tears down both endpoints and fails with
/// [`CopyError::Aborted`](crate::CopyError::Aborted).
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn abort(&self) {
        if !self.state.aborted.swap(true, Ordering::AcqRel) {
            debug!("copy abort requested");
            self.state.notify.notify_waiters();
        }
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// Completes once the signal has been triggered.
    pub async fn aborted(&self) {
        // Register before checking the flag so a concurrent `abort` cannot
        // slip between the check and the wait.
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_aborted() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_abort_wakes_waiter() {
        let signal = AbortSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.aborted().await })
        };

        tokio::task::yield_now().await;
        signal.abort();
        signal.abort();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .expect("waiter panicked");
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_returns_immediately_when_already_set() {
        let signal = AbortSignal::new();
        signal.abort();
        signal.aborted().await;
    }
}
