//! Error types for queue operations.

use std::fmt;
use thiserror::Error;

/// Returned by [`AsyncFifoQueue::enqueue`](crate::AsyncFifoQueue::enqueue)
/// once the queue has been closed.
///
/// The rejected value is handed back to the caller so nothing is silently
/// dropped. Use [`into_inner`](Self::into_inner) to recover it.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
#[error("enqueue on a closed queue")]
pub struct ClosedQueueError<T>(pub T);

impl<T> ClosedQueueError<T> {
    /// Consumes the error, returning the value that could not be enqueued.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

// Manual impl so `T` does not need to be `Debug`.
impl<T> fmt::Debug for ClosedQueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosedQueueError").finish_non_exhaustive()
    }
}
