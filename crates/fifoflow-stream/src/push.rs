//! Adapter turning callback-style producers into a [`ChunkSource`].
//!
//! Event-driven producers (listeners, callbacks, other tasks) push chunks
//! through a [`PushHandle`]; the chunks land in an [`AsyncFifoQueue`] and the
//! copy controller pulls them from the [`PushSource`] like any other source.
//!
//! The queue is unbounded, so pausing is cooperative: while the sink is full
//! the controller flips the shared gate and well-behaved producers stop
//! pushing until [`PushHandle::wait_resumed`] returns. Producers that keep
//! pushing are still accepted and nothing is dropped.

use crate::error::SourceError;
use crate::source::ChunkSource;
use fifoflow::AsyncFifoQueue;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::trace;

/// Creates a connected producer handle and pull source.
pub fn push_source<C: Send>() -> (PushHandle<C>, PushSource<C>) {
    let queue = AsyncFifoQueue::new();
    let failure = Arc::new(Mutex::new(None));
    let (gate_tx, gate_rx) = watch::channel(false);

    let handle = PushHandle {
        queue: queue.clone(),
        failure: Arc::clone(&failure),
        gate: gate_rx,
    };
    let source = PushSource {
        queue,
        failure,
        gate: gate_tx,
    };
    (handle, source)
}

/// Producer side of a [`push_source`]. Cheap to clone.
pub struct PushHandle<C> {
    queue: AsyncFifoQueue<C>,
    failure: Arc<Mutex<Option<SourceError>>>,
    gate: watch::Receiver<bool>,
}

impl<C> Clone for PushHandle<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            failure: Arc::clone(&self.failure),
            gate: self.gate.clone(),
        }
    }
}

impl<C> PushHandle<C> {
    /// Pushes a chunk.
    ///
    /// Returns `Ok(true)` if the producer may keep going and `Ok(false)` if
    /// the consumer is currently paused. Fails with [`SourceError::Ended`]
    /// after [`end`](Self::end), [`fail`](Self::fail) or cancellation.
    pub fn push(&self, chunk: C) -> Result<bool, SourceError> {
        self.queue
            .enqueue(chunk)
            .map_err(|_| SourceError::Ended)?;
        Ok(!self.is_paused())
    }

    /// Signals end of data. Calling it again has no effect.
    pub fn end(&self) {
        self.queue.close();
    }

    /// Fails the source.
    ///
    /// The consumer sees the error on its next pull, ahead of any chunks
    /// still queued. Only the first failure is kept.
    pub fn fail(&self, error: SourceError) {
        {
            let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() && !self.queue.is_closed() {
                *failure = Some(error);
            }
        }
        self.queue.close();
    }

    /// Returns `true` while the consumer asks producers to hold off.
    pub fn is_paused(&self) -> bool {
        *self.gate.borrow()
    }

    /// Waits until the consumer is no longer paused.
    ///
    /// Also returns once the source side is dropped.
    pub async fn wait_resumed(&self) {
        let mut gate = self.gate.clone();
        let _ = gate.wait_for(|paused| !*paused).await;
    }

    /// Returns `true` once the source ended, failed or was cancelled.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Consumer side of a [`push_source`].
pub struct PushSource<C> {
    queue: AsyncFifoQueue<C>,
    failure: Arc<Mutex<Option<SourceError>>>,
    gate: watch::Sender<bool>,
}

impl<C> PushSource<C> {
    fn take_failure(&self) -> Option<SourceError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn set_paused(&self, paused: bool) {
        let previous = self.gate.send_replace(paused);
        if previous != paused {
            trace!(paused, "push source gate changed");
        }
    }
}

impl<C: Send> ChunkSource for PushSource<C> {
    type Chunk = C;

    async fn next_chunk(&mut self) -> Result<Option<C>, SourceError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let chunk = self.queue.dequeue().await;
        // A failure closes the queue, waking this request with `None`. A
        // failure recorded while a chunk was being delivered still wins, and
        // that chunk is dropped along with the rest of the queue.
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(chunk)
    }

    fn pause(&mut self) {
        self.set_paused(true);
    }

    fn resume(&mut self) {
        self.set_paused(false);
    }

    fn cancel(&mut self) {
        self.queue.close();
        self.set_paused(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pushed_chunks_are_pulled_in_order() {
        let (handle, mut source) = push_source();
        assert_eq!(handle.push("a"), Ok(true));
        assert_eq!(handle.push("b"), Ok(true));
        handle.end();
        handle.end();

        assert_eq!(source.next_chunk().await, Ok(Some("a")));
        assert_eq!(source.next_chunk().await, Ok(Some("b")));
        assert_eq!(source.next_chunk().await, Ok(None));
        assert_eq!(handle.push("c"), Err(SourceError::Ended));
    }

    #[tokio::test]
    async fn test_failure_preempts_queued_chunks() {
        let (handle, mut source) = push_source();
        handle.push(1).unwrap();
        handle.fail(SourceError::Read("boom".into()));
        handle.fail(SourceError::Disconnected);

        assert_eq!(
            source.next_chunk().await,
            Err(SourceError::Read("boom".into()))
        );
    }

    #[tokio::test]
    async fn test_failure_wakes_waiting_pull() {
        let (handle, mut source) = push_source::<u8>();
        let puller = tokio::spawn(async move { source.next_chunk().await });

        tokio::task::yield_now().await;
        handle.fail(SourceError::Disconnected);

        assert_eq!(puller.await.unwrap(), Err(SourceError::Disconnected));
    }

    #[tokio::test]
    async fn test_failure_discards_chunks_behind_it() {
        let (handle, mut source) = push_source();
        handle.push(1).unwrap();
        handle.push(2).unwrap();
        assert_eq!(source.next_chunk().await, Ok(Some(1)));

        handle.fail(SourceError::Disconnected);
        assert_eq!(source.next_chunk().await, Err(SourceError::Disconnected));
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_pause_is_visible_to_producers() {
        let (handle, mut source) = push_source();
        source.pause();
        assert!(handle.is_paused());
        assert_eq!(handle.push(1), Ok(false));

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_resumed().await })
        };
        tokio::task::yield_now().await;
        source.resume();
        waiter.await.unwrap();
        assert!(!handle.is_paused());
    }

    #[tokio::test]
    async fn test_cancel_rejects_further_pushes() {
        let (handle, mut source) = push_source();
        source.pause();
        source.cancel();

        assert!(handle.is_closed());
        assert!(!handle.is_paused());
        assert_eq!(handle.push(1), Err(SourceError::Ended));
    }
}
