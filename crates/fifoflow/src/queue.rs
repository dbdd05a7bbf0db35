use crate::error::ClosedQueueError;
#[cfg(debug_assertions)]
use crate::invariants::{
    debug_assert_end_of_stream, debug_assert_exclusive, debug_assert_no_pending_after_drain,
};
use crate::metrics::QueueMetrics;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Unbounded async FIFO queue with a suspending `dequeue`.
///
/// Producers call [`enqueue`](Self::enqueue) whenever they are ready; a
/// consumer calls [`dequeue`](Self::dequeue) and awaits the next value, which
/// may not exist yet. Values are delivered exactly once and in enqueue order.
/// After [`close`](Self::close) the remaining values are drained and every
/// further `dequeue` resolves to `None`, the end-of-stream marker. Values
/// claimed by a `Dequeue` that has not completed yet count as not drained:
/// end-of-stream is only reported once every one of them has been delivered
/// or put back and taken.
///
/// The handle is cheap to clone; all clones share the same queue.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fifoflow::AsyncFifoQueue;
///
/// let queue = AsyncFifoQueue::new();
/// let next = queue.dequeue(); // registered before the value exists
///
/// queue.enqueue(1).unwrap();
/// queue.enqueue(2).unwrap();
/// queue.close();
///
/// assert_eq!(next.await, Some(1));
/// assert_eq!(queue.dequeue().await, Some(2));
/// assert_eq!(queue.dequeue().await, None);
/// # }
/// ```
pub struct AsyncFifoQueue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    metrics: QueueMetrics,
}

struct State<T> {
    /// Values enqueued but not yet claimed.
    buffered: VecDeque<T>,
    /// Consumer requests that arrived before a value existed.
    /// Dropping a sender resolves its request to end-of-stream.
    pending: VecDeque<oneshot::Sender<T>>,
    /// Values held by `Dequeue` futures that have not completed.
    claimed: usize,
    closed: bool,
}

impl<T> State<T> {
    /// Hands `value` to the oldest live pending request.
    ///
    /// Abandoned requests are discarded along the way. Returns the value
    /// back if no live request was waiting.
    fn hand_off(&mut self, mut value: T) -> Option<T> {
        while let Some(tx) = self.pending.pop_front() {
            match tx.send(value) {
                Ok(()) => {
                    self.claimed += 1;
                    return None;
                }
                Err(returned) => value = returned,
            }
        }
        Some(value)
    }

    /// A claimed value left its `Dequeue`, either delivered or put back.
    fn release_claim(&mut self) {
        debug_assert!(self.claimed > 0, "released a claim that was never taken");
        self.claimed = self.claimed.saturating_sub(1);
    }

    /// Closed, empty and no claimed value can come back.
    fn is_drained(&self) -> bool {
        self.closed && self.claimed == 0 && self.buffered.is_empty()
    }

    /// Resolves waiting requests to end-of-stream once the queue is drained.
    fn settle(&mut self) {
        if self.is_drained() {
            self.pending.clear();
        }

        #[cfg(debug_assertions)]
        debug_assert_no_pending_after_drain!(self.is_drained(), self.pending.len());
    }
}

impl<T> AsyncFifoQueue<T> {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty, open queue with room for `capacity` buffered values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffered: VecDeque::with_capacity(capacity),
                    pending: VecDeque::new(),
                    claimed: 0,
                    closed: false,
                }),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // No method panics while holding the lock, so a poisoned state is
        // still consistent.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes a value onto the queue.
    ///
    /// If a consumer is already waiting, the oldest one receives `value`
    /// directly and nothing is buffered. Fails with [`ClosedQueueError`],
    /// carrying `value` back, once the queue is closed.
    pub fn enqueue(&self, value: T) -> Result<(), ClosedQueueError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(ClosedQueueError(value));
        }

        self.shared.metrics.record_enqueue();
        match state.hand_off(value) {
            None => self.shared.metrics.record_hand_off(),
            Some(value) => state.buffered.push_back(value),
        }

        #[cfg(debug_assertions)]
        debug_assert_exclusive!(state.buffered.len(), state.pending.len());

        Ok(())
    }

    /// Requests the next value.
    ///
    /// The request takes its place in line when this method is called, not
    /// when the returned future is first polled, so concurrent requests are
    /// served in call order. The future resolves to `None` once the queue is
    /// closed and drained. After close, a request made while other requests
    /// still hold values they have not delivered waits for them to finish;
    /// if one of them is dropped its value goes to this request instead.
    ///
    /// Dropping the future before it completes never loses a value: one
    /// that was already claimed goes back to the head of the queue.
    pub fn dequeue(&self) -> Dequeue<T> {
        let mut state = self.lock();

        let slot = if let Some(value) = state.buffered.pop_front() {
            state.claimed += 1;
            Slot::Ready(Some(value))
        } else if state.is_drained() {
            #[cfg(debug_assertions)]
            debug_assert_end_of_stream!(state.closed, state.claimed, state.buffered.len());
            Slot::Ready(None)
        } else {
            state.pending.retain(|tx| !tx.is_closed());
            let (tx, rx) = oneshot::channel();
            state.pending.push_back(tx);
            Slot::Waiting(rx)
        };

        #[cfg(debug_assertions)]
        debug_assert_exclusive!(state.buffered.len(), state.pending.len());

        drop(state);
        Dequeue {
            queue: self.clone(),
            slot,
        }
    }

    /// Claims the oldest buffered value without waiting.
    ///
    /// Returns `None` when nothing is buffered, whether or not the queue is
    /// closed; use [`is_closed`](Self::is_closed) to tell the two apart.
    pub fn try_dequeue(&self) -> Option<T> {
        let value = self.lock().buffered.pop_front();
        if value.is_some() {
            self.shared.metrics.record_dequeue();
        }
        value
    }

    /// Closes the queue.
    ///
    /// Every waiting consumer resolves to `None`, unless values claimed by
    /// unfinished requests are still outstanding; then waiting consumers
    /// resolve once those are delivered. Values already buffered remain
    /// available to later `dequeue` calls. Calling this more than once has
    /// no further effect.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        let waiting = state.pending.len();
        state.settle();

        debug!(
            buffered = state.buffered.len(),
            claimed = state.claimed,
            waiting,
            "queue closed"
        );
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.lock().buffered.len()
    }

    /// Returns `true` if no values are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().buffered.is_empty()
    }

    /// Number of consumer requests currently waiting for a value.
    pub fn pending_consumers(&self) -> usize {
        self.lock().pending.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Traffic counters for this queue.
    pub fn metrics(&self) -> &QueueMetrics {
        &self.shared.metrics
    }

    /// Marks a claimed value as delivered.
    fn deliver(&self) {
        let mut state = self.lock();
        state.release_claim();
        state.settle();
        drop(state);
        self.shared.metrics.record_dequeue();
    }

    /// Puts back a value claimed by an abandoned `Dequeue`.
    ///
    /// Goes to the oldest waiting consumer if there is one, otherwise to the
    /// head of the buffer. Allowed after close so the value is still drained.
    fn restore(&self, value: T) {
        let mut state = self.lock();
        state.release_claim();
        if let Some(value) = state.hand_off(value) {
            state.buffered.push_front(value);
        }

        #[cfg(debug_assertions)]
        debug_assert_exclusive!(state.buffered.len(), state.pending.len());
    }
}

impl<T> Clone for AsyncFifoQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for AsyncFifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AsyncFifoQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AsyncFifoQueue")
            .field("buffered", &state.buffered.len())
            .field("pending", &state.pending.len())
            .field("claimed", &state.claimed)
            .field("closed", &state.closed)
            .finish()
    }
}

enum Slot<T> {
    /// Resolved at request time: a claimed value or end-of-stream.
    Ready(Option<T>),
    /// Waiting for a producer; a dropped sender means end-of-stream.
    Waiting(oneshot::Receiver<T>),
    Done,
}

/// Future returned by [`AsyncFifoQueue::dequeue`].
///
/// Resolves to `Some(value)` or to `None` at end-of-stream. Polling after
/// completion yields `None`.
#[must_use = "a dequeue request does nothing unless awaited"]
pub struct Dequeue<T> {
    queue: AsyncFifoQueue<T>,
    slot: Slot<T>,
}

// The value is moved out by `Option::take`, never pinned in place.
impl<T> Unpin for Dequeue<T> {}

impl<T> Future for Dequeue<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let output = match &mut this.slot {
            Slot::Ready(value) => value.take(),
            Slot::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(value)) => Some(value),
                Poll::Ready(Err(_)) => None,
                Poll::Pending => return Poll::Pending,
            },
            Slot::Done => None,
        };

        this.slot = Slot::Done;
        if output.is_some() {
            this.queue.deliver();
        }
        Poll::Ready(output)
    }
}

impl<T> Drop for Dequeue<T> {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Done) {
            Slot::Ready(Some(value)) => self.queue.restore(value),
            Slot::Waiting(mut rx) => {
                // After `close` no producer can complete the send, so a value
                // is either already here or will go to someone else.
                rx.close();
                if let Ok(value) = rx.try_recv() {
                    self.queue.restore(value);
                }
            }
            Slot::Ready(None) | Slot::Done => {}
        }
    }
}

impl<T> fmt::Debug for Dequeue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot {
            Slot::Ready(Some(_)) => "ready",
            Slot::Ready(None) => "end-of-stream",
            Slot::Waiting(_) => "waiting",
            Slot::Done => "done",
        };
        f.debug_struct("Dequeue").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_value_is_claimed_at_call() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue("a").unwrap();

        let next = queue.dequeue();
        assert!(queue.is_empty());
        assert_eq!(next.await, Some("a"));
    }

    #[tokio::test]
    async fn test_early_consumer_never_buffers() {
        let queue = AsyncFifoQueue::new();
        let next = queue.dequeue();
        assert_eq!(queue.pending_consumers(), 1);

        queue.enqueue(7).unwrap();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.pending_consumers(), 0);
        assert_eq!(next.await, Some(7));
        assert_eq!(queue.metrics().handed_off(), 1);
    }

    #[tokio::test]
    async fn test_dropped_ready_request_restores_head() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        drop(queue.dequeue());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().await, Some(1));
        assert_eq!(queue.dequeue().await, Some(2));
    }

    #[tokio::test]
    async fn test_dropped_waiting_request_after_hand_off_restores_value() {
        let queue = AsyncFifoQueue::new();
        let abandoned = queue.dequeue();
        queue.enqueue(5).unwrap();
        drop(abandoned);

        assert_eq!(queue.try_dequeue(), Some(5));
    }

    #[tokio::test]
    async fn test_abandoned_request_is_skipped() {
        let queue = AsyncFifoQueue::new();
        let abandoned = queue.dequeue();
        let live = queue.dequeue();
        drop(abandoned);

        queue.enqueue(9).unwrap();
        assert_eq!(live.await, Some(9));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_restore_after_close_is_still_drained() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue(3).unwrap();
        let claimed = queue.dequeue();
        queue.close();
        drop(claimed);

        assert_eq!(queue.dequeue().await, Some(3));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_dropped_claim_after_close_reaches_later_request() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue(3).unwrap();
        let claimed = queue.dequeue();
        queue.close();

        // The claimed value may still come back, so this is not end-of-stream.
        let later = queue.dequeue();
        assert_eq!(queue.pending_consumers(), 1);

        drop(claimed);
        assert_eq!(later.await, Some(3));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_end_of_stream_waits_for_outstanding_claim() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue(3).unwrap();
        let claimed = queue.dequeue();
        queue.close();
        let waiting = queue.dequeue();

        assert_eq!(claimed.await, Some(3));
        assert_eq!(queue.pending_consumers(), 0);
        assert_eq!(waiting.await, None);
        assert_eq!(queue.dequeue().await, None);
        assert_eq!(queue.metrics().dequeued(), 1);
    }

    #[tokio::test]
    async fn test_close_with_handed_off_value_keeps_waiters() {
        let queue = AsyncFifoQueue::new();
        let first = queue.dequeue();
        let second = queue.dequeue();
        queue.enqueue(1).unwrap();
        queue.close();

        // `first` holds 1 and could still give it back.
        assert_eq!(queue.pending_consumers(), 1);
        drop(first);
        assert_eq!(second.await, Some(1));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_poll_after_completion_yields_none() {
        let queue = AsyncFifoQueue::new();
        queue.enqueue(1).unwrap();

        let mut next = queue.dequeue();
        assert_eq!((&mut next).await, Some(1));
        assert_eq!((&mut next).await, None);
        assert_eq!(queue.metrics().dequeued(), 1);
    }

    #[test]
    fn test_try_dequeue() {
        let queue = AsyncFifoQueue::new();
        assert_eq!(queue.try_dequeue(), None);
        queue.enqueue(4u8).unwrap();
        assert_eq!(queue.try_dequeue(), Some(4));
        assert_eq!(queue.metrics().enqueued(), 1);
        assert_eq!(queue.metrics().dequeued(), 1);
    }
}
