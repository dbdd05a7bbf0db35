//! Async iteration over an [`AsyncFifoQueue`].

use fifoflow::{AsyncFifoQueue, Dequeue};
use futures_core::{FusedStream, Stream};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// [`Stream`] adapter yielding the values of an [`AsyncFifoQueue`].
///
/// Yields values in enqueue order and ends when the queue is closed and
/// drained. The end-of-stream marker itself is never yielded. The stream is
/// not restartable: once it has returned `None` it keeps returning `None`.
///
/// At most one dequeue request is in flight. Dropping the stream while that
/// request holds a value puts the value back into the queue.
#[derive(Debug)]
pub struct QueueStream<T> {
    queue: AsyncFifoQueue<T>,
    in_flight: Option<Dequeue<T>>,
    terminated: bool,
}

impl<T> QueueStream<T> {
    pub fn new(queue: AsyncFifoQueue<T>) -> Self {
        Self {
            queue,
            in_flight: None,
            terminated: false,
        }
    }

    /// The underlying queue; producers may keep a clone of it.
    pub fn queue(&self) -> &AsyncFifoQueue<T> {
        &self.queue
    }
}

/// Wraps `queue` in a [`QueueStream`].
pub fn into_stream<T>(queue: AsyncFifoQueue<T>) -> QueueStream<T> {
    QueueStream::new(queue)
}

impl<T> Stream for QueueStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        let request = this.in_flight.get_or_insert_with(|| this.queue.dequeue());
        match Pin::new(request).poll(cx) {
            Poll::Ready(item) => {
                this.in_flight = None;
                this.terminated = item.is_none();
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Other clones of the queue may take buffered values first.
        if self.terminated {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

impl<T> FusedStream for QueueStream<T> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
