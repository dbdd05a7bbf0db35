//! An unbounded async FIFO queue with end-of-stream signaling.
//!
//! [`AsyncFifoQueue`] decouples producers, who push values whenever they are
//! ready, from a consumer that pulls values one at a time and may ask before
//! the value exists. It is the building block for turning callback-style
//! producers into a pull-based async sequence.
//!
//! # Guarantees
//!
//! - **FIFO**: values are delivered in enqueue order, whether the consumer
//!   asked before or after the value arrived.
//! - **Exactly once**: each value reaches exactly one `dequeue`; dropping an
//!   unfinished request puts its value back.
//! - **Graceful end**: after [`AsyncFifoQueue::close`] buffered values drain
//!   first, then every request resolves to `None`. Once a request has seen
//!   `None`, no value can follow it, even one put back by a dropped request.
//! - **Loud misuse**: enqueueing on a closed queue returns
//!   [`ClosedQueueError`] with the value instead of dropping it.
//!
//! Consumer requests are served in the order `dequeue` was called, so several
//! concurrent readers are tolerated, although one logical reader is the
//! intended use.

mod error;
mod invariants;
mod metrics;
mod queue;

pub use error::ClosedQueueError;
pub use metrics::QueueMetrics;
pub use queue::{AsyncFifoQueue, Dequeue};
