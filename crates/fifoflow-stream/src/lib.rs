//! Stream adapters and backpressure-aware copying for fifoflow
//!
//! This crate builds the flow-control layer on top of
//! [`fifoflow::AsyncFifoQueue`]:
//!
//! - **Async iteration**: [`QueueStream`] turns a queue into a
//!   [`futures_core::Stream`] that ends at the queue's end-of-stream.
//! - **Push-to-pull bridge**: [`push_source`] lets callback-style producers
//!   feed a queue that the copy pulls from, with cooperative pause/resume.
//! - **Backpressure**: [`copy`] / [`FlowController`] move chunks from a
//!   [`ChunkSource`] into a capacity-limited [`ChunkSink`], pausing the
//!   source whenever the sink reports full and resuming on its drain signal.
//! - **Teardown**: the first error from either side, an [`AbortSignal`], or a
//!   drain timeout ends the copy, detaches both endpoints and is reported
//!   once.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use fifoflow_stream::{copy_with_config, memory_sink, push_source, FlowConfig};
//!
//! let config = FlowConfig::default().with_high_water_mark(4);
//! let (producer, source) = push_source::<Vec<u8>>();
//! let (sink, mut reader) = memory_sink(&config);
//!
//! let feeder = tokio::spawn(async move {
//!     for i in 0..16u8 {
//!         if !producer.push(vec![i]).unwrap() {
//!             producer.wait_resumed().await;
//!         }
//!     }
//!     producer.end();
//! });
//!
//! let copied = tokio::spawn(copy_with_config(source, sink, config));
//! let mut received = Vec::new();
//! while let Some(chunk) = reader.read().await {
//!     received.extend(chunk);
//! }
//!
//! feeder.await.unwrap();
//! let stats = copied.await.unwrap().unwrap();
//! assert_eq!(received, (0..16).collect::<Vec<u8>>());
//! assert_eq!(stats.chunks_copied, 16);
//! # }
//! ```

mod abort;
mod config;
mod error;
mod flow;
mod invariants;
mod memory;
mod push;
mod sink;
mod source;
mod stream;

pub use abort::AbortSignal;
pub use config::FlowConfig;
pub use error::{CopyError, SinkError, SourceError};
pub use flow::{copy, copy_with_config, spawn_copy, CopyStats, FlowController, FlowState};
pub use memory::{memory_sink, MemorySink, SinkReader};
pub use push::{push_source, PushHandle, PushSource};
pub use sink::{write_with_backpressure, ChunkSink, Weighted};
pub use source::{source_stream, ChunkSource, StreamSource};
pub use stream::{into_stream, QueueStream};

pub use fifoflow::{AsyncFifoQueue, ClosedQueueError};

// Re-export useful stream combinators
pub use tokio_stream::StreamExt;
