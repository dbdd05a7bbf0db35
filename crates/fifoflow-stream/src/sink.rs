//! The writable side of a copy.

use crate::error::SinkError;
use std::future::Future;

/// A consumer of chunks with bounded internal capacity.
///
/// `write` never blocks: it always takes the chunk and reports whether there
/// is still room. Once it reports `false` the writer is expected to wait for
/// [`drained`](Self::drained) before writing more.
pub trait ChunkSink: Send {
    type Chunk: Send;

    /// Accepts `chunk`, returning `true` if more room remains and `false` if
    /// the buffer is now at or over capacity.
    fn write(&mut self, chunk: Self::Chunk) -> Result<bool, SinkError>;

    /// Completes on the drain signal, or immediately if the sink is not full.
    fn drained(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Signals that no more chunks will be written.
    fn finish(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Tears the sink down after a failed or cancelled copy.
    fn abort(&mut self) {}
}

/// Size of a chunk as counted against a sink's high-water mark.
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for &'static [u8] {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for &'static str {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for Box<[u8]> {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Writes one chunk, waiting for the drain signal if the sink reports full.
///
/// This is the single-write form of what [`copy`](crate::copy) does in a loop.
pub async fn write_with_backpressure<K: ChunkSink>(
    sink: &mut K,
    chunk: K::Chunk,
) -> Result<(), SinkError> {
    if !sink.write(chunk)? {
        sink.drained().await?;
    }
    Ok(())
}
