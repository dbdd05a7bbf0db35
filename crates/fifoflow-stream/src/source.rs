//! The readable side of a copy.

use crate::error::SourceError;
use futures_core::Stream;
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;

/// A pull-based producer of chunks.
///
/// The copy controller calls [`next_chunk`](Self::next_chunk) only while the
/// sink has room, so not calling it *is* the pause for a pull source. Sources
/// that are fed from elsewhere (see [`push_source`](crate::push_source)) can
/// also observe [`pause`](Self::pause) and [`resume`](Self::resume) and
/// forward them to their producer.
///
/// Uses `impl Future` return types; implementors can simply write
/// `async fn next_chunk(&mut self) -> ...`.
pub trait ChunkSource: Send {
    type Chunk: Send;

    /// Produces the next chunk, or `Ok(None)` at end of data.
    ///
    /// Not called again after it returns `Ok(None)` or an error.
    fn next_chunk(
        &mut self,
    ) -> impl Future<Output = Result<Option<Self::Chunk>, SourceError>> + Send;

    /// The sink is full; production should stop.
    fn pause(&mut self) {}

    /// The sink drained; production may continue.
    fn resume(&mut self) {}

    /// The copy is being torn down and the source is detached.
    fn cancel(&mut self) {}
}

/// [`ChunkSource`] over any fallible [`Stream`].
///
/// Each `Ok` item is a chunk; the first `Err` fails the source; the end of
/// the stream is the end of data.
pub struct StreamSource<S> {
    stream: Pin<Box<S>>,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
        }
    }
}

impl<S, C, E> ChunkSource for StreamSource<S>
where
    S: Stream<Item = Result<C, E>> + Send,
    C: Send,
    E: Into<SourceError>,
{
    type Chunk = C;

    async fn next_chunk(&mut self) -> Result<Option<C>, SourceError> {
        self.stream.next().await.transpose().map_err(Into::into)
    }
}

/// Exposes a [`ChunkSource`] as a [`Stream`] of chunks.
///
/// The stream ends at end of data, or right after yielding the source's
/// first error.
pub fn source_stream<S>(source: S) -> impl Stream<Item = Result<S::Chunk, SourceError>> + Send
where
    S: ChunkSource,
{
    futures_util::stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(source))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}
