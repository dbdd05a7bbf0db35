//! Backpressure-aware copy from a [`ChunkSource`] to a [`ChunkSink`].

use crate::abort::AbortSignal;
use crate::config::FlowConfig;
use crate::error::CopyError;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_drained_before_finish, debug_assert_not_throttled};
use crate::sink::ChunkSink;
use crate::source::ChunkSource;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Where a copy is in its lifecycle.
///
/// `Flowing ⇄ Throttled`, then `Finished` on source completion or `Failed`
/// on the first error, from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Pulling from the source and writing to the sink.
    Flowing,
    /// Sink is full; the source is paused until the sink drains.
    Throttled,
    Finished,
    Failed,
}

impl FlowState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Summary of a successful copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Chunks written to the sink.
    pub chunks_copied: u64,
    /// Times the sink reported full and the source was paused.
    pub throttle_count: u64,
}

/// Moves chunks from a source to a capacity-limited sink.
///
/// Each chunk pulled from the source is written to the sink straight away,
/// so the controller itself never holds more than one chunk. When a write
/// reports the sink full the controller pauses the source and pulls nothing
/// until the sink signals drain. At end of data the sink is finished, which
/// only happens after any outstanding drain.
///
/// The first error from either side, an abort, or a drain timeout ends the
/// copy: the source is cancelled, the sink aborted, and the error returned.
/// [`run`](Self::run) consumes the controller, so the outcome is delivered
/// exactly once.
pub struct FlowController<S, K> {
    source: S,
    sink: K,
    config: FlowConfig,
    abort: Option<AbortSignal>,
    state: watch::Sender<FlowState>,
    stats: CopyStats,
}

impl<S, K> FlowController<S, K>
where
    S: ChunkSource,
    K: ChunkSink<Chunk = S::Chunk>,
{
    pub fn new(source: S, sink: K) -> Self {
        let (state, _) = watch::channel(FlowState::Flowing);
        Self {
            source,
            sink,
            config: FlowConfig::default(),
            abort: None,
            state,
            stats: CopyStats::default(),
        }
    }

    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Lets `signal` cancel the copy while it runs.
    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        *self.state.borrow()
    }

    /// Watches state transitions, including after `run` takes the controller.
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    /// Runs the copy to completion.
    pub async fn run(mut self) -> Result<CopyStats, CopyError> {
        match self.pump().await {
            Ok(()) => {
                self.set_state(FlowState::Finished);
                debug!(
                    chunks = self.stats.chunks_copied,
                    throttles = self.stats.throttle_count,
                    "copy finished"
                );
                Ok(self.stats)
            }
            Err(e) => {
                self.set_state(FlowState::Failed);
                self.source.cancel();
                self.sink.abort();
                warn!(error = %e, chunks = self.stats.chunks_copied, "copy failed");
                Err(e)
            }
        }
    }

    async fn pump(&mut self) -> Result<(), CopyError> {
        loop {
            #[cfg(debug_assertions)]
            debug_assert_not_throttled!(self.state());

            let next = guarded(self.abort.as_ref(), self.source.next_chunk()).await?;
            let Some(chunk) = next else {
                break;
            };

            let has_room = self.sink.write(chunk)?;
            self.stats.chunks_copied += 1;
            if !has_room {
                self.throttle().await?;
            }
        }

        #[cfg(debug_assertions)]
        debug_assert_drained_before_finish!(self.state() == FlowState::Throttled);

        trace!(chunks = self.stats.chunks_copied, "source ended, finishing sink");
        guarded(self.abort.as_ref(), self.sink.finish()).await
    }

    /// Pauses the source until the sink drains.
    async fn throttle(&mut self) -> Result<(), CopyError> {
        self.set_state(FlowState::Throttled);
        self.stats.throttle_count += 1;
        self.source.pause();
        trace!(chunks = self.stats.chunks_copied, "sink full, source paused");

        let abort = self.abort.as_ref();
        let drained = self.sink.drained();
        match self.config.drain_timeout {
            None => guarded(abort, drained).await?,
            Some(limit) => {
                guarded(abort, async move {
                    match tokio::time::timeout(limit, drained).await {
                        Ok(result) => result.map_err(CopyError::from),
                        Err(_) => Err(CopyError::DrainTimeout(limit)),
                    }
                })
                .await?;
            }
        }

        self.source.resume();
        self.set_state(FlowState::Flowing);
        trace!("sink drained, source resumed");
        Ok(())
    }

    fn set_state(&self, next: FlowState) {
        self.state.send_replace(next);
    }
}

/// Awaits `fut` unless `abort` fires first.
async fn guarded<T, E, F>(abort: Option<&AbortSignal>, fut: F) -> Result<T, CopyError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<CopyError>,
{
    let Some(signal) = abort else {
        return fut.await.map_err(Into::into);
    };
    if signal.is_aborted() {
        return Err(CopyError::Aborted);
    }

    tokio::select! {
        biased;
        () = signal.aborted() => Err(CopyError::Aborted),
        result = fut => result.map_err(Into::into),
    }
}

/// Copies everything from `source` into `sink` with the default config.
pub async fn copy<S, K>(source: S, sink: K) -> Result<CopyStats, CopyError>
where
    S: ChunkSource,
    K: ChunkSink<Chunk = S::Chunk>,
{
    FlowController::new(source, sink).run().await
}

/// Copies everything from `source` into `sink`.
pub async fn copy_with_config<S, K>(
    source: S,
    sink: K,
    config: FlowConfig,
) -> Result<CopyStats, CopyError>
where
    S: ChunkSource,
    K: ChunkSink<Chunk = S::Chunk>,
{
    FlowController::new(source, sink)
        .with_config(config)
        .run()
        .await
}

/// Runs a copy on a new task and reports the outcome to `on_done`.
///
/// `on_done` is called exactly once, with the result of the copy. The
/// returned [`AbortSignal`] cancels the copy.
pub fn spawn_copy<S, K, F>(
    source: S,
    sink: K,
    config: FlowConfig,
    on_done: F,
) -> (JoinHandle<()>, AbortSignal)
where
    S: ChunkSource + 'static,
    K: ChunkSink<Chunk = S::Chunk> + 'static,
    F: FnOnce(Result<CopyStats, CopyError>) + Send + 'static,
{
    let signal = AbortSignal::new();
    let controller = FlowController::new(source, sink)
        .with_config(config)
        .with_abort(signal.clone());

    let handle = tokio::spawn(async move {
        on_done(controller.run().await);
    });
    (handle, signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SinkError, SourceError};
    use crate::memory::memory_sink;
    use crate::source::StreamSource;
    use futures::stream;

    fn chunks(n: u8) -> StreamSource<impl futures::Stream<Item = Result<Vec<u8>, SourceError>>> {
        StreamSource::new(stream::iter((0..n).map(|i| Ok(vec![i]))))
    }

    #[tokio::test]
    async fn test_copy_without_backpressure() {
        let (sink, mut reader) = memory_sink(&FlowConfig::default());

        let stats = copy(chunks(5), sink).await.unwrap();
        assert_eq!(stats.chunks_copied, 5);
        assert_eq!(stats.throttle_count, 0);
        assert_eq!(reader.read_all().await.concat(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let config = FlowConfig::default().with_high_water_mark(2);
        let (sink, mut reader) = memory_sink(&config);
        let controller = FlowController::new(chunks(4), sink).with_config(config);
        let mut states = controller.subscribe();
        assert_eq!(controller.state(), FlowState::Flowing);

        let task = tokio::spawn(controller.run());
        states
            .wait_for(|s| *s == FlowState::Throttled)
            .await
            .unwrap();

        assert_eq!(reader.read_all().await.len(), 4);
        let stats = task.await.unwrap().unwrap();
        assert_eq!(*states.borrow(), FlowState::Finished);
        assert!(states.borrow().is_terminal());
        assert_eq!(stats.throttle_count, 2);
    }

    #[tokio::test]
    async fn test_sink_write_error_fails_copy() {
        let (sink, reader) = memory_sink::<Vec<u8>>(&FlowConfig::default());
        reader.fail(SinkError::Write("broken pipe".into()));

        let err = copy(chunks(3), sink).await.unwrap_err();
        assert_eq!(err, CopyError::Sink(SinkError::Write("broken pipe".into())));
        assert!(err.is_sink());
        assert!(reader.is_aborted());
    }
}
