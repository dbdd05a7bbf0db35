//! Bounded in-memory sink with a separate reader half.

use crate::config::FlowConfig;
use crate::error::SinkError;
#[cfg(debug_assertions)]
use crate::invariants::debug_assert_drain_signaled;
use crate::sink::{ChunkSink, Weighted};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Creates a sink whose buffer is bounded by `config.high_water_mark`, and
/// the reader that empties it.
///
/// The sink reports full once the buffered weight reaches the high-water
/// mark and signals drain when the reader has emptied the buffer again.
pub fn memory_sink<C: Weighted + Send>(config: &FlowConfig) -> (MemorySink<C>, SinkReader<C>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SinkState {
            chunks: VecDeque::new(),
            weight: 0,
            high_water_mark: config.high_water_mark,
            needs_drain: false,
            finished: false,
            aborted: false,
            failure: None,
        }),
        drain: Notify::new(),
        readable: Notify::new(),
    });

    (
        MemorySink {
            shared: Arc::clone(&shared),
        },
        SinkReader { shared },
    )
}

struct Shared<C> {
    state: Mutex<SinkState<C>>,
    /// Wakes writers waiting in `drained()`.
    drain: Notify,
    /// Wakes the reader when chunks arrive or the sink ends.
    readable: Notify,
}

impl<C> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, SinkState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SinkState<C> {
    chunks: VecDeque<C>,
    weight: usize,
    high_water_mark: usize,
    /// Set when a write filled the buffer; cleared by the drain signal.
    needs_drain: bool,
    finished: bool,
    aborted: bool,
    failure: Option<SinkError>,
}

impl<C> SinkState<C> {
    fn check_open(&self) -> Result<(), SinkError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if self.aborted {
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.finished || self.aborted || self.failure.is_some()
    }
}

/// Writer half of a [`memory_sink`].
pub struct MemorySink<C> {
    shared: Arc<Shared<C>>,
}

impl<C> MemorySink<C> {
    /// Returns `true` while the sink waits for its reader to drain it.
    pub fn is_full(&self) -> bool {
        self.shared.lock().needs_drain
    }

    /// Total weight of the chunks not yet read.
    pub fn buffered_weight(&self) -> usize {
        self.shared.lock().weight
    }
}

impl<C: Weighted + Send> ChunkSink for MemorySink<C> {
    type Chunk = C;

    fn write(&mut self, chunk: C) -> Result<bool, SinkError> {
        let has_room = {
            let mut state = self.shared.lock();
            state.check_open()?;
            if state.finished {
                return Err(SinkError::Closed);
            }

            state.weight += chunk.weight();
            state.chunks.push_back(chunk);
            let has_room = state.weight < state.high_water_mark;
            if !has_room {
                state.needs_drain = true;
            }
            has_room
        };

        self.shared.readable.notify_one();
        Ok(has_room)
    }

    async fn drained(&mut self) -> Result<(), SinkError> {
        loop {
            let notified = self.shared.drain.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.lock();
                state.check_open()?;
                if !state.needs_drain {
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        {
            let mut state = self.shared.lock();
            state.check_open()?;
            state.finished = true;
        }
        self.shared.readable.notify_one();
        Ok(())
    }

    fn abort(&mut self) {
        {
            let mut state = self.shared.lock();
            state.aborted = true;
            state.chunks.clear();
            state.weight = 0;
            state.needs_drain = false;
        }
        self.shared.drain.notify_waiters();
        self.shared.readable.notify_one();
    }
}

/// Reader half of a [`memory_sink`].
///
/// Dropping the reader before the sink finishes disconnects the sink: later
/// writes and drain waits fail with [`SinkError::Disconnected`].
pub struct SinkReader<C> {
    shared: Arc<Shared<C>>,
}

impl<C: Weighted> SinkReader<C> {
    /// Takes the oldest chunk, waiting for one if the buffer is empty.
    ///
    /// Returns `None` once the sink is finished and emptied, aborted, or
    /// failed.
    pub async fn read(&mut self) -> Option<C> {
        loop {
            let next = {
                let mut state = self.shared.lock();
                match state.chunks.pop_front() {
                    Some(chunk) => {
                        state.weight -= chunk.weight();
                        let was_full = state.needs_drain;
                        let signal = was_full && state.chunks.is_empty();
                        if signal {
                            state.needs_drain = false;
                        }

                        #[cfg(debug_assertions)]
                        debug_assert_drain_signaled!(was_full, state.chunks.len(), signal);

                        Some((chunk, signal))
                    }
                    None if state.is_done() => return None,
                    None => None,
                }
            };

            if let Some((chunk, signal)) = next {
                if signal {
                    self.shared.drain.notify_waiters();
                }
                return Some(chunk);
            }

            self.shared.readable.notified().await;
        }
    }

    /// Reads until the sink ends.
    pub async fn read_all(&mut self) -> Vec<C> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.read().await {
            chunks.push(chunk);
        }
        chunks
    }
}

impl<C> SinkReader<C> {
    /// Fails the sink from the downstream side, e.g. a write to the
    /// underlying resource failed. Only the first failure is kept.
    pub fn fail(&self, error: SinkError) {
        {
            let mut state = self.shared.lock();
            if state.failure.is_none() {
                state.failure = Some(error);
            }
        }
        self.shared.drain.notify_waiters();
    }

    /// Returns `true` once the writer called `finish`.
    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    /// Returns `true` once the writer aborted.
    pub fn is_aborted(&self) -> bool {
        self.shared.lock().aborted
    }

    /// Total weight of the chunks not yet read.
    pub fn buffered_weight(&self) -> usize {
        self.shared.lock().weight
    }
}

impl<C> Drop for SinkReader<C> {
    fn drop(&mut self) {
        let disconnected = {
            let mut state = self.shared.lock();
            let open = !state.is_done();
            if open {
                state.failure = Some(SinkError::Disconnected);
            }
            open
        };
        if disconnected {
            self.shared.drain.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_sink() -> (MemorySink<Vec<u8>>, SinkReader<Vec<u8>>) {
        memory_sink(&FlowConfig::default().with_high_water_mark(4))
    }

    #[tokio::test]
    async fn test_write_reports_capacity() {
        let (mut sink, _reader) = small_sink();

        assert_eq!(sink.write(vec![0; 2]), Ok(true));
        assert_eq!(sink.write(vec![0; 1]), Ok(true));
        assert_eq!(sink.write(vec![0; 1]), Ok(false));
        assert!(sink.is_full());
        // Over capacity is still accepted.
        assert_eq!(sink.write(vec![0; 3]), Ok(false));
        assert_eq!(sink.buffered_weight(), 7);
    }

    #[tokio::test]
    async fn test_drain_fires_when_reader_empties_buffer() {
        let (mut sink, mut reader) = small_sink();
        sink.write(vec![1, 2, 3, 4]).unwrap();
        sink.write(vec![5]).unwrap();

        let writer = tokio::spawn(async move {
            sink.drained().await.unwrap();
            sink
        });

        assert_eq!(reader.read().await, Some(vec![1, 2, 3, 4]));
        tokio::task::yield_now().await;
        assert!(!writer.is_finished());

        assert_eq!(reader.read().await, Some(vec![5]));
        let sink = tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .expect("drain not signaled")
            .unwrap();
        assert!(!sink.is_full());
    }

    #[tokio::test]
    async fn test_drained_is_immediate_when_not_full() {
        let (mut sink, _reader) = small_sink();
        sink.write(vec![1]).unwrap();
        sink.drained().await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_ends_reader_after_last_chunk() {
        let (mut sink, mut reader) = small_sink();
        sink.write(vec![1]).unwrap();
        sink.finish().await.unwrap();

        assert_eq!(reader.read_all().await, vec![vec![1]]);
        assert!(reader.is_finished());
        assert_eq!(sink.write(vec![2]), Err(SinkError::Closed));
    }

    #[tokio::test]
    async fn test_reader_failure_wakes_drain_waiter() {
        let (mut sink, reader) = small_sink();
        sink.write(vec![0; 8]).unwrap();

        let writer = tokio::spawn(async move { sink.drained().await });
        tokio::task::yield_now().await;
        reader.fail(SinkError::Write("disk full".into()));

        assert_eq!(
            writer.await.unwrap(),
            Err(SinkError::Write("disk full".into()))
        );
    }

    #[tokio::test]
    async fn test_dropped_reader_disconnects_sink() {
        let (mut sink, reader) = small_sink();
        drop(reader);

        assert_eq!(sink.write(vec![1]), Err(SinkError::Disconnected));
        assert_eq!(sink.drained().await, Err(SinkError::Disconnected));
    }

    #[tokio::test]
    async fn test_abort_discards_buffer() {
        let (mut sink, mut reader) = small_sink();
        sink.write(vec![1, 2]).unwrap();
        sink.abort();

        assert!(reader.is_aborted());
        assert_eq!(reader.buffered_weight(), 0);
        assert_eq!(reader.read().await, None);
    }
}
