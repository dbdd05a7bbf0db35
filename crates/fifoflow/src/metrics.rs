use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing the traffic through a queue.
///
/// Updated with relaxed atomics, so a snapshot taken while producers are
/// active is only approximately consistent across fields.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    handed_off: AtomicU64,
}

impl QueueMetrics {
    /// Values accepted by `enqueue`.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Values delivered to a consumer.
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Values passed straight to a waiting consumer, never buffered.
    pub fn handed_off(&self) -> u64 {
        self.handed_off.load(Ordering::Relaxed)
    }

    pub(crate) fn record_enqueue(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeue(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hand_off(&self) {
        self.handed_off.fetch_add(1, Ordering::Relaxed);
    }
}
