//! Configuration for flow-controlled copies.

use std::time::Duration;

/// Configuration for sinks and the copy controller.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Buffered weight at which a [`MemorySink`](crate::MemorySink) reports
    /// itself full and the copy throttles.
    ///
    /// Default: 16 KiB
    pub high_water_mark: usize,

    /// Longest the controller waits for a single drain signal.
    ///
    /// `None` waits indefinitely.
    ///
    /// Default: `None`
    pub drain_timeout: Option<Duration>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 16 * 1024,
            drain_timeout: None,
        }
    }
}

impl FlowConfig {
    /// Small buffers: the source is throttled early and latency stays low.
    pub fn low_latency() -> Self {
        Self {
            high_water_mark: 1024,
            drain_timeout: None,
        }
    }

    /// Large buffers: fewer throttle round trips per byte copied.
    pub fn high_throughput() -> Self {
        Self {
            high_water_mark: 256 * 1024,
            drain_timeout: None,
        }
    }

    /// Sets the high-water mark.
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    /// Sets the drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }
}
