//! Error types for sources, sinks and copies.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a chunk source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Reading the next chunk failed.
    #[error("read failed: {0}")]
    Read(String),

    /// The producer went away without signaling end of data.
    #[error("source disconnected")]
    Disconnected,

    /// A chunk was pushed after the source ended or was cancelled.
    #[error("source has already ended")]
    Ended,
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Read(e.to_string())
    }
}

/// Failure reported by a chunk sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Writing a chunk failed.
    #[error("write failed: {0}")]
    Write(String),

    /// The downstream reader went away.
    #[error("sink disconnected")]
    Disconnected,

    /// The sink no longer accepts chunks (finished or aborted).
    #[error("sink is closed")]
    Closed,
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        Self::Write(e.to_string())
    }
}

/// Why a copy did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// The copy was cancelled through its [`AbortSignal`](crate::AbortSignal).
    #[error("copy aborted")]
    Aborted,

    /// The sink did not drain within the configured timeout.
    #[error("sink did not drain within {0:?}")]
    DrainTimeout(Duration),
}

impl CopyError {
    /// Returns `true` if the source side failed.
    #[inline]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns `true` if the sink side failed, including a drain timeout.
    #[inline]
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink(_) | Self::DrainTimeout(_))
    }
}
