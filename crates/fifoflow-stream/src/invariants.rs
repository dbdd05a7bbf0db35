//! Debug assertion macros for flow-control invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// No pull while throttled
// =============================================================================

/// Assert that the source is never pulled while the sink is full.
///
/// **Invariant**: `pull_next_chunk → state == Flowing`
///
/// Used in: `FlowController::pump()` before each pull
macro_rules! debug_assert_not_throttled {
    ($state:expr) => {
        debug_assert!(
            $state == $crate::flow::FlowState::Flowing,
            "source pulled while controller is {:?}",
            $state
        )
    };
}

// =============================================================================
// Drain before finish
// =============================================================================

/// Assert that the sink is finished only after its last drain.
///
/// **Invariant**: `sink.finish() → last write had room ∨ drain observed`
///
/// Used in: `FlowController::pump()` on source completion
macro_rules! debug_assert_drained_before_finish {
    ($awaiting_drain:expr) => {
        debug_assert!(
            !$awaiting_drain,
            "sink finished while a drain signal was still outstanding"
        )
    };
}

// =============================================================================
// Drain signal after emptying
// =============================================================================

/// Assert that a full sink emits drain once its buffer empties.
///
/// **Invariant**: `was_full ∧ buffered == 0 → drain_notified`
///
/// Used in: `SinkReader::read()`
macro_rules! debug_assert_drain_signaled {
    ($was_full:expr, $buffered:expr, $signaled:expr) => {
        debug_assert!(
            !($was_full && $buffered == 0) || $signaled,
            "sink emptied after being full but drain was not signaled"
        )
    };
}

pub(crate) use debug_assert_drain_signaled;
pub(crate) use debug_assert_drained_before_finish;
pub(crate) use debug_assert_not_throttled;
