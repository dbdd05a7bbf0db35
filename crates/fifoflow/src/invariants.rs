//! Debug assertion macros for queue invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Buffered / pending exclusivity
// =============================================================================

/// Assert that the queue never holds buffered values while consumers wait.
///
/// **Invariant**: `buffered.is_empty() || pending.is_empty()`
///
/// Used in: `enqueue()`, `dequeue()`, `restore()`
macro_rules! debug_assert_exclusive {
    ($buffered:expr, $pending:expr) => {
        debug_assert!(
            $buffered == 0 || $pending == 0,
            "queue holds {} buffered values while {} consumers are pending",
            $buffered,
            $pending
        )
    };
}

// =============================================================================
// End-of-stream only once drained
// =============================================================================

/// Assert that end-of-stream is reported only for a closed queue with no
/// buffered values and no claimed value that could still be put back.
///
/// **Invariant**: `yield None → closed ∧ claimed == 0 ∧ buffered.is_empty()`
///
/// Used in: `dequeue()` when resolving immediately to `None`
macro_rules! debug_assert_end_of_stream {
    ($closed:expr, $claimed:expr, $buffered:expr) => {
        debug_assert!(
            $closed && $claimed == 0 && $buffered == 0,
            "end-of-stream reported with closed={}, {} claimed and {} buffered values",
            $closed,
            $claimed,
            $buffered
        )
    };
}

// =============================================================================
// No pending requests once drained
// =============================================================================

/// Assert that a drained queue keeps no pending consumer requests.
///
/// **Invariant**: `closed ∧ claimed == 0 ∧ buffered.is_empty() → pending.is_empty()`
///
/// Used in: `State::settle()` after `close()` and after each delivery
macro_rules! debug_assert_no_pending_after_drain {
    ($drained:expr, $pending:expr) => {
        debug_assert!(
            !$drained || $pending == 0,
            "drained queue still tracks {} pending consumers",
            $pending
        )
    };
}

pub(crate) use debug_assert_end_of_stream;
pub(crate) use debug_assert_exclusive;
pub(crate) use debug_assert_no_pending_after_drain;
