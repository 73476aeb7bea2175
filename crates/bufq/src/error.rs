//! Error surface of the queue.
//!
//! The taxonomy is intentionally tiny: `Closed` is terminal and sticky,
//! `WouldBlock` is transient and leaves the queue untouched. Misuse — bad
//! dimensions, oversized commits, oversized allocation requests — indicates a
//! bug in the I/O driver above the queue and panics instead of surfacing as a
//! recoverable error.

use thiserror::Error;

/// Convenience result alias for fallible queue operations.
pub type QueueResult<T, E = QueueError> = Result<T, E>;

/// Errors surfaced by [`Queue`](crate::Queue) operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is closed and drained; retrying is pointless.
    #[error("queue closed")]
    Closed,

    /// A non-blocking call found insufficient capacity or nothing to consume.
    #[error("would block")]
    WouldBlock,
}
