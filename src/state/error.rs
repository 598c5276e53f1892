//! State mutation error types
//!
//! Invariant violations are reported as typed failures to the immediate
//! caller, never panics — races like a second publisher arriving while a
//! stream is live are expected under concurrent access.

use thiserror::Error;

/// Error type for shared-state operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A stream is already live (single-publisher invariant)
    #[error("a stream is already live")]
    AlreadyLive,

    /// Viewer capacity reached; no session was created
    #[error("viewer capacity reached ({0} viewers)")]
    RoomFull(usize),
}
