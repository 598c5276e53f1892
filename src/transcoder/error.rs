//! Transcode supervision error types

use std::path::PathBuf;

use thiserror::Error;

/// Error type for supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A transcode process already exists; starting a second is a
    /// programming error, never queued or merged
    #[error("a transcode process is already running")]
    AlreadyRunning,

    /// Output directory could not be prepared; fatal to this session
    #[error("failed to prepare output directory: {0}")]
    OutputDir(#[source] std::io::Error),

    /// The transcode process could not be spawned
    #[error("failed to spawn transcode process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Startup validation of the transcode executable failed; fatal to
    /// orchestrator startup
    #[error("transcode executable {0:?} is missing or not runnable")]
    ExecutableMissing(PathBuf),
}
