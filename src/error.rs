//! Crate-level error type
//!
//! Each subsystem carries its own error enum; this aggregates them for
//! callers that wire the whole relay together.

use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::PublishReject;
use crate::state::StateError;
use crate::transcoder::SupervisorError;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Publish(#[from] PublishReject),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-level result alias
pub type Result<T> = std::result::Result<T, Error>;
