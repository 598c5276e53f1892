//! Shared stream state
//!
//! The single source of truth for the current stream status and the active
//! viewer registry. All mutations go through [`SharedState`], which
//! serializes them behind one lock and publishes every change on a
//! broadcast channel.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SharedState>
//!                  ┌──────────────────────────┐
//!                  │ RwLock<Inner> {          │
//!                  │   stream: Stream,        │
//!                  │   viewers: HashMap<Id,   │
//!                  │     ViewerSession>,      │
//!                  │ }                        │
//!                  │ changes: broadcast::Tx   │
//!                  └────────────┬─────────────┘
//!                               │ StateChange { kind, snapshot }
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!      [PublishGate]     [NotificationHub]  [TranscodeSupervisor]
//!      start/stop        fan-out to         stop_stream on crash
//!      stream            viewer channels
//! ```
//!
//! The snapshot carried by each `StateChange` is taken inside the write
//! lock, after the mutation, so subscribers never observe pre-mutation
//! content for a change that already fired.

pub mod error;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod viewer;

pub use error::StateError;
pub use snapshot::{StatusSnapshot, StreamInfo};
pub use store::{ChangeKind, ProbeSweep, SharedState, StateChange};
pub use stream::{LiveStream, Stream, StreamMetadata, UNKNOWN_RESOLUTION};
pub use viewer::{close_code, ChannelMessage, RejectPayload, ViewerChannel, ViewerId, ViewerSession};
