//! Ingest admission control
//!
//! Translates ingest-protocol lifecycle events (pre-publish, publish
//! confirmed, publish ended) into shared-state and supervisor operations.
//! This is where the single-publisher invariant is enforced, before any
//! resource is committed to a session.

pub mod gate;
pub mod path;

pub use gate::{PublishGate, PublishReject, PublishSession};
pub use path::PublishPath;
