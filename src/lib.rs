//! # lancast
//!
//! Single-streamer, LAN-only video broadcast relay: accepts one live
//! publish session, re-encodes it into adaptive multi-quality HLS via an
//! external transcode process, and fans real-time status out to a bounded
//! set of viewer channels.
//!
//! This crate is the stream lifecycle orchestrator. It admits or rejects
//! the publisher under a single-publisher invariant, supervises the
//! transcode process tied to that session, keeps one consistent picture
//! of "is a stream live, and who is watching", and enforces a race-free
//! bounded viewer registry. The protocol listeners, the segment file
//! server and the player are external collaborators that drive it through
//! [`ingest::PublishGate`], [`viewer::ViewerRegistry`] and
//! [`state::SharedState::snapshot`].
//!
//! ## Example
//!
//! ```no_run
//! use lancast::{Relay, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> lancast::Result<()> {
//!     let relay = Relay::start(ServerConfig::default()).await?;
//!
//!     // Hand relay.gate() to the ingest listener, relay.viewers() to the
//!     // viewer transport, relay.status() to the HTTP status endpoint.
//!
//!     tokio::signal::ctrl_c().await?;
//!     relay.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod relay;
pub mod state;
pub mod transcoder;
pub mod viewer;

pub use config::{QualityTier, ServerConfig};
pub use error::{Error, Result};
pub use relay::Relay;
pub use state::{SharedState, StatusSnapshot};
pub use transcoder::TranscodeSupervisor;
