//! Transcode process lifecycle
//!
//! Owns the external transcode process for at most one publish session at
//! a time: spawn, stderr monitoring, graceful-then-forced termination,
//! crash detection, and output artifact cleanup.
//!
//! State machine:
//!
//! ```text
//!   Idle ──start()──► Starting ──spawned──► Running
//!                                              │
//!                   ┌──────────────────────────┤
//!                   ▼                          ▼
//!               Stopping ◄──stop()         Crashed ◄──spontaneous exit
//!                   │                          │
//!                   └──────────► Idle ◄────────┘
//! ```
//!
//! Exactly one monitor task owns the child process; both the stop path and
//! the crash path resolve through it, so exit handling and artifact
//! cleanup happen exactly once even when the two race.

pub mod artifacts;
pub mod command;
pub mod error;
pub mod supervisor;

pub use artifacts::OutputLayout;
pub use command::TranscodeInvocation;
pub use error::SupervisorError;
pub use supervisor::{Phase, TranscodeSupervisor};
