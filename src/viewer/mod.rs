//! Viewer connection lifecycle
//!
//! Wraps the shared state's viewer operations with transport-session
//! timing: admission (or a distinguishable rejection), the initial
//! snapshot send, the two-strike heartbeat sweep, and removal.

pub mod registry;

pub use registry::ViewerRegistry;
