//! Status notification fan-out
//!
//! Stateless push of status snapshots to every admitted viewer channel on
//! every stream or viewer-count change.

pub mod hub;

pub use hub::NotificationHub;
