//! Notification hub
//!
//! Subscribes to shared-state changes and fans each one out to every
//! currently-admitted viewer channel. Delivery is at-least-once and
//! best-effort: no acknowledgement, no retry, no cross-channel ordering
//! guarantee. The payload is serialized exactly once per change, and the
//! snapshot it carries was taken after the mutation it reports.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::state::{SharedState, StateChange};

/// Fan-out of status snapshots to viewer channels
pub struct NotificationHub {
    state: Arc<SharedState>,
    changes: broadcast::Receiver<StateChange>,
}

impl NotificationHub {
    /// Create a hub subscribed to the state's change feed
    ///
    /// Subscription happens here, not in `run()`, so no change emitted
    /// after construction can be missed.
    pub fn new(state: Arc<SharedState>) -> Self {
        let changes = state.subscribe();
        Self { state, changes }
    }

    /// Spawn the fan-out loop
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Fan-out loop; returns when the state is dropped
    pub async fn run(mut self) {
        loop {
            let change = match self.changes.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // The next recv yields a newer change carrying a newer
                    // snapshot, so viewers still converge.
                    tracing::warn!(missed, "Notification hub lagged behind state changes");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            self.broadcast(&change).await;
        }
    }

    async fn broadcast(&self, change: &StateChange) {
        let payload = match change.snapshot.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize status snapshot");
                return;
            }
        };

        let channels = self.state.channels().await;
        let mut delivered = 0usize;
        for channel in &channels {
            match channel.send_text(payload.clone()) {
                Ok(()) => delivered += 1,
                // Closed between enumeration and send; removal belongs to
                // the disconnect/heartbeat path, not here.
                Err(_) => tracing::debug!("Skipped closed viewer channel"),
            }
        }

        tracing::debug!(
            kind = ?change.kind,
            delivered,
            channels = channels.len(),
            "Status change broadcast"
        );
    }
}
