//! Viewer registry
//!
//! Admission and bookkeeping for viewer connections. The connection
//! object itself belongs to the transport layer; the registry owns the
//! admission/removal timing and the liveness sweep that bounds the
//! lifetime of half-open connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::ServerConfig;
use crate::state::{close_code, RejectPayload, SharedState, StateError, ViewerChannel, ViewerId};

/// Viewer admission control and liveness tracking
pub struct ViewerRegistry {
    state: Arc<SharedState>,
    max_viewers: usize,
    heartbeat_interval: Duration,
}

impl ViewerRegistry {
    pub fn new(config: &ServerConfig, state: Arc<SharedState>) -> Self {
        Self {
            state,
            max_viewers: config.max_viewers,
            heartbeat_interval: config.heartbeat_interval,
        }
    }

    /// Admit or reject a new viewer connection
    ///
    /// On admission the current status snapshot goes to the new channel
    /// only (not a broadcast). On rejection the channel receives a
    /// structured `ROOM_FULL` payload and a policy-violation close, so
    /// the client can tell "rejected" from "dropped" and skip retrying.
    pub async fn connect(&self, channel: ViewerChannel, peer_addr: SocketAddr) -> Option<ViewerId> {
        match self.state.add_viewer(channel.clone()).await {
            Ok(id) => {
                tracing::info!(viewer = id, peer = %peer_addr, "Viewer connected");
                match self.state.snapshot().await.to_json() {
                    Ok(payload) => {
                        if channel.send_text(payload).is_err() {
                            tracing::debug!(viewer = id, "Viewer closed before initial snapshot");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to serialize snapshot"),
                }
                Some(id)
            }
            Err(StateError::RoomFull(_)) => {
                tracing::info!(peer = %peer_addr, max = self.max_viewers, "Viewer rejected, room full");
                let payload = RejectPayload::room_full(self.max_viewers);
                if let Ok(bytes) = serde_json::to_vec(&payload) {
                    let _ = channel.send_text(Bytes::from(bytes));
                }
                channel.close(close_code::POLICY_VIOLATION, "room full");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unexpected viewer admission failure");
                None
            }
        }
    }

    /// Explicit close or transport-detected drop
    pub async fn disconnect(&self, id: ViewerId) {
        if self.state.remove_viewer(id).await {
            tracing::info!(viewer = id, "Viewer disconnected");
        }
    }

    /// Liveness response from a viewer
    pub async fn pong(&self, id: ViewerId) {
        self.state.heartbeat(id).await;
    }

    /// Quality switch; local to the session, no broadcast
    pub async fn select_quality(&self, id: ViewerId, tier: &str) -> bool {
        let ok = self.state.set_quality(id, tier).await;
        if ok {
            tracing::debug!(viewer = id, tier, "Viewer switched quality");
        }
        ok
    }

    /// One heartbeat tick
    ///
    /// Force-closes sessions that missed two consecutive probes, then
    /// probes every survivor.
    pub async fn sweep(&self) {
        let sweep = self.state.sweep_probes().await;

        for (id, channel) in sweep.expired {
            tracing::info!(viewer = id, "Closing unresponsive viewer");
            channel.close(close_code::GOING_AWAY, "heartbeat timeout");
        }
        for channel in sweep.probe {
            let _ = channel.ping();
        }
    }

    /// Spawn the periodic heartbeat task
    pub fn spawn_heartbeat(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.heartbeat_interval);
            // The first tick completes immediately; a fresh connection
            // should not collect a strike at admission time.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChannelMessage, StatusSnapshot};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn peer() -> SocketAddr {
        "192.168.1.20:52000".parse().unwrap()
    }

    fn setup(max_viewers: usize) -> (Arc<SharedState>, ViewerRegistry) {
        let config = ServerConfig::default().max_viewers(max_viewers);
        let state = Arc::new(SharedState::new(&config));
        let registry = ViewerRegistry::new(&config, Arc::clone(&state));
        (state, registry)
    }

    fn recv_text(rx: &mut UnboundedReceiver<ChannelMessage>) -> StatusSnapshot {
        match rx.try_recv().unwrap() {
            ChannelMessage::Text(payload) => serde_json::from_slice(&payload).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_sends_initial_snapshot() {
        let (_state, registry) = setup(10);

        let (channel, mut rx) = ViewerChannel::new();
        let id = registry.connect(channel, peer()).await.unwrap();

        let snapshot = recv_text(&mut rx);
        assert!(!snapshot.live);
        assert_eq!(snapshot.viewer_count, 1);
        assert!(id > 0);
    }

    #[tokio::test]
    async fn test_rejection_is_distinguishable_from_drop() {
        let (_state, registry) = setup(1);

        let (first, _rx1) = ViewerChannel::new();
        registry.connect(first, peer()).await.unwrap();

        let (second, mut rx2) = ViewerChannel::new();
        assert!(registry.connect(second, peer()).await.is_none());

        // Structured error payload, then a policy-violation close.
        match rx2.try_recv().unwrap() {
            ChannelMessage::Text(payload) => {
                let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
                assert_eq!(json["code"], "ROOM_FULL");
            }
            other => panic!("expected rejection payload, got {:?}", other),
        }
        assert!(matches!(
            rx2.try_recv().unwrap(),
            ChannelMessage::Close {
                code: close_code::POLICY_VIOLATION,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_disconnect_frees_slot() {
        let (state, registry) = setup(1);

        let (channel, _rx) = ViewerChannel::new();
        let id = registry.connect(channel, peer()).await.unwrap();
        registry.disconnect(id).await;
        assert_eq!(state.viewer_count().await, 0);

        let (next, _rx2) = ViewerChannel::new();
        assert!(registry.connect(next, peer()).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_probes_then_force_closes() {
        let (state, registry) = setup(10);

        let (channel, mut rx) = ViewerChannel::new();
        registry.connect(channel, peer()).await.unwrap();
        let _ = rx.try_recv(); // initial snapshot

        // Two silent ticks: probed both times, still admitted.
        registry.sweep().await;
        assert_eq!(rx.try_recv().unwrap(), ChannelMessage::Ping);
        registry.sweep().await;
        assert_eq!(rx.try_recv().unwrap(), ChannelMessage::Ping);
        assert_eq!(state.viewer_count().await, 1);

        // Third silent tick: force-closed with a going-away code.
        registry.sweep().await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChannelMessage::Close {
                code: close_code::GOING_AWAY,
                ..
            }
        ));
        assert_eq!(state.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_pong_keeps_viewer_alive() {
        let (state, registry) = setup(10);

        let (channel, _rx) = ViewerChannel::new();
        let id = registry.connect(channel, peer()).await.unwrap();

        for _ in 0..5 {
            registry.sweep().await;
            registry.pong(id).await;
        }
        assert_eq!(state.viewer_count().await, 1);
    }

    #[tokio::test]
    async fn test_select_quality() {
        let (state, registry) = setup(10);

        let (channel, _rx) = ViewerChannel::new();
        let id = registry.connect(channel, peer()).await.unwrap();

        assert!(registry.select_quality(id, "480p").await);
        assert_eq!(state.quality_of(id).await.as_deref(), Some("480p"));
        assert!(!registry.select_quality(id, "8k").await);
    }
}
