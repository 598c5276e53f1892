//! Viewer sessions and the outbound channel abstraction
//!
//! A [`ViewerChannel`] is the transport-agnostic handle to one viewer's
//! outbound queue: the transport layer owns the receiving half and writes
//! frames to the socket. Sends never block and never fail the caller
//! beyond a "channel closed" signal.

use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque viewer session identifier, unique among concurrent sessions
pub type ViewerId = u64;

/// Close codes sent on the viewer channel, WebSocket-compatible
pub mod close_code {
    /// Normal closure
    pub const NORMAL: u16 = 1000;

    /// Server-initiated close (heartbeat timeout)
    pub const GOING_AWAY: u16 = 1001;

    /// Admission rejected (room full)
    ///
    /// Distinct from the normal/going-away codes so a client can tell
    /// "rejected" from "dropped" and skip its reconnect-retry loop.
    pub const POLICY_VIOLATION: u16 = 1008;
}

/// Structured rejection payload sent before a policy-violation close
#[derive(Debug, Clone, Serialize)]
pub struct RejectPayload {
    pub code: &'static str,
    pub message: String,
}

impl RejectPayload {
    /// Viewer capacity reached
    pub fn room_full(max_viewers: usize) -> Self {
        Self {
            code: "ROOM_FULL",
            message: format!("viewer limit of {} reached", max_viewers),
        }
    }
}

/// Outbound frame for a viewer channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    /// Serialized JSON payload (status snapshot or rejection)
    Text(Bytes),

    /// Liveness probe
    Ping,

    /// Close the connection with the given code
    Close { code: u16, reason: String },
}

/// The send half was dropped by the transport
#[derive(Debug, Error)]
#[error("viewer channel closed")]
pub struct ChannelClosed;

/// Handle to one viewer's outbound queue
///
/// Cloneable; clones share the same underlying queue. Used only for
/// sending, never for admission decisions.
#[derive(Debug, Clone)]
pub struct ViewerChannel {
    tx: mpsc::UnboundedSender<ChannelMessage>,
}

impl ViewerChannel {
    /// Create a channel pair; the receiver goes to the transport layer
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a serialized payload
    pub fn send_text(&self, payload: Bytes) -> Result<(), ChannelClosed> {
        self.tx
            .send(ChannelMessage::Text(payload))
            .map_err(|_| ChannelClosed)
    }

    /// Queue a liveness probe
    pub fn ping(&self) -> Result<(), ChannelClosed> {
        self.tx.send(ChannelMessage::Ping).map_err(|_| ChannelClosed)
    }

    /// Queue a close frame; errors are irrelevant at this point
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(ChannelMessage::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// One admitted viewer connection
#[derive(Debug)]
pub struct ViewerSession {
    /// Unique session id
    pub id: ViewerId,

    /// Admission time
    pub connected_at: Instant,

    /// Last liveness response
    pub last_heartbeat: Instant,

    /// Consecutive heartbeat ticks without a response
    pub missed_probes: u8,

    /// Selected quality tier name
    pub quality: String,

    /// Outbound channel handle, borrowed from the transport
    pub channel: ViewerChannel,
}

impl ViewerSession {
    pub fn new(id: ViewerId, quality: String, channel: ViewerChannel) -> Self {
        let now = Instant::now();
        Self {
            id,
            connected_at: now,
            last_heartbeat: now,
            missed_probes: 0,
            quality,
            channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (channel, mut rx) = ViewerChannel::new();

        channel.send_text(Bytes::from_static(b"{}")).unwrap();
        channel.ping().unwrap();
        channel.close(close_code::NORMAL, "done");

        assert_eq!(
            rx.try_recv().unwrap(),
            ChannelMessage::Text(Bytes::from_static(b"{}"))
        );
        assert_eq!(rx.try_recv().unwrap(), ChannelMessage::Ping);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChannelMessage::Close { code: 1000, .. }
        ));
    }

    #[test]
    fn test_send_after_transport_drop_fails() {
        let (channel, rx) = ViewerChannel::new();
        drop(rx);

        assert!(channel.send_text(Bytes::from_static(b"{}")).is_err());
    }

    #[test]
    fn test_room_full_payload_shape() {
        let payload = RejectPayload::room_full(10);
        let json = serde_json::to_string(&payload).unwrap();

        assert!(json.contains("\"code\":\"ROOM_FULL\""));
        assert!(json.contains("10"));
    }
}
