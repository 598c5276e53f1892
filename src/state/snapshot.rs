//! Status snapshot wire format
//!
//! An immutable point-in-time read of the stream plus viewer count, safe
//! to serialize and send without further synchronization. The same
//! structure backs the pull (status query) and push (notification)
//! surfaces.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stream::Stream;

/// Live-only portion of a status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Resolution in "WxH" form (may be the unknown sentinel)
    pub resolution: String,

    /// Incoming bitrate in kbit/s (0 until measured)
    pub bitrate_kbps: u32,

    /// Wall-clock start time, serialized as ISO-8601
    pub started_at: DateTime<Utc>,

    /// Seconds elapsed since the stream went live
    pub duration_seconds: u64,
}

/// Point-in-time status of the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Whether a stream is currently live
    pub live: bool,

    /// Number of admitted viewer channels
    pub viewer_count: usize,

    /// Present if and only if `live` is true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_info: Option<StreamInfo>,
}

impl StatusSnapshot {
    /// Build a snapshot from the current stream state and viewer count
    pub fn capture(stream: &Stream, viewer_count: usize) -> Self {
        Self {
            live: stream.is_live(),
            viewer_count,
            stream_info: stream.live().map(|live| StreamInfo {
                resolution: live.resolution.clone(),
                bitrate_kbps: live.bitrate_kbps,
                started_at: live.started_at,
                duration_seconds: live.duration().as_secs(),
            }),
        }
    }

    /// Serialize to a JSON payload suitable for a single broadcast
    pub fn to_json(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::stream::{LiveStream, StreamMetadata};

    #[test]
    fn test_offline_snapshot_omits_stream_info() {
        let snapshot = StatusSnapshot::capture(&Stream::Offline, 3);

        assert!(!snapshot.live);
        assert_eq!(snapshot.viewer_count, 3);
        assert!(snapshot.stream_info.is_none());

        let json = String::from_utf8(snapshot.to_json().unwrap().to_vec()).unwrap();
        assert!(json.contains("\"viewerCount\":3"));
        assert!(!json.contains("streamInfo"));
    }

    #[test]
    fn test_live_snapshot_carries_stream_info() {
        let stream = Stream::Live(LiveStream::new(StreamMetadata {
            publisher_addr: "10.0.0.5:51234".parse().unwrap(),
            resolution: Some("1920x1080".to_string()),
            bitrate_kbps: Some(5000),
        }));

        let snapshot = StatusSnapshot::capture(&stream, 0);
        let info = snapshot.stream_info.as_ref().unwrap();

        assert!(snapshot.live);
        assert_eq!(info.resolution, "1920x1080");
        assert_eq!(info.bitrate_kbps, 5000);

        let json = String::from_utf8(snapshot.to_json().unwrap().to_vec()).unwrap();
        assert!(json.contains("\"bitrateKbps\":5000"));
        assert!(json.contains("\"startedAt\""));
        assert!(json.contains("\"durationSeconds\""));
    }

    #[test]
    fn test_snapshot_is_stable_without_mutation() {
        let stream = Stream::Live(LiveStream::new(StreamMetadata {
            publisher_addr: "10.0.0.5:51234".parse().unwrap(),
            resolution: Some("1280x720".to_string()),
            bitrate_kbps: Some(2500),
        }));

        let a = StatusSnapshot::capture(&stream, 2);
        let b = StatusSnapshot::capture(&stream, 2);

        // Duration may differ by elapsed wall-clock time; everything else
        // must be identical.
        assert_eq!(a.live, b.live);
        assert_eq!(a.viewer_count, b.viewer_count);
        let (ia, ib) = (a.stream_info.unwrap(), b.stream_info.unwrap());
        assert_eq!(ia.resolution, ib.resolution);
        assert_eq!(ia.bitrate_kbps, ib.bitrate_kbps);
        assert_eq!(ia.started_at, ib.started_at);
    }
}
