//! Stream entity and live metadata
//!
//! The singleton stream is either fully offline or fully live: every
//! live-only attribute lives inside [`LiveStream`], so a partially
//! populated state is unrepresentable.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Sentinel resolution used while video-derived metadata is unavailable.
///
/// Frame-derived fields lag connection establishment, so a publish often
/// starts with this placeholder and is refined by the delayed re-check.
pub const UNKNOWN_RESOLUTION: &str = "unknown";

/// Metadata extracted from a publish session
///
/// `resolution` and `bitrate_kbps` are optional because they are derived
/// from video frames and frequently unavailable at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Publisher network address
    pub publisher_addr: SocketAddr,

    /// Video resolution in "WxH" form, if known
    pub resolution: Option<String>,

    /// Incoming bitrate in kbit/s, if measured
    pub bitrate_kbps: Option<u32>,
}

impl StreamMetadata {
    /// Metadata with only the publisher address known
    pub fn bare(publisher_addr: SocketAddr) -> Self {
        Self {
            publisher_addr,
            resolution: None,
            bitrate_kbps: None,
        }
    }
}

/// Live-only stream attributes, present exactly while the stream is live
#[derive(Debug, Clone)]
pub struct LiveStream {
    /// Publisher network address
    pub publisher_addr: SocketAddr,

    /// Last known resolution, [`UNKNOWN_RESOLUTION`] until measured
    pub resolution: String,

    /// Last known incoming bitrate in kbit/s, 0 until measured
    pub bitrate_kbps: u32,

    /// Wall-clock time the stream went live
    pub started_at: DateTime<Utc>,

    /// Monotonic start instant, used for duration computation
    started: Instant,
}

impl LiveStream {
    pub fn new(meta: StreamMetadata) -> Self {
        Self {
            publisher_addr: meta.publisher_addr,
            resolution: meta
                .resolution
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| UNKNOWN_RESOLUTION.to_string()),
            bitrate_kbps: meta.bitrate_kbps.unwrap_or(0),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Elapsed time since the stream went live, computed fresh on every call
    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// Merge a partial metadata refresh, last-known-good wins
    ///
    /// Sentinel values (empty or "unknown" resolution, zero bitrate) never
    /// overwrite previously measured data. Returns whether any field
    /// actually changed value.
    pub fn refresh(&mut self, partial: &StreamMetadata) -> bool {
        let mut changed = false;

        if let Some(resolution) = &partial.resolution {
            if !resolution.is_empty()
                && resolution != UNKNOWN_RESOLUTION
                && *resolution != self.resolution
            {
                self.resolution = resolution.clone();
                changed = true;
            }
        }

        if let Some(bitrate) = partial.bitrate_kbps {
            if bitrate > 0 && bitrate != self.bitrate_kbps {
                self.bitrate_kbps = bitrate;
                changed = true;
            }
        }

        changed
    }
}

/// The singleton stream, offline or live
#[derive(Debug, Clone)]
pub enum Stream {
    Offline,
    Live(LiveStream),
}

impl Stream {
    pub fn is_live(&self) -> bool {
        matches!(self, Stream::Live(_))
    }

    pub fn live(&self) -> Option<&LiveStream> {
        match self {
            Stream::Live(live) => Some(live),
            Stream::Offline => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "10.0.0.5:51234".parse().unwrap()
    }

    #[test]
    fn test_live_stream_defaults_to_sentinels() {
        let live = LiveStream::new(StreamMetadata::bare(addr()));

        assert_eq!(live.resolution, UNKNOWN_RESOLUTION);
        assert_eq!(live.bitrate_kbps, 0);
    }

    #[test]
    fn test_refresh_upgrades_sentinels() {
        let mut live = LiveStream::new(StreamMetadata::bare(addr()));

        let changed = live.refresh(&StreamMetadata {
            publisher_addr: addr(),
            resolution: Some("1920x1080".to_string()),
            bitrate_kbps: Some(5000),
        });

        assert!(changed);
        assert_eq!(live.resolution, "1920x1080");
        assert_eq!(live.bitrate_kbps, 5000);
    }

    #[test]
    fn test_refresh_never_regresses_to_sentinel() {
        let mut live = LiveStream::new(StreamMetadata {
            publisher_addr: addr(),
            resolution: Some("1280x720".to_string()),
            bitrate_kbps: Some(2500),
        });

        let changed = live.refresh(&StreamMetadata {
            publisher_addr: addr(),
            resolution: Some(UNKNOWN_RESOLUTION.to_string()),
            bitrate_kbps: Some(0),
        });

        assert!(!changed);
        assert_eq!(live.resolution, "1280x720");
        assert_eq!(live.bitrate_kbps, 2500);
    }

    #[test]
    fn test_refresh_unchanged_values_reports_no_change() {
        let mut live = LiveStream::new(StreamMetadata {
            publisher_addr: addr(),
            resolution: Some("1280x720".to_string()),
            bitrate_kbps: Some(2500),
        });

        let changed = live.refresh(&StreamMetadata {
            publisher_addr: addr(),
            resolution: Some("1280x720".to_string()),
            bitrate_kbps: Some(2500),
        });

        assert!(!changed);
    }

    #[test]
    fn test_duration_grows() {
        let live = LiveStream::new(StreamMetadata::bare(addr()));

        let first = live.duration();
        std::thread::sleep(Duration::from_millis(5));
        assert!(live.duration() > first);
    }
}
