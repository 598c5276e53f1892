//! Server configuration
//!
//! Loaded once at startup and immutable for the process lifetime. The
//! orchestrator never mutates it; `validate()` must pass before any
//! listener is bound.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// One configured output variant produced by the transcode process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityTier {
    /// Tier name; becomes a directory name under the output root
    pub name: String,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Target video bitrate in kbit/s
    pub bitrate_kbps: u32,
}

impl QualityTier {
    pub fn new(name: impl Into<String>, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            bitrate_kbps,
        }
    }

    /// Resolution string in "WxH" form
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the ingest (RTMP) listener binds to
    pub ingest_addr: SocketAddr,

    /// Address the HTTP segment server binds to
    pub http_addr: SocketAddr,

    /// Quality tiers, one transcode variant each
    pub tiers: Vec<QualityTier>,

    /// Target duration of each media segment in seconds
    pub segment_seconds: u32,

    /// Number of segments kept in each variant playlist
    pub playlist_length: u32,

    /// Maximum concurrent viewer channels
    pub max_viewers: usize,

    /// Root directory for transcode output artifacts
    pub output_dir: PathBuf,

    /// Path to the transcode executable
    pub ffmpeg_path: PathBuf,

    /// Grace period between SIGTERM and forced kill on stop
    pub stop_grace: Duration,

    /// Interval between viewer liveness probes
    pub heartbeat_interval: Duration,

    /// Delay before the single post-publish metadata re-check
    pub metadata_refresh_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ingest_addr: "0.0.0.0:1935".parse().unwrap(),
            http_addr: "0.0.0.0:8080".parse().unwrap(),
            tiers: vec![
                QualityTier::new("1080p", 1920, 1080, 4500),
                QualityTier::new("720p", 1280, 720, 2500),
                QualityTier::new("480p", 854, 480, 1000),
            ],
            segment_seconds: 4,
            playlist_length: 5,
            max_viewers: 10,
            output_dir: PathBuf::from("media"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            stop_grace: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            metadata_refresh_delay: Duration::from_millis(500),
        }
    }
}

impl ServerConfig {
    /// Set the ingest bind address
    pub fn ingest(mut self, addr: SocketAddr) -> Self {
        self.ingest_addr = addr;
        self
    }

    /// Set the HTTP bind address
    pub fn http(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Replace the quality tier list
    pub fn tiers(mut self, tiers: Vec<QualityTier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Set maximum concurrent viewers
    pub fn max_viewers(mut self, max: usize) -> Self {
        self.max_viewers = max;
        self
    }

    /// Set the output root directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the transcode executable path
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set the viewer heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the stop grace period
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Set the delay before the post-publish metadata re-check
    pub fn metadata_refresh_delay(mut self, delay: Duration) -> Self {
        self.metadata_refresh_delay = delay;
        self
    }

    /// The tier with the highest target bitrate
    ///
    /// New viewers default to this tier. `validate()` guarantees the
    /// list is non-empty.
    pub fn highest_tier(&self) -> &QualityTier {
        self.tiers
            .iter()
            .max_by_key(|t| t.bitrate_kbps)
            .expect("validated config has at least one tier")
    }

    /// Look up a tier by name
    pub fn tier(&self, name: &str) -> Option<&QualityTier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Validate the configuration
    ///
    /// Must be called before the orchestrator starts; a config that fails
    /// validation must never reach the admission or transcode paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest_addr.port() == self.http_addr.port() {
            return Err(ConfigError::PortCollision(self.ingest_addr.port()));
        }
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.name.is_empty()
                || !tier
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::BadTierName(tier.name.clone()));
            }
            if self.tiers[..i].iter().any(|t| t.name == tier.name) {
                return Err(ConfigError::DuplicateTier(tier.name.clone()));
            }
            if tier.width == 0 || tier.height == 0 || tier.bitrate_kbps == 0 {
                return Err(ConfigError::BadTierParams(tier.name.clone()));
            }
        }
        if self.segment_seconds == 0 {
            return Err(ConfigError::BadSegmentDuration);
        }
        if self.playlist_length == 0 {
            return Err(ConfigError::BadPlaylistLength);
        }
        if self.max_viewers == 0 {
            return Err(ConfigError::BadViewerCapacity);
        }
        Ok(())
    }
}

/// Configuration validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ingest and HTTP listeners share port {0}")]
    PortCollision(u16),

    #[error("quality tier list is empty")]
    NoTiers,

    #[error("tier name {0:?} is empty or contains characters unsafe for a directory name")]
    BadTierName(String),

    #[error("duplicate tier name {0:?}")]
    DuplicateTier(String),

    #[error("tier {0:?} has a zero dimension or bitrate")]
    BadTierParams(String),

    #[error("segment duration must be at least 1 second")]
    BadSegmentDuration,

    #[error("playlist length must be at least 1 segment")]
    BadPlaylistLength,

    #[error("viewer capacity must be at least 1")]
    BadViewerCapacity,
}
