//! Publish path validation
//!
//! A publish path must carry a non-empty application segment and a
//! non-empty stream-key segment, e.g. `/live/my-key`. Anything else is
//! rejected before the session touches any state.

use std::fmt;

/// A validated publish path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPath {
    /// Application segment, e.g. "live"
    pub app: String,

    /// Stream-key segment
    pub stream_key: String,
}

impl PublishPath {
    /// Parse and validate a raw publish path
    ///
    /// Accepts exactly two non-empty slash-separated segments, with or
    /// without surrounding slashes.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_matches('/');
        let mut segments = trimmed.split('/');

        let app = segments.next().filter(|s| !s.is_empty())?;
        let stream_key = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            app: app.to_string(),
            stream_key: stream_key.to_string(),
        })
    }
}

impl fmt::Display for PublishPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.stream_key)
    }
}
