//! Publish gate
//!
//! Protocol-level gatekeeper for the ingest connection. Admission happens
//! in two steps: `pre_publish` validates the path and the
//! single-publisher invariant before any resource commitment;
//! `publish_started` transitions the shared state, starts the transcoder
//! and schedules the one-shot metadata re-check.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ServerConfig;
use crate::state::{SharedState, StreamMetadata};
use crate::transcoder::{SupervisorError, TranscodeInvocation, TranscodeSupervisor};

use super::path::PublishPath;

/// Admission rejection for a publish attempt
///
/// Expected and user-facing; communicated via protocol-native rejection,
/// never logged at error severity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishReject {
    /// The publish path lacks an application or stream-key segment
    #[error("malformed publish path {0:?}")]
    MalformedPath(String),

    /// Another publisher is already live
    #[error("another publisher is already live")]
    StreamLive,
}

/// Metadata-extraction interface of an accepted publish session
///
/// Video-derived fields lag connection establishment, so `metadata()` is
/// queried once at publish-confirmed time and once more by the delayed
/// re-check.
pub trait PublishSession: Send + Sync {
    fn metadata(&self) -> StreamMetadata;
}

/// Admission control for the ingest connection
pub struct PublishGate {
    config: Arc<ServerConfig>,
    state: Arc<SharedState>,
    supervisor: Arc<TranscodeSupervisor>,
}

impl PublishGate {
    pub fn new(
        config: Arc<ServerConfig>,
        state: Arc<SharedState>,
        supervisor: Arc<TranscodeSupervisor>,
    ) -> Self {
        Self {
            config,
            state,
            supervisor,
        }
    }

    /// Pre-publish admission check, before any data flows
    ///
    /// Validates the path shape and the single-publisher invariant. No
    /// side effects on acceptance.
    pub async fn pre_publish(&self, raw_path: &str) -> Result<PublishPath, PublishReject> {
        let path = PublishPath::parse(raw_path)
            .ok_or_else(|| PublishReject::MalformedPath(raw_path.to_string()))?;

        if !self.state.can_publish().await {
            tracing::info!(path = %path, "Publish rejected, a stream is already live");
            return Err(PublishReject::StreamLive);
        }

        tracing::info!(path = %path, "Publish accepted");
        Ok(path)
    }

    /// Publish confirmed: data has started flowing
    ///
    /// Losing the admission race to another publisher is absorbed here
    /// (the losing session's own end path cleans it up). A transcoder
    /// start failure rolls the stream back offline and propagates: the
    /// publish cannot be serviced.
    pub async fn publish_started(
        &self,
        session: Arc<dyn PublishSession>,
        source_url: &str,
    ) -> Result<(), SupervisorError> {
        let meta = session.metadata();

        if let Err(e) = self.state.start_stream(meta).await {
            tracing::warn!(error = %e, "Publish confirmed but stream could not start");
            return Ok(());
        }

        let invocation = TranscodeInvocation::hls(&self.config, source_url);
        if let Err(e) = self.supervisor.start(invocation).await {
            tracing::error!(error = %e, "Transcoder failed to start, aborting publish");
            self.state.stop_stream().await;
            return Err(e);
        }

        self.schedule_metadata_refresh(session);
        Ok(())
    }

    /// Publish ended; both calls are idempotent
    pub async fn publish_ended(&self) {
        self.state.stop_stream().await;
        self.supervisor.stop().await;
    }

    /// One-shot delayed re-extraction of video-derived metadata
    ///
    /// Compensates for encoder-dependent metadata lag without polling
    /// indefinitely. `refresh_metadata` already drops sentinel values and
    /// no-ops once the stream is offline.
    fn schedule_metadata_refresh(&self, session: Arc<dyn PublishSession>) {
        let state = Arc::clone(&self.state);
        let delay = self.config.metadata_refresh_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.refresh_metadata(&session.metadata()).await;
        });
    }
}
