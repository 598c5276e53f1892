//! Relay assembly
//!
//! Wires the shared state, transcode supervisor, publish gate, viewer
//! registry and notification hub together, and runs the fatal startup
//! checks: a relay that cannot validate its configuration or its
//! transcode executable never presents itself as available.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::ingest::PublishGate;
use crate::notify::NotificationHub;
use crate::state::{SharedState, StatusSnapshot};
use crate::transcoder::TranscodeSupervisor;
use crate::viewer::ViewerRegistry;

/// The assembled stream lifecycle orchestrator
///
/// External collaborators hand ingest callbacks to [`Relay::gate`],
/// viewer connections to [`Relay::viewers`], and serve
/// [`Relay::status`] on the pull surface.
pub struct Relay {
    config: Arc<ServerConfig>,
    state: Arc<SharedState>,
    supervisor: Arc<TranscodeSupervisor>,
    gate: PublishGate,
    viewers: Arc<ViewerRegistry>,
    hub_task: JoinHandle<()>,
    heartbeat_task: JoinHandle<()>,
}

impl Relay {
    /// Validate and assemble the relay
    ///
    /// Fails fast on an invalid configuration or an unusable transcode
    /// executable, before any background task starts.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        TranscodeSupervisor::validate_executable(&config).await?;

        let config = Arc::new(config);
        let state = Arc::new(SharedState::new(&config));
        let supervisor = Arc::new(TranscodeSupervisor::new(&config, Arc::clone(&state)));
        let gate = PublishGate::new(
            Arc::clone(&config),
            Arc::clone(&state),
            Arc::clone(&supervisor),
        );
        let viewers = Arc::new(ViewerRegistry::new(&config, Arc::clone(&state)));

        let hub_task = NotificationHub::new(Arc::clone(&state)).spawn();
        let heartbeat_task = viewers.spawn_heartbeat();

        tracing::info!(
            ingest = %config.ingest_addr,
            http = %config.http_addr,
            tiers = config.tiers.len(),
            max_viewers = config.max_viewers,
            "Relay ready"
        );

        Ok(Self {
            config,
            state,
            supervisor,
            gate,
            viewers,
            hub_task,
            heartbeat_task,
        })
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Ingest-side admission control
    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }

    /// Viewer-side admission control
    pub fn viewers(&self) -> &Arc<ViewerRegistry> {
        &self.viewers
    }

    /// Pull surface: current status snapshot
    pub async fn status(&self) -> StatusSnapshot {
        self.state.snapshot().await
    }

    /// Tear the relay down: end any publish, stop background tasks
    pub async fn shutdown(self) {
        self.state.stop_stream().await;
        self.supervisor.stop().await;
        self.hub_task.abort();
        self.heartbeat_task.abort();
        tracing::info!("Relay shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::Error;
    use crate::state::ViewerChannel;
    use crate::transcoder::SupervisorError;

    fn config(dir: &std::path::Path) -> ServerConfig {
        // `true -version` exits cleanly, which is all startup validation
        // requires of a stand-in encoder.
        ServerConfig::default()
            .output_dir(dir.join("hls"))
            .ffmpeg_path("true")
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::start(config(dir.path())).await.unwrap();

        let status = relay.status().await;
        assert!(!status.live);
        assert_eq!(status.viewer_count, 0);

        let (channel, mut rx) = ViewerChannel::new();
        relay
            .viewers()
            .connect(channel, "192.168.1.20:52000".parse().unwrap())
            .await
            .unwrap();
        assert!(rx.recv().await.is_some());
        assert_eq!(relay.status().await.viewer_count, 1);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_prevents_startup() {
        let dir = tempfile::tempdir().unwrap();
        let result = Relay::start(config(dir.path()).max_viewers(0)).await;

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::BadViewerCapacity))
        ));
    }

    #[tokio::test]
    async fn test_missing_executable_prevents_startup() {
        let dir = tempfile::tempdir().unwrap();
        let result = Relay::start(config(dir.path()).ffmpeg_path("/nonexistent/ffmpeg")).await;

        assert!(matches!(
            result,
            Err(Error::Supervisor(SupervisorError::ExecutableMissing(_)))
        ));
    }
}
