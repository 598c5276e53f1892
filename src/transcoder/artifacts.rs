//! Output artifact layout
//!
//! The contract consumed by the external segment server: one master
//! playlist at the output root plus one subdirectory per quality tier
//! holding that tier's variant playlist and media segments. All names are
//! derived deterministically from the configured tier names.
//!
//! The supervisor is the only writer of this directory tree; everything
//! else reads it.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::QualityTier;

/// Master playlist filename at the output root
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Variant playlist filename inside each tier directory
pub const VARIANT_PLAYLIST: &str = "index.m3u8";

/// Media segment filename pattern inside each tier directory
pub const SEGMENT_PATTERN: &str = "seg-%05d.ts";

/// Paths of the transcode output tree
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the master playlist
    pub fn master_playlist(&self) -> PathBuf {
        self.root.join(MASTER_PLAYLIST)
    }

    /// Directory holding one tier's playlist and segments
    pub fn tier_dir(&self, tier: &str) -> PathBuf {
        self.root.join(tier)
    }

    /// Path of one tier's variant playlist
    pub fn variant_playlist(&self, tier: &str) -> PathBuf {
        self.tier_dir(tier).join(VARIANT_PLAYLIST)
    }

    /// Segment filename pattern for one tier, as handed to the encoder
    pub fn segment_pattern(&self, tier: &str) -> PathBuf {
        self.tier_dir(tier).join(SEGMENT_PATTERN)
    }

    /// Prepare the tree for a new session
    ///
    /// Purges any stale artifacts from a previous session, recreates the
    /// per-tier directories and writes the master playlist. Failure here
    /// is fatal to the session and must propagate to the caller.
    pub async fn prepare(&self, tiers: &[QualityTier]) -> io::Result<()> {
        self.clean().await?;
        tokio::fs::create_dir_all(&self.root).await?;
        for tier in tiers {
            tokio::fs::create_dir_all(self.tier_dir(&tier.name)).await?;
        }
        tokio::fs::write(self.master_playlist(), render_master_playlist(tiers)).await?;
        tracing::debug!(root = %self.root.display(), tiers = tiers.len(), "Output layout prepared");
        Ok(())
    }

    /// Remove the whole output tree
    pub async fn clean(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Render the master playlist referencing every tier's variant playlist
fn render_master_playlist(tiers: &[QualityTier]) -> String {
    let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for tier in tiers {
        manifest.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}/{}\n",
            u64::from(tier.bitrate_kbps) * 1000,
            tier.resolution(),
            tier.name,
            VARIANT_PLAYLIST,
        ));
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> Vec<QualityTier> {
        vec![
            QualityTier::new("720p", 1280, 720, 2500),
            QualityTier::new("480p", 854, 480, 1000),
        ]
    }

    #[tokio::test]
    async fn test_prepare_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("hls"));

        layout.prepare(&tiers()).await.unwrap();

        assert!(layout.master_playlist().is_file());
        assert!(layout.tier_dir("720p").is_dir());
        assert!(layout.tier_dir("480p").is_dir());
    }

    #[tokio::test]
    async fn test_prepare_purges_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("hls"));

        layout.prepare(&tiers()).await.unwrap();
        let stale = layout.tier_dir("720p").join("seg-00042.ts");
        tokio::fs::write(&stale, b"stale").await.unwrap();

        layout.prepare(&tiers()).await.unwrap();
        assert!(!stale.exists());
        assert!(layout.master_playlist().is_file());
    }

    #[tokio::test]
    async fn test_clean_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("hls"));

        layout.prepare(&tiers()).await.unwrap();
        layout.clean().await.unwrap();

        assert!(!layout.root().exists());

        // Cleaning an already-clean tree is fine.
        layout.clean().await.unwrap();
    }

    #[tokio::test]
    async fn test_master_playlist_contents() {
        let manifest = render_master_playlist(&tiers());

        assert!(manifest.starts_with("#EXTM3U"));
        assert!(manifest.contains("#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720"));
        assert!(manifest.contains("720p/index.m3u8"));
        assert!(manifest.contains("480p/index.m3u8"));
    }
}
