//! Transcode invocation construction
//!
//! Builds the argument list for the external encoder from the configured
//! quality tiers. The encoder itself is a black box; the supervisor only
//! needs a program path and argv, which also keeps it testable with
//! stand-in executables.

use std::path::PathBuf;

use crate::config::ServerConfig;

use super::artifacts::OutputLayout;

/// A fully constructed process invocation
#[derive(Debug, Clone)]
pub struct TranscodeInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl TranscodeInvocation {
    /// Build the adaptive-HLS ffmpeg invocation for one publish session
    ///
    /// One input, one H.264/AAC output per quality tier, each writing a
    /// variant playlist plus rolling segments under its tier directory.
    pub fn hls(config: &ServerConfig, source_url: &str) -> Self {
        let layout = OutputLayout::new(&config.output_dir);
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "warning".into(),
            "-stats".into(),
            "-i".into(),
            source_url.into(),
        ];

        for tier in &config.tiers {
            args.extend([
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "0:a:0".into(),
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "veryfast".into(),
                "-vf".into(),
                format!("scale={}:{}", tier.width, tier.height),
                "-b:v".into(),
                format!("{}k", tier.bitrate_kbps),
                "-maxrate".into(),
                format!("{}k", tier.bitrate_kbps),
                "-bufsize".into(),
                format!("{}k", tier.bitrate_kbps * 2),
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "128k".into(),
                "-f".into(),
                "hls".into(),
                "-hls_time".into(),
                config.segment_seconds.to_string(),
                "-hls_list_size".into(),
                config.playlist_length.to_string(),
                "-hls_flags".into(),
                "delete_segments+independent_segments".into(),
                "-hls_segment_filename".into(),
                layout.segment_pattern(&tier.name).display().to_string(),
                layout.variant_playlist(&tier.name).display().to_string(),
            ]);
        }

        Self {
            program: config.ffmpeg_path.clone(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTier;

    #[test]
    fn test_hls_invocation_shape() {
        let config = ServerConfig::default().output_dir("/srv/media");
        let invocation = TranscodeInvocation::hls(&config, "rtmp://127.0.0.1/live/key");

        assert_eq!(invocation.program, PathBuf::from("ffmpeg"));
        assert_eq!(invocation.args[4], "-i");
        assert_eq!(invocation.args[5], "rtmp://127.0.0.1/live/key");

        // One HLS output per configured tier.
        let outputs = invocation.args.iter().filter(|a| *a == "hls").count();
        assert_eq!(outputs, config.tiers.len());
        assert!(invocation
            .args
            .iter()
            .any(|a| a == "/srv/media/720p/index.m3u8"));
        assert!(invocation
            .args
            .iter()
            .any(|a| a == "/srv/media/1080p/seg-%05d.ts"));
    }

    #[test]
    fn test_tier_parameters_applied() {
        let config = ServerConfig::default()
            .tiers(vec![QualityTier::new("360p", 640, 360, 800)])
            .output_dir("/srv/media");
        let invocation = TranscodeInvocation::hls(&config, "rtmp://localhost/live/key");

        assert!(invocation.args.iter().any(|a| a == "scale=640:360"));
        assert!(invocation.args.iter().any(|a| a == "800k"));
        assert!(invocation.args.iter().any(|a| a == "1600k"));
        assert!(invocation
            .args
            .windows(2)
            .any(|w| w[0] == "-hls_time" && w[1] == "4"));
    }
}
