//! Minimal relay demo
//!
//! Run with: cargo run --example relay
//!
//! Starts the orchestrator with the default configuration. Requires an
//! `ffmpeg` binary on PATH; startup fails otherwise. The ingest listener
//! and the segment/status HTTP server are external collaborators, so this
//! demo only brings the orchestrator up, prints where they would attach,
//! and waits for Ctrl+C.
//!
//! Set RUST_LOG to tune verbosity, e.g.:
//!   RUST_LOG=lancast=debug cargo run --example relay

use lancast::{Relay, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lancast=info".parse()?),
        )
        .init();

    let config = ServerConfig::default();

    println!("Starting relay");
    println!("  ingest listener attaches at {}", config.ingest_addr);
    println!("  status endpoint attaches at {}", config.http_addr);
    println!("  HLS output written to {}", config.output_dir.display());
    println!();
    println!("=== Publish a stream ===");
    println!("OBS:    Server: rtmp://<host>/live  Stream Key: demo");
    println!("ffmpeg: ffmpeg -re -i input.mp4 -c copy -f flv rtmp://<host>/live/demo");
    println!();

    let relay = Relay::start(config).await?;

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    relay.shutdown().await;
    Ok(())
}
