//! CLI entry point for cam-sync.
//!
//! Runs a synchronized capture session against simulated cameras: the same
//! core that drives real hardware behind a vendor `CameraBus`
//! implementation, exercised here with the in-tree mock bus so the
//! synchronization behavior can be observed without devices attached.
//!
//! # Usage
//!
//! Run until interrupted:
//! ```bash
//! cam-sync --cameras 3
//! ```
//!
//! Capture a fixed number of synchronized rounds:
//! ```bash
//! cam-sync --cameras 4 --rounds 100 --config config/default.toml
//! ```

use anyhow::Result;
use cam_sync::{CaptureEvent, CaptureSession, MockBus, Settings};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

// Use mimalloc for improved allocation performance in multi-threaded
// capture scenarios (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "cam-sync")]
#[command(about = "Synchronized multi-camera software-trigger capture", long_about = None)]
struct Cli {
    /// Optional TOML settings file (defaults to config/default.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulated cameras on the mock bus
    #[arg(long, default_value_t = 3)]
    cameras: usize,

    /// Stop after this many synchronized rounds (runs until ctrl-c if omitted)
    #[arg(long)]
    rounds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .init();

    let bus = Arc::new(MockBus::new(cli.cameras));
    for camera in bus.cameras() {
        // Stagger the mocks so the barrier has real work to do.
        camera.set_rearm_jitter(Duration::from_millis(5));
        camera.set_retrieve_latency(Duration::from_millis(2));
    }

    let session = CaptureSession::new(bus, settings.sync.clone());
    let mut events = session.subscribe();
    let cameras = session.start().await?;
    info!(cameras, "session running; press ctrl-c to stop");

    let frame_target = cli.rounds.map(|rounds| rounds * cameras as u64);
    let watcher = tokio::spawn(async move {
        let mut captured: u64 = 0;
        loop {
            match events.recv().await {
                Ok(CaptureEvent::Captured { .. }) => {
                    captured += 1;
                    if let Some(target) = frame_target {
                        if captured >= target {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        captured
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
        }
        captured = watcher => {
            info!(frames = captured.unwrap_or(0), "round target reached");
        }
    }

    session.stop().await;
    Ok(())
}
