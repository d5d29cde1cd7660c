//! CarLink session harness — entry point.
//!
//! ```text
//! carlink-sim                      Run a scripted session
//! carlink-sim --config <path>      Use custom config TOML
//! carlink-sim --gen-config         Dump default config and exit
//! carlink-sim --probe              Probe real USB for a dongle and exit
//! carlink-sim --duration 30        Stop after 30 seconds
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use carlink_core::{
    DeviceWatcher, MockWatcher, Orchestrator, PipelineOptions, PointerEvent, PointerPhase,
    SessionOptions, UsbWatcher,
};

use carlink_sim::config::SimConfig;
use carlink_sim::driver::SimDriver;
use carlink_sim::surface::NullSurface;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "carlink-sim", about = "CarLink session harness")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "carlink-sim.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Probe real USB for a supported dongle and exit.
    #[arg(long)]
    probe: bool,

    /// Stop the session after this many seconds (default: run until
    /// Ctrl-C).
    #[arg(short, long)]
    duration: Option<u64>,

    /// Inject a dongle failure after this many seconds (overrides
    /// config).
    #[arg(long)]
    fail_after: Option<u64>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SimConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SimConfig::load(&cli.config);
    if let Some(secs) = cli.fail_after {
        config.dongle.fail_after_secs = secs;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("carlink-sim v{}", env!("CARGO_PKG_VERSION"));

    if cli.probe {
        return probe_hardware().await;
    }

    // ── 1. Build the session ────────────────────────────────────

    let options = SessionOptions {
        audio: PipelineOptions {
            playback: config.audio.playback,
            capture: config.audio.capture,
        },
        ..Default::default()
    };

    let driver = SimDriver {
        fail_after: match config.dongle.fail_after_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
        audio_interval: Duration::from_millis(config.dongle.audio_interval_ms.max(1)),
    };

    let (orchestrator, handle) = Orchestrator::new(
        config.session,
        options,
        Box::new(MockWatcher::new(true)),
        Box::new(driver),
    );

    let session = tokio::spawn(orchestrator.run());

    // ── 2. Attach the render sink ───────────────────────────────

    let (surface, painted) = NullSurface::new(u64::from(config.session.fps.max(1)));
    handle.attach_surface(Box::new(surface)).await?;

    let mut status = handle.status();
    status.wait_for(|s| s.plugged).await?;
    info!("session plugged");

    // ── 3. Exercise the input path ──────────────────────────────

    let center_x = f64::from(config.session.width) / 2.0;
    let center_y = f64::from(config.session.height) / 2.0;
    handle
        .send_touch(PointerEvent::new(PointerPhase::Down, center_x, center_y))
        .await?;
    handle
        .send_touch(PointerEvent::new(PointerPhase::Up, center_x, center_y))
        .await?;

    // ── 4. Run until duration or Ctrl-C ─────────────────────────

    match cli.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!("interrupt received");
        }
    }

    // ── 5. Shutdown ─────────────────────────────────────────────

    handle.stop().await?;
    if let Err(e) = session.await? {
        warn!("session ended with error: {e}");
    }
    info!(
        frames_rendered = painted.load(Ordering::Relaxed),
        "harness done"
    );

    Ok(())
}

/// Query real hardware through the `nusb` watcher.
async fn probe_hardware() -> Result<(), Box<dyn std::error::Error>> {
    let watcher = UsbWatcher::new();
    match watcher.probe(false).await {
        Ok(Some(device)) => {
            info!(
                "dongle found ({:04x}:{:04x}, serial {})",
                device.vendor_id,
                device.product_id,
                device.serial.as_deref().unwrap_or("-")
            );
        }
        Ok(None) => info!("no dongle enumerable"),
        Err(e) => warn!("probe failed: {e}"),
    }

    // Interactive probe verifies we can actually open the device.
    match watcher.probe(true).await {
        Ok(Some(_)) => info!("dongle accessible"),
        Ok(None) => {}
        Err(e) => warn!("dongle present but not accessible: {e}"),
    }

    Ok(())
}
