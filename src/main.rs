//! # Aeromap
//!
//! Mission-triggered aerial image capture and orthophoto mapping for
//! MAVLink drones.
//!
//! One invocation covers one mission: connect to the flight controller,
//! watch for AUTO-mode entries and photograph each one, then optionally
//! upload the captures to the ground-station file service and run the
//! orthophoto reconstruction job.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use aeromap::camera::{CameraDriver, GoProCamera, SimulatedCamera};
use aeromap::config::Config;
use aeromap::gcs::GcsClient;
use aeromap::mapping::MappingJob;
use aeromap::session::{CaptureSession, SessionSettings, SessionSummary};
use aeromap::telemetry::TelemetryWatcher;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Directory mission log files are written to
const LOG_DIR: &str = "logs";

#[tokio::main]
async fn main() -> Result<()> {
    // Mission logs go to stdout and a daily-rotated file.
    std::fs::create_dir_all(LOG_DIR).context("creating log directory")?;
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "aeromap.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    info!("Aeromap v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let capture_dir = PathBuf::from(&config.capture.output_dir);
    std::fs::create_dir_all(&capture_dir)
        .with_context(|| format!("creating capture directory {}", capture_dir.display()))?;

    // Establish the flight-controller link before anything else; without a
    // heartbeat there is no mission to monitor.
    let descriptor = config.link.descriptor()?;
    let heartbeat_timeout = config.link.heartbeat_timeout();
    let watcher = tokio::task::spawn_blocking(move || {
        TelemetryWatcher::connect(&descriptor, heartbeat_timeout)
    })
    .await
    .context("connect task panicked")??;

    let settings = SessionSettings {
        poll_interval: config.link.poll_interval(),
        output_dir: capture_dir.clone(),
    };

    let summary = if config.camera.simulate {
        let sample = (!config.camera.sample_image.is_empty())
            .then(|| PathBuf::from(&config.camera.sample_image));
        info!("Using simulated camera");
        run_session(watcher, SimulatedCamera::new(sample), settings).await
    } else {
        info!("Using wired camera at {}", config.camera.base_url);
        let camera = GoProCamera::new(
            config.camera.base_url.as_str(),
            std::time::Duration::from_millis(config.camera.capture_timeout_ms),
            config.camera.media_poll_attempts,
            std::time::Duration::from_millis(config.camera.media_poll_interval_ms),
        )?;
        run_session(watcher, camera, settings).await
    };

    info!(
        "Mission ended ({:?}): {} ticks, {} images captured",
        summary.end,
        summary.ticks,
        summary.images.len()
    );

    if config.gcs.enabled && !summary.images.is_empty() {
        upload_captures(&config, &capture_dir).await;
    }

    if config.mapping.enabled {
        let job = MappingJob::from_config(&config.mapping);
        job.stage_images(&capture_dir).await?;
        job.run().await?;
        info!("Orthophoto available at {}", job.orthophoto_path().display());
    }

    Ok(())
}

/// Loads the configuration file named on the command line, falling back to
/// [`DEFAULT_CONFIG_PATH`] and then to built-in defaults when no file exists.
fn load_config() -> Result<Config> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        info!("Loading configuration from {}", path);
        Ok(Config::load(&path)?)
    } else {
        info!("No configuration file at {}, using defaults", path);
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

/// Runs one capture session to completion, stopping on Ctrl+C.
async fn run_session(
    watcher: TelemetryWatcher,
    camera: impl CameraDriver,
    settings: SessionSettings,
) -> SessionSummary {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            let _ = stop_tx.send(true);
        }
    });

    info!("Monitoring mission; press Ctrl+C to stop");
    CaptureSession::new(watcher, camera, settings).run(stop_rx).await
}

/// Pushes every file in the capture directory to the file service.
///
/// Upload problems are logged and absorbed; they must not keep the mapping
/// step from running on the local copies.
async fn upload_captures(config: &Config, capture_dir: &Path) {
    let client = match GcsClient::new(
        config.gcs.base_url.as_str(),
        std::time::Duration::from_millis(config.gcs.request_timeout_ms),
    ) {
        Ok(client) => client,
        Err(err) => {
            warn!("Could not create GCS client: {}", err);
            return;
        }
    };

    match client.upload_directory(capture_dir).await {
        Ok(count) => info!("Uploaded {} capture(s) to {}", count, config.gcs.base_url),
        Err(err) => warn!("Capture upload failed: {}", err),
    }
}
