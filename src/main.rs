//! # Transducer Monitor
//!
//! Acquire, tare and record linear transducer readings from a serial
//! acquisition board.
//!
//! The monitor connects to the board, streams readings into the engine and
//! takes operator commands on stdin (see [`transducer_monitor::console`]).
//! Device status lines are logged under the `device` target. On exit any
//! recorded session is exported to the configured directory.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transducer_monitor::config::{Config, LoggingConfig};
use transducer_monitor::console::{self, ConsoleCommand, Outcome};
use transducer_monitor::engine::Engine;
use transducer_monitor::export::{self, SessionReport};
use transducer_monitor::serial::SerialTransport;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Seconds between periodic status log lines
const STATUS_INTERVAL_SECS: u64 = 10;

/// File name prefix of the daily log files
const LOG_FILE_PREFIX: &str = "transducer-monitor.log";

/// Set up the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. When a log directory is
/// configured a daily-rotated file layer is added; the returned guard must
/// be held until exit so buffered lines are flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.directory.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Log every status line the board sends
fn spawn_status_logger(engine: &Engine) {
    let mut status = engine.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status.recv().await {
                Ok(line) => info!(target: "device", "{}", line),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} status lines", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Write the recorded session, if any, and print its summary
fn export_on_exit(engine: &Engine) {
    if !engine.has_recording() {
        return;
    }

    let snapshot = engine.snapshot();
    let recording = &engine.config().recording;
    let now = Local::now();
    let report = SessionReport::from_snapshot(&snapshot.channels, now);
    info!("\n{}", report.render(recording.precision));

    match export::export_session(&snapshot.channels, Path::new(&recording.export_dir), recording.precision, now) {
        Ok(paths) => info!("Session saved to {} and {}", paths.csv.display(), paths.report.display()),
        Err(e) => error!("Could not export session: {}", e),
    }
}

/// Main entry point for the transducer monitor
///
/// # Control Flow
///
/// 1. Load configuration (first argument, or `config/default.toml`) and set up logging
/// 2. Connect to the board; optionally calibrate and start recording
/// 3. Run operator commands from stdin until `:quit`, end of input plus Ctrl+C, or Ctrl+C
/// 4. Stop recording, disconnect and export the session
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - The serial port cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path).with_context(|| format!("Failed to load {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("Transducer Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = SerialTransport::new(&config.serial);
    let engine = Engine::new(config.clone(), Box::new(transport))?;
    spawn_status_logger(&engine);

    engine
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", config.serial.port))?;

    if config.calibration.auto_on_connect {
        if let Err(e) = engine.calibration().calibrate_all(&engine.enabled_indices()).await {
            warn!("Calibration on connect failed: {}", e);
        }
    }

    if config.recording.auto_start {
        engine.start_recording();
    }

    info!("Type :status, :record, :stop, :tare N, :export or :quit (Ctrl+C to exit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut status_ticker = interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let outcome = match line.parse::<ConsoleCommand>() {
                            Ok(command) => console::execute(&engine, command).await,
                            Err(e) => Err(e),
                        };
                        match outcome {
                            Ok(Outcome::Quit) => break,
                            Ok(Outcome::Continue) => {}
                            Err(e) => warn!("{}", e),
                        }
                    }
                    Ok(None) => {
                        info!("Input closed, running until Ctrl+C");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        stdin_open = false;
                    }
                }
            }

            _ = status_ticker.tick() => {
                if engine.is_recording() {
                    info!("Recording: {} samples across enabled channels", engine.recorded_samples());
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    engine.stop_recording();
    if let Err(e) = engine.disconnect().await {
        warn!("Error while disconnecting: {}", e);
    }
    export_on_exit(&engine);

    Ok(())
}
