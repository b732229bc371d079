//! # Session Export
//!
//! Writes a finished recording to disk as CSV plus a JSON summary report.
//! Works purely on snapshots, so the acquisition loop is never held up by
//! file I/O.

pub mod csv;
pub mod report;

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::channel::ChannelSnapshot;
use crate::error::{MonitorError, Result};

pub use report::{ChannelSummary, SessionReport};

/// Prefix of exported file names
pub const FILE_PREFIX: &str = "transducers";

/// Files written by [`export_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub report: PathBuf,
}

/// File stem for an export taken at `now`, e.g. `transducers_20240301_103000`
pub fn file_stem(now: &DateTime<Local>) -> String {
    format!("{}_{}", FILE_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

/// Export the recorded session of all enabled channels
///
/// # Arguments
///
/// * `channels` - Channel snapshots taken after recording stopped
/// * `dir` - Output directory, created if missing
/// * `precision` - Decimal places in the CSV
/// * `now` - Timestamp used for file names and the report
///
/// # Errors
///
/// Returns `Export` if no enabled channel recorded anything, or the
/// underlying I/O or serialisation error
pub fn export_session(
    channels: &[ChannelSnapshot],
    dir: &Path,
    precision: usize,
    now: DateTime<Local>,
) -> Result<ExportPaths> {
    let report = SessionReport::from_snapshot(channels, now);
    if report.is_empty() {
        return Err(MonitorError::Export("no recorded data to export".to_string()));
    }

    fs::create_dir_all(dir)?;

    let stem = file_stem(&now);
    let paths = ExportPaths {
        csv: dir.join(format!("{}.csv", stem)),
        report: dir.join(format!("{}.json", stem)),
    };

    csv::export_csv(&paths.csv, channels, precision)?;
    report.write_json(&paths.report)?;

    info!("Session exported to {}", dir.display());
    Ok(paths)
}
