//! # CSV Export
//!
//! One row per recorded sample index. The time column comes from the first
//! enabled channel's history; a channel with a shorter history leaves its
//! cell empty.

use std::fs::File;
use std::io;
use std::path::Path;
use tracing::info;

use crate::channel::ChannelSnapshot;
use crate::error::{MonitorError, Result};

/// Header of the time column
pub const TIME_HEADER: &str = "Time(s)";

/// Write the session history of all enabled channels as CSV
///
/// # Arguments
///
/// * `channels` - Channel snapshots; disabled ones are skipped
/// * `precision` - Decimal places for every number
/// * `writer` - Destination
///
/// # Returns
///
/// * `Result<usize>` - Number of data rows written
///
/// # Errors
///
/// Returns `Export` if no channel is enabled, or the CSV/I/O error
pub fn write_csv<W: io::Write>(channels: &[ChannelSnapshot], precision: usize, writer: W) -> Result<usize> {
    let enabled: Vec<&ChannelSnapshot> = channels.iter().filter(|c| c.enabled).collect();
    let Some(first) = enabled.first() else {
        return Err(MonitorError::Export("no enabled channels to export".to_string()));
    };

    let mut w = ::csv::Writer::from_writer(writer);

    let mut header = vec![TIME_HEADER.to_string()];
    header.extend(enabled.iter().map(|c| c.label.clone()));
    w.write_record(&header)?;

    let rows = first.history.len();
    for i in 0..rows {
        let mut record = Vec::with_capacity(enabled.len() + 1);
        record.push(format!("{:.*}", precision, first.history[i].t));
        for channel in &enabled {
            record.push(
                channel
                    .history
                    .get(i)
                    .map(|s| format!("{:.*}", precision, s.value))
                    .unwrap_or_default(),
            );
        }
        w.write_record(&record)?;
    }

    w.flush()?;
    Ok(rows)
}

/// Write the CSV export to a file
pub fn export_csv(path: &Path, channels: &[ChannelSnapshot], precision: usize) -> Result<usize> {
    let file = File::create(path)?;
    let rows = write_csv(channels, precision, file)?;
    info!("Exported {} rows to {}", rows, path.display());
    Ok(rows)
}
