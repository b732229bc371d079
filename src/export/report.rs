//! # Session Report
//!
//! Per-channel summary of a recording: current, average, min, max and sample
//! count, with the tare offset noted. Rendered as a text table for the
//! terminal and serialised to JSON for archiving.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::channel::ChannelSnapshot;
use crate::error::Result;

/// Summary of one channel's session history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub index: u8,
    pub label: String,
    pub offset: f64,
    pub is_tared: bool,
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
    /// Time span covered by the history, in seconds
    pub duration: f64,
}

impl ChannelSummary {
    /// Summarise a channel, `None` when its history is empty
    pub fn from_snapshot(channel: &ChannelSnapshot) -> Option<Self> {
        let first = channel.history.first()?;
        let last = channel.history.last()?;
        let samples = channel.history.len();
        let sum: f64 = channel.history.iter().map(|s| s.value).sum();

        let (min, max) = channel.history.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });

        Some(Self {
            index: channel.index,
            label: channel.label.clone(),
            offset: channel.offset,
            is_tared: channel.is_tared,
            current: last.value,
            average: sum / samples as f64,
            min: channel.session_min.unwrap_or(min),
            max: channel.session_max.unwrap_or(max),
            samples,
            duration: last.t - first.t,
        })
    }
}

/// Report over every enabled channel that recorded something
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Local>,
    pub channels: Vec<ChannelSummary>,
}

impl SessionReport {
    pub fn from_snapshot(channels: &[ChannelSnapshot], generated_at: DateTime<Local>) -> Self {
        Self {
            generated_at,
            channels: channels
                .iter()
                .filter(|c| c.enabled)
                .filter_map(ChannelSummary::from_snapshot)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Plain-text summary table
    pub fn render(&self, precision: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Session report {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"));

        if self.channels.is_empty() {
            let _ = writeln!(out, "No recorded data");
            return out;
        }

        let _ = writeln!(
            out,
            "{:<10} {:>12} {:>12} {:>12} {:>12} {:>8}  {}",
            "Channel", "Current", "Average", "Min", "Max", "Samples", "Offset"
        );
        for c in &self.channels {
            let offset = if c.is_tared {
                format!("{:.*} (tared)", precision, c.offset)
            } else {
                format!("{:.*}", precision, c.offset)
            };
            let _ = writeln!(
                out,
                "{:<10} {:>12.p$} {:>12.p$} {:>12.p$} {:>12.p$} {:>8}  {}",
                c.label,
                c.current,
                c.average,
                c.min,
                c.max,
                c.samples,
                offset,
                p = precision
            );
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("Wrote session report to {}", path.display());
        Ok(())
    }
}
