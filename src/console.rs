//! # Operator Console
//!
//! Line commands typed on the terminal while the monitor runs.
//!
//! Lines starting with `:` drive the engine; an empty line confirms a
//! firmware prompt; anything else goes to the board verbatim.
//!
//! ```text
//! :record              start a recording session
//! :stop                stop recording
//! :tare N              toggle tare on channel N
//! :reset N             clear channel N
//! :enable N / :disable N
//! :range N V           ask the board to set channel N's range to V mm
//! :calibrate N|all     run the calibration routine
//! :save                store the calibration on the board
//! :export              write the recorded session to disk
//! :status              print a per-channel summary
//! :quit                leave
//! ```

use chrono::Local;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::engine::{Engine, LiveView};
use crate::error::{MonitorError, Result};
use crate::export;

/// Parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Record,
    Stop,
    Tare(u8),
    Reset(u8),
    Enable(u8),
    Disable(u8),
    Range(u8, f64),
    /// `None` calibrates every enabled channel
    Calibrate(Option<u8>),
    Save,
    Export,
    Status,
    Quit,
    /// Bare terminator, answers "press ENTER"
    Confirm,
    /// Text sent to the board as typed
    Raw(String),
}

/// What the console loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

fn channel_arg(arg: Option<&str>, line: &str) -> Result<u8> {
    arg.and_then(|a| a.parse().ok())
        .ok_or_else(|| MonitorError::InvalidCommand(format!("'{}' needs a channel number", line)))
}

impl FromStr for ConsoleCommand {
    type Err = MonitorError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Confirm);
        }

        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Self::Raw(line.to_string()));
        };

        let mut args = rest.split_whitespace();
        let name = args.next().unwrap_or_default().to_ascii_lowercase();
        let first = args.next();

        let command = match name.as_str() {
            "record" | "start" => Self::Record,
            "stop" => Self::Stop,
            "tare" => Self::Tare(channel_arg(first, line)?),
            "reset" => Self::Reset(channel_arg(first, line)?),
            "enable" => Self::Enable(channel_arg(first, line)?),
            "disable" => Self::Disable(channel_arg(first, line)?),
            "range" => {
                let channel = channel_arg(first, line)?;
                let value = args
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| MonitorError::InvalidCommand(format!("'{}' needs a range value", line)))?;
                Self::Range(channel, value)
            }
            "calibrate" | "cal" => match first {
                None | Some("all") => Self::Calibrate(None),
                Some(_) => Self::Calibrate(Some(channel_arg(first, line)?)),
            },
            "save" => Self::Save,
            "export" => Self::Export,
            "status" => Self::Status,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return Err(MonitorError::InvalidCommand(line.to_string())),
        };

        if args.next().is_some() {
            return Err(MonitorError::InvalidCommand(format!("'{}' has too many arguments", line)));
        }
        Ok(command)
    }
}

/// Run one console command against the engine
///
/// # Errors
///
/// Returns the engine error; the console reports it and keeps going
pub async fn execute(engine: &Engine, command: ConsoleCommand) -> Result<Outcome> {
    match command {
        ConsoleCommand::Record => {
            if !engine.start_recording() {
                warn!("Already recording");
            }
        }
        ConsoleCommand::Stop => {
            if !engine.stop_recording() {
                warn!("Not recording");
            }
        }
        ConsoleCommand::Tare(channel) => {
            let tared = engine.tare(channel)?;
            info!("Channel {} tare {}", channel, if tared { "applied" } else { "removed" });
        }
        ConsoleCommand::Reset(channel) => engine.reset(channel)?,
        ConsoleCommand::Enable(channel) => engine.set_enabled(channel, true).await?,
        ConsoleCommand::Disable(channel) => engine.set_enabled(channel, false).await?,
        ConsoleCommand::Range(channel, value) => engine.set_channel_range(channel, value).await?,
        ConsoleCommand::Calibrate(Some(channel)) => engine.calibration().calibrate(channel).await?,
        ConsoleCommand::Calibrate(None) => {
            let channels = engine.enabled_indices();
            engine.calibration().calibrate_all(&channels).await?;
        }
        ConsoleCommand::Save => engine.calibration().save().await?,
        ConsoleCommand::Export => {
            let config = &engine.config().recording;
            let paths = export::export_session(
                &engine.snapshot().channels,
                Path::new(&config.export_dir),
                config.precision,
                Local::now(),
            )?;
            info!("Exported {} and {}", paths.csv.display(), paths.report.display());
        }
        ConsoleCommand::Status => {
            for line in status_lines(&engine.live_snapshot(), engine.config().recording.precision) {
                info!("{}", line);
            }
        }
        ConsoleCommand::Quit => return Ok(Outcome::Quit),
        ConsoleCommand::Confirm => engine.gateway().confirm().await?,
        ConsoleCommand::Raw(text) => engine.send_command(&text).await?,
    }
    Ok(Outcome::Continue)
}

/// One summary line for the link and one per channel
pub fn status_lines(snapshot: &LiveView, precision: usize) -> Vec<String> {
    let mut lines = vec![format!("Link: {:?}, session: {:?}", snapshot.link, snapshot.session)];

    for c in &snapshot.channels {
        let latest = c
            .latest
            .map(|v| format!("{:.*}", precision, v))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{}: {} latest={} range={} offset={:.*}{} recorded={}",
            c.label,
            if c.enabled { "on " } else { "off" },
            latest,
            c.range,
            precision,
            c.offset,
            if c.is_tared { " (tared)" } else { "" },
            c.recorded
        ));
    }
    lines
}
