//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section has defaults except the channel conversion policy: firmware
//! revisions disagree on whether readings are reported as distance travelled
//! or distance remaining, so the deployment has to state which one it runs.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::channel::conversion::ConversionPolicy;
use crate::error::{MonitorError, Result};

/// Baud rates the acquisition firmware is known to run at
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200];

/// Upper bound for the channel count (calibration selects channels with one digit)
pub const MAX_CHANNELS: u8 = 9;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait after opening the port; the board resets when the port opens
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Channel layout and calibration defaults
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelsConfig {
    #[serde(default = "default_channel_count")]
    pub count: u8,

    #[serde(default = "default_enabled")]
    pub enabled: Vec<u8>,

    #[serde(default = "default_range")]
    pub default_range: f64,

    /// Optional per-channel range overrides, index `i` applies to channel `i + 1`
    #[serde(default)]
    pub ranges: Vec<f64>,

    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,

    pub conversion: ConversionPolicy,
}

/// Device-side housekeeping on connect/disconnect
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_indicators")]
    pub indicators: bool,

    #[serde(default)]
    pub disable_on_disconnect: bool,
}

/// Calibration routine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    #[serde(default)]
    pub auto_on_connect: bool,
}

/// Recording and export configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default)]
    pub auto_start: bool,

    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    #[serde(default = "default_precision")]
    pub precision: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; empty disables file logging
    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 1000 }
fn default_settle_delay_ms() -> u64 { 2000 }
fn default_poll_interval_ms() -> u64 { 1 }

fn default_channel_count() -> u8 { 5 }
fn default_enabled() -> Vec<u8> { vec![1, 2, 3, 4, 5] }
fn default_range() -> f64 { 25.0 }
fn default_live_capacity() -> usize { 200 }

fn default_indicators() -> bool { true }

fn default_step_delay_ms() -> u64 { 500 }

fn default_export_dir() -> String { "./recordings".to_string() }
fn default_precision() -> usize { 4 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
            disable_on_disconnect: false,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            auto_on_connect: false,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            export_dir: default_export_dir(),
            precision: default_precision(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

impl ChannelsConfig {
    /// Channel layout with defaults for everything but the conversion policy
    pub fn with_conversion(conversion: ConversionPolicy) -> Self {
        Self {
            count: default_channel_count(),
            enabled: default_enabled(),
            default_range: default_range(),
            ranges: Vec::new(),
            live_capacity: default_live_capacity(),
            conversion,
        }
    }

    /// Initial full-scale range for a channel (1-based index)
    pub fn range_for(&self, index: u8) -> f64 {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.ranges.get(i).copied())
            .unwrap_or(self.default_range)
    }

    /// Whether a channel starts enabled
    pub fn is_enabled(&self, index: u8) -> bool {
        self.enabled.contains(&index)
    }
}

impl SerialConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CalibrationConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Config {
    /// Configuration with defaults everywhere and the given conversion policy
    pub fn with_conversion(conversion: ConversionPolicy) -> Self {
        Self {
            serial: SerialConfig::default(),
            channels: ChannelsConfig::with_conversion(conversion),
            device: DeviceConfig::default(),
            calibration: CalibrationConfig::default(),
            recording: RecordingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use transducer_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.settle_delay_ms > 10000 {
            return Err(invalid("settle_delay_ms must be between 0 and 10000"));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        let channels = &self.channels;
        if channels.count == 0 || channels.count > MAX_CHANNELS {
            return Err(invalid(format!("channel count must be between 1 and {}", MAX_CHANNELS)));
        }

        for &index in &channels.enabled {
            if index == 0 || index > channels.count {
                return Err(invalid(format!(
                    "enabled channel {} is out of bounds (must be 1-{})",
                    index, channels.count
                )));
            }
        }

        if !(channels.default_range.is_finite() && channels.default_range > 0.0) {
            return Err(invalid("default_range must be a positive number"));
        }

        if channels.ranges.len() > usize::from(channels.count) {
            return Err(invalid("ranges has more entries than there are channels"));
        }

        if channels.ranges.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(invalid("ranges entries must be positive numbers"));
        }

        if channels.live_capacity == 0 {
            return Err(invalid("live_capacity must be greater than 0"));
        }

        if self.calibration.step_delay_ms == 0 || self.calibration.step_delay_ms > 10000 {
            return Err(invalid("step_delay_ms must be between 1 and 10000"));
        }

        if self.recording.export_dir.is_empty() {
            return Err(invalid("export_dir cannot be empty"));
        }

        if self.recording.precision > 10 {
            return Err(invalid("precision must be between 0 and 10"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> MonitorError {
    MonitorError::Config(toml::de::Error::custom(msg))
}
