//! # Error Types
//!
//! Custom error types for the transducer monitor using `thiserror`.
//!
//! Only connection-level and command-level failures ever reach a caller.
//! Problems local to a single line, field or sample are logged and absorbed
//! where they happen.

use thiserror::Error;

/// Main error type for the transducer monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors (write/flush/read)
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Opening the transport failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A command was issued while no device is connected
    #[error("Not connected to a device")]
    NotConnected,

    /// Channel index outside the configured 1..=N
    #[error("Invalid channel index: {0}")]
    InvalidChannel(u8),

    /// Range value that the device would reject
    #[error("Invalid range value: {0}")]
    InvalidRange(f64),

    /// Operator console input that does not parse
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Export precondition failures
    #[error("Export error: {0}")]
    Export(String),

    /// CSV serialisation errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialisation errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the transducer monitor
pub type Result<T> = std::result::Result<T, MonitorError>;
