//! # Line Protocol Constants and Types
//!
//! Core definitions for the newline-terminated text protocol spoken by the
//! acquisition board.

/// Line terminator for outbound commands
pub const LINE_TERMINATOR: &str = "\n";

/// Long channel label prefix in measurement lines (`Pot1:12.3`)
pub const LABEL_PREFIX_LONG: &str = "Pot";

/// Short channel label prefix in measurement lines (`P1:12.3`)
pub const LABEL_PREFIX_SHORT: &str = "P";

/// Field delimiters inside a measurement line
pub const FIELD_DELIMITERS: &[char] = &[',', '|'];

/// Separator between a channel label and its value
pub const VALUE_SEPARATOR: char = ':';

/// Words introducing a range value, English and Spanish firmware
pub const RANGE_KEYWORDS: &[&str] = &["Range", "Rango"];

/// Unit suffix the board appends to range values
pub const RANGE_UNIT: &str = "mm";

/// One `label:value` field of a measurement line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Channel index (1-based)
    pub channel: u8,

    /// Raw value as reported by the board
    pub value: f64,
}

/// All fields of one measurement line that decoded successfully
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementBatch {
    pub readings: Vec<Reading>,

    /// Number of fields dropped as malformed
    pub skipped: usize,
}

impl MeasurementBatch {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }
}

/// Device announcement of a channel's full-scale range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAck {
    /// Channel index (1-based)
    pub channel: u8,

    /// New full-scale range in mm
    pub range: f64,
}

/// Classification of one inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Channel readings
    Measurement(MeasurementBatch),

    /// Range announcement or range-set acknowledgement
    RangeAck(RangeAck),

    /// Anything else, forwarded verbatim
    Status(String),
}
