//! # Conversion Policy
//!
//! Turns a raw reading into a physical value using the channel's full-scale
//! range.
//!
//! Two firmware families are in the field:
//!
//! - `identity`: the board already reports the physical value
//! - `inverted`: the board reports travel from the far end, so the physical
//!   value is `range - raw` (a reading of 30 on a 30 mm transducer is 0 mm)
//!
//! ```
//! use transducer_monitor::channel::conversion::ConversionPolicy;
//!
//! assert_eq!(ConversionPolicy::Identity.apply(12.5, 25.0), 12.5);
//! assert_eq!(ConversionPolicy::Inverted.apply(10.0, 25.0), 15.0);
//! ```

use serde::{Deserialize, Serialize};

/// Raw-to-physical conversion applied before the tare offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionPolicy {
    /// `physical = raw`
    Identity,
    /// `physical = range - raw`
    Inverted,
}

impl ConversionPolicy {
    /// Applies the conversion.
    ///
    /// # Arguments
    ///
    /// * `raw` - Value as reported by the board
    /// * `range` - Channel full-scale range
    #[must_use]
    pub fn apply(self, raw: f64, range: f64) -> f64 {
        match self {
            ConversionPolicy::Identity => raw,
            ConversionPolicy::Inverted => range - raw,
        }
    }
}
