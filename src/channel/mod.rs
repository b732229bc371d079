//! # Channel Module
//!
//! Per-channel calibration and sample storage.
//!
//! This module handles:
//! - Raw-to-physical conversion (identity or inverted against the range)
//! - Tare offset latch
//! - Live display buffer (bounded FIFO)
//! - Session history with running min/max

pub mod buffer;
pub mod conversion;
pub mod state;

pub use buffer::Sample;
pub use conversion::ConversionPolicy;
pub use state::{channel_label, ChannelSnapshot, ChannelState, LiveSnapshot};
