//! # Channel State
//!
//! Calibration and sample storage for one physical sensor slot.
//!
//! The tare offset is a two-state latch: the first `tare` zeroes the channel
//! at its latest displayed value, the second removes the correction again.
//!
//! ```
//! use transducer_monitor::channel::conversion::ConversionPolicy;
//! use transducer_monitor::channel::state::ChannelState;
//!
//! let mut ch = ChannelState::new(1, 25.0, 200, ConversionPolicy::Identity);
//! ch.set_enabled(true);
//! assert_eq!(ch.apply_raw_sample(10.0, 0.0, false), Some(10.0));
//!
//! ch.tare();
//! assert_eq!(ch.apply_raw_sample(10.0, 0.1, false), Some(0.0));
//!
//! ch.tare();
//! assert_eq!(ch.apply_raw_sample(10.0, 0.2, false), Some(10.0));
//! ```

use serde::Serialize;

use super::buffer::{LiveBuffer, Sample, SessionHistory};
use super::conversion::ConversionPolicy;

/// Display label for a channel index
pub fn channel_label(index: u8) -> String {
    format!("Sensor {}", index)
}

/// Mutable state of one channel
#[derive(Debug, Clone)]
pub struct ChannelState {
    index: u8,
    enabled: bool,
    offset: f64,
    range: f64,
    is_tared: bool,
    conversion: ConversionPolicy,
    live: LiveBuffer,
    history: SessionHistory,
}

impl ChannelState {
    /// Creates a disabled channel with empty buffers and no offset.
    ///
    /// # Arguments
    ///
    /// * `index` - Channel index (1-based)
    /// * `range` - Initial full-scale range
    /// * `live_capacity` - Live buffer capacity in samples
    /// * `conversion` - Raw-to-physical conversion policy
    pub fn new(index: u8, range: f64, live_capacity: usize, conversion: ConversionPolicy) -> Self {
        Self {
            index,
            enabled: false,
            offset: 0.0,
            range,
            is_tared: false,
            conversion,
            live: LiveBuffer::new(live_capacity),
            history: SessionHistory::new(),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn is_tared(&self) -> bool {
        self.is_tared
    }

    pub fn live(&self) -> &LiveBuffer {
        &self.live
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Converts, offsets and stores one raw reading.
    ///
    /// # Arguments
    ///
    /// * `raw` - Value as reported by the board
    /// * `now` - Timestamp relative to the session start reference
    /// * `recording` - Whether the sample also goes into the session history
    ///
    /// # Returns
    ///
    /// * `Option<f64>` - Adjusted value, or `None` when the channel is disabled
    pub fn apply_raw_sample(&mut self, raw: f64, now: f64, recording: bool) -> Option<f64> {
        if !self.enabled {
            return None;
        }

        let adjusted = self.conversion.apply(raw, self.range) - self.offset;
        let sample = Sample::new(now, adjusted);

        self.live.push(sample);
        if recording {
            self.history.push(sample);
        }

        Some(adjusted)
    }

    /// Toggles the tare latch.
    ///
    /// When not tared, the latest live value is folded into the offset so the
    /// next identical reading displays as zero. With an empty live buffer
    /// nothing changes. When tared, the offset is cleared.
    ///
    /// # Returns
    ///
    /// * `bool` - Latch state after the call
    pub fn tare(&mut self) -> bool {
        if self.is_tared {
            self.offset = 0.0;
            self.is_tared = false;
        } else if let Some(latest) = self.live.latest() {
            self.offset += latest.value;
            self.is_tared = true;
        }
        self.is_tared
    }

    /// Sets the full-scale range. Buffered values are not rescaled.
    pub fn set_range(&mut self, range: f64) {
        self.range = range;
    }

    /// Enables or disables sample intake. Buffers are left untouched.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Clears both buffers, the offset, the tare latch and the extrema.
    pub fn reset(&mut self) {
        self.live.clear();
        self.history.clear();
        self.offset = 0.0;
        self.is_tared = false;
    }

    /// Clears the session history only (new recording session).
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Moves the live buffer onto a new time reference `shift` seconds later.
    pub fn rebase_live(&mut self, shift: f64) {
        self.live.rebase(shift);
    }

    /// Copy of the channel for display, without the session history
    ///
    /// Cost is bounded by the live buffer capacity however long the
    /// session runs.
    pub fn live_snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            index: self.index,
            label: channel_label(self.index),
            enabled: self.enabled,
            offset: self.offset,
            range: self.range,
            is_tared: self.is_tared,
            latest: self.live.latest().map(|s| s.value),
            live: self.live.to_vec(),
            recorded: self.history.len(),
            session_min: self.history.min(),
            session_max: self.history.max(),
        }
    }

    /// Full copy of the channel including the session history, for export
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            index: self.index,
            label: channel_label(self.index),
            enabled: self.enabled,
            offset: self.offset,
            range: self.range,
            is_tared: self.is_tared,
            latest: self.live.latest().map(|s| s.value),
            live: self.live.to_vec(),
            history: self.history.samples().to_vec(),
            session_min: self.history.min(),
            session_max: self.history.max(),
        }
    }
}

/// Display copy of a channel; the history is represented by its length only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub index: u8,
    pub label: String,
    pub enabled: bool,
    pub offset: f64,
    pub range: f64,
    pub is_tared: bool,
    pub latest: Option<f64>,
    pub live: Vec<Sample>,
    /// Samples in the session history
    pub recorded: usize,
    pub session_min: Option<f64>,
    pub session_max: Option<f64>,
}

/// Point-in-time copy of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub index: u8,
    pub label: String,
    pub enabled: bool,
    pub offset: f64,
    pub range: f64,
    pub is_tared: bool,
    pub latest: Option<f64>,
    pub live: Vec<Sample>,
    pub history: Vec<Sample>,
    pub session_min: Option<f64>,
    pub session_max: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_channel(conversion: ConversionPolicy) -> ChannelState {
        let mut ch = ChannelState::new(1, 25.0, 4, conversion);
        ch.set_enabled(true);
        ch
    }

    #[test]
    fn test_new_channel_is_disabled_and_empty() {
        let ch = ChannelState::new(3, 25.0, 200, ConversionPolicy::Inverted);
        assert_eq!(ch.index(), 3);
        assert!(!ch.is_enabled());
        assert_eq!(ch.offset(), 0.0);
        assert!(!ch.is_tared());
        assert!(ch.live().is_empty());
        assert!(ch.history().is_empty());
    }

    #[test]
    fn test_disabled_channel_ignores_samples() {
        let mut ch = ChannelState::new(1, 25.0, 4, ConversionPolicy::Identity);
        assert_eq!(ch.apply_raw_sample(1.0, 0.0, true), None);
        assert!(ch.live().is_empty());
        assert!(ch.history().is_empty());
    }

    #[test]
    fn test_apply_identity_and_inverted() {
        let mut identity = enabled_channel(ConversionPolicy::Identity);
        assert_eq!(identity.apply_raw_sample(12.5, 0.0, false), Some(12.5));

        let mut inverted = enabled_channel(ConversionPolicy::Inverted);
        assert_eq!(inverted.apply_raw_sample(10.0, 0.0, false), Some(15.0));
    }

    #[test]
    fn test_idle_samples_skip_history() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        ch.apply_raw_sample(1.0, 0.0, false);
        ch.apply_raw_sample(2.0, 0.1, false);
        assert_eq!(ch.live().len(), 2);
        assert!(ch.history().is_empty());
        assert_eq!(ch.history().min(), None);
    }

    #[test]
    fn test_recording_updates_history_and_extrema() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        for (i, v) in [4.0, -2.0, 9.0, 1.0].iter().enumerate() {
            ch.apply_raw_sample(*v, i as f64, true);
        }
        assert_eq!(ch.history().len(), 4);
        assert_eq!(ch.history().min(), Some(-2.0));
        assert_eq!(ch.history().max(), Some(9.0));
    }

    #[test]
    fn test_tare_on_empty_buffer_is_noop() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        assert!(!ch.tare());
        assert_eq!(ch.offset(), 0.0);
        assert!(!ch.is_tared());
    }

    #[test]
    fn test_tare_twice_round_trips_offset() {
        let mut ch = enabled_channel(ConversionPolicy::Inverted);
        let before = ch.apply_raw_sample(5.0, 0.0, false).unwrap();
        assert_eq!(before, 20.0);

        assert!(ch.tare());
        assert_eq!(ch.offset(), 20.0);
        let zeroed = ch.apply_raw_sample(5.0, 0.1, false).unwrap();
        assert!(zeroed.abs() < 1e-12, "Tared reading should be ~0, got {}", zeroed);

        assert!(!ch.tare());
        assert_eq!(ch.offset(), 0.0);
        assert_eq!(ch.apply_raw_sample(5.0, 0.2, false), Some(before));
    }

    #[test]
    fn test_set_range_does_not_rescale_buffer() {
        let mut ch = enabled_channel(ConversionPolicy::Inverted);
        ch.apply_raw_sample(5.0, 0.0, false);
        ch.set_range(40.0);
        assert_eq!(ch.live().latest().unwrap().value, 20.0);
        assert_eq!(ch.apply_raw_sample(5.0, 0.1, false), Some(35.0));
    }

    #[test]
    fn test_disable_keeps_buffers() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        ch.apply_raw_sample(1.0, 0.0, true);
        ch.set_enabled(false);
        assert_eq!(ch.apply_raw_sample(2.0, 0.1, true), None);
        assert_eq!(ch.live().len(), 1);
        assert_eq!(ch.history().len(), 1);

        ch.set_enabled(true);
        assert_eq!(ch.apply_raw_sample(3.0, 0.2, true), Some(3.0));
        assert_eq!(ch.history().len(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        ch.apply_raw_sample(1.0, 0.0, true);
        ch.tare();
        ch.reset();
        assert!(ch.live().is_empty());
        assert!(ch.history().is_empty());
        assert_eq!(ch.offset(), 0.0);
        assert!(!ch.is_tared());
        assert_eq!(ch.history().max(), None);
        assert!(ch.is_enabled(), "reset does not change enablement");
    }

    #[test]
    fn test_snapshot_copies_state() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        ch.apply_raw_sample(1.0, 0.0, true);
        ch.apply_raw_sample(3.0, 0.5, false);
        let snap = ch.snapshot();
        assert_eq!(snap.label, "Sensor 1");
        assert_eq!(snap.latest, Some(3.0));
        assert_eq!(snap.live.len(), 2);
        assert_eq!(snap.history, vec![Sample::new(0.0, 1.0)]);
        assert_eq!(snap.session_min, Some(1.0));
        assert_eq!(snap.session_max, Some(1.0));
    }

    #[test]
    fn test_live_snapshot_leaves_history_out() {
        let mut ch = enabled_channel(ConversionPolicy::Identity);
        for i in 0..10 {
            ch.apply_raw_sample(i as f64, i as f64 * 0.1, true);
        }
        let live = ch.live_snapshot();
        assert_eq!(live.recorded, 10);
        assert_eq!(live.live.len(), 4, "bounded by the live capacity");
        assert_eq!(live.latest, Some(9.0));
        assert_eq!(live.session_min, Some(0.0));
        assert_eq!(live.session_max, Some(9.0));
        assert_eq!(ch.snapshot().history.len(), 10);
    }
}
