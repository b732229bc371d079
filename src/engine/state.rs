//! # Engine State
//!
//! All channels plus the recording session. The engine keeps this behind a
//! single lock; every method here runs to completion without awaiting.

use std::time::Instant;
use tracing::{debug, info};

use crate::channel::{ChannelSnapshot, ChannelState, LiveSnapshot};
use crate::config::ChannelsConfig;
use crate::error::{MonitorError, Result};
use crate::protocol::message::MeasurementBatch;
use crate::session::{SessionController, SessionState};

/// Channels and session, mutated together under the engine lock
#[derive(Debug, Clone)]
pub struct EngineState {
    channels: Vec<ChannelState>,
    session: SessionController,
}

impl EngineState {
    /// Builds channels `1..=count` from the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Channel layout
    /// * `reference` - Initial time reference for timestamps
    pub fn new(config: &ChannelsConfig, reference: Instant) -> Self {
        let channels = (1..=config.count)
            .map(|index| {
                let mut channel = ChannelState::new(
                    index,
                    config.range_for(index),
                    config.live_capacity,
                    config.conversion,
                );
                channel.set_enabled(config.is_enabled(index));
                channel
            })
            .collect();

        Self {
            channels,
            session: SessionController::new(reference),
        }
    }

    pub fn channel_count(&self) -> u8 {
        // Bounded by the config's channel limit
        self.channels.len() as u8
    }

    pub fn channel(&self, index: u8) -> Option<&ChannelState> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
    }

    fn channel_mut(&mut self, index: u8) -> Result<&mut ChannelState> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.channels.get_mut(i))
            .ok_or(MonitorError::InvalidChannel(index))
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    /// Converts and stores one raw reading taken at `at`.
    ///
    /// # Returns
    ///
    /// * `Option<f64>` - Adjusted value, or `None` if the channel is unknown or disabled
    pub fn apply_raw_sample(&mut self, index: u8, raw: f64, at: Instant) -> Option<f64> {
        let now = self.session.elapsed(at);
        let recording = self.session.is_recording();

        match self.channel_mut(index) {
            Ok(channel) => channel.apply_raw_sample(raw, now, recording),
            Err(_) => {
                debug!("Ignoring reading for unknown channel {}", index);
                None
            }
        }
    }

    /// Applies every reading of a batch with one shared timestamp.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of readings stored
    pub fn ingest(&mut self, batch: &MeasurementBatch, at: Instant) -> usize {
        batch
            .readings
            .iter()
            .filter(|r| self.apply_raw_sample(r.channel, r.value, at).is_some())
            .count()
    }

    /// Toggles the tare latch of a channel
    pub fn tare(&mut self, index: u8) -> Result<bool> {
        Ok(self.channel_mut(index)?.tare())
    }

    /// Sets a channel's full-scale range
    pub fn set_range(&mut self, index: u8, range: f64) -> Result<()> {
        if !(range.is_finite() && range > 0.0) {
            return Err(MonitorError::InvalidRange(range));
        }
        self.channel_mut(index)?.set_range(range);
        Ok(())
    }

    pub fn set_enabled(&mut self, index: u8, enabled: bool) -> Result<()> {
        self.channel_mut(index)?.set_enabled(enabled);
        Ok(())
    }

    pub fn reset(&mut self, index: u8) -> Result<()> {
        self.channel_mut(index)?.reset();
        Ok(())
    }

    /// `Idle -> Recording`: new time reference, every history cleared.
    ///
    /// Live buffers are kept and rebased onto the new reference.
    ///
    /// # Returns
    ///
    /// * `bool` - `false` if a session was already running (nothing changes)
    pub fn start_recording(&mut self, at: Instant) -> bool {
        let Some(shift) = self.session.start(at) else {
            debug!("Recording already in progress");
            return false;
        };

        for channel in &mut self.channels {
            channel.clear_history();
            channel.rebase_live(shift);
        }

        info!("Recording started");
        true
    }

    /// `Recording -> Idle`. Recorded data stays available.
    pub fn stop_recording(&mut self) -> bool {
        let stopped = self.session.stop();
        if stopped {
            info!("Recording stopped");
        }
        stopped
    }

    pub fn enabled_indices(&self) -> Vec<u8> {
        self.channels
            .iter()
            .filter(|c| c.is_enabled())
            .map(ChannelState::index)
            .collect()
    }

    /// Session samples held by enabled channels
    pub fn recorded_samples(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.history().len())
            .sum()
    }

    /// Display copies, without session histories
    pub fn live_snapshots(&self) -> Vec<LiveSnapshot> {
        self.channels.iter().map(ChannelState::live_snapshot).collect()
    }

    /// Full copies including session histories
    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        self.channels.iter().map(ChannelState::snapshot).collect()
    }
}
