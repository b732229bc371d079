//! # Command Gateway
//!
//! Validates and writes outbound commands and correlates range
//! acknowledgements with the channel they belong to.
//!
//! The protocol carries no request identifiers, so acknowledgements are
//! matched by channel index only. They are advisory: a missing one is
//! tolerated without timeout or retry, since the board re-announces every
//! range on its next start.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};
use crate::protocol::encoder::{encode_line, Command};
use crate::protocol::message::RangeAck;
use crate::serial::LineTransport;

/// Transport shared between the acquisition loop and the gateway
pub type SharedTransport = Arc<tokio::sync::Mutex<Box<dyn LineTransport>>>;

/// What an outstanding command expects to hear back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    RangeUpdate,
}

/// A command still waiting for its acknowledgement line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAck {
    pub channel: u8,
    pub kind: AckKind,
    /// Range value that was requested
    pub requested: f64,
    pub issued_at: Instant,
}

/// Outbound command path to the board
pub struct CommandGateway {
    transport: SharedTransport,
    channel_count: u8,
    pending: Mutex<HashMap<u8, PendingAck>>,
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("channel_count", &self.channel_count)
            .finish_non_exhaustive()
    }
}

impl CommandGateway {
    pub fn new(transport: SharedTransport, channel_count: u8) -> Self {
        Self {
            transport,
            channel_count,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u8, PendingAck>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject channel indices outside `1..=channel_count`
    pub fn check_channel(&self, channel: u8) -> Result<()> {
        if channel == 0 || channel > self.channel_count {
            return Err(MonitorError::InvalidChannel(channel));
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_open()
    }

    /// Write one line of text to the board
    ///
    /// # Arguments
    ///
    /// * `text` - Command text without terminator (empty sends a bare terminator)
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without writing anything when the transport is
    /// closed, or `Serial` if the write fails
    pub async fn send_command(&self, text: &str) -> Result<()> {
        let mut port = self.transport.lock().await;
        if !port.is_open() {
            warn!("Cannot send '{}': not connected", text);
            return Err(MonitorError::NotConnected);
        }

        port.write_all(&encode_line(text))
            .await
            .map_err(|e| MonitorError::Serial(format!("Failed to send '{}': {}", text, e)))?;

        port.flush()
            .await
            .map_err(|e| MonitorError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent command: {:?}", text);
        Ok(())
    }

    /// Validate and send a structured command
    pub async fn send(&self, command: Command) -> Result<()> {
        if let Some(channel) = command.channel() {
            self.check_channel(channel)?;
        }
        self.send_command(&command.to_string()).await
    }

    /// Send `R<idx>,<value>` and remember that an acknowledgement is due
    ///
    /// # Errors
    ///
    /// Returns error if the channel or range is invalid, or sending fails
    pub async fn set_channel_range(&self, channel: u8, range: f64) -> Result<()> {
        self.check_channel(channel)?;
        if !(range.is_finite() && range > 0.0) {
            return Err(MonitorError::InvalidRange(range));
        }

        // Registered before the write: the read task may route the ack
        // before `send` returns.
        self.pending().insert(
            channel,
            PendingAck {
                channel,
                kind: AckKind::RangeUpdate,
                requested: range,
                issued_at: Instant::now(),
            },
        );

        if let Err(e) = self.send(Command::SetRange { channel, range }).await {
            self.pending().remove(&channel);
            return Err(e);
        }
        Ok(())
    }

    /// Match an inbound range acknowledgement to an outstanding request
    ///
    /// # Returns
    ///
    /// * `Option<PendingAck>` - The request it answers, `None` for an unsolicited announcement
    pub fn acknowledge(&self, ack: &RangeAck) -> Option<PendingAck> {
        let matched = self.pending().remove(&ack.channel);
        if let Some(pending) = &matched {
            debug!(
                "Range for channel {} acknowledged after {:?} (requested {}, got {})",
                ack.channel,
                pending.issued_at.elapsed(),
                pending.requested,
                ack.range
            );
        }
        matched
    }

    /// Outstanding acknowledgements, ordered by channel
    pub fn pending_acks(&self) -> Vec<PendingAck> {
        let mut acks: Vec<PendingAck> = self.pending().values().copied().collect();
        acks.sort_by_key(|a| a.channel);
        acks
    }

    pub fn clear_pending(&self) {
        self.pending().clear();
    }

    /// Blink the channel's indicator and open the calibration menu
    pub async fn begin_calibration(&self, channel: u8) -> Result<()> {
        self.send(Command::IndicatorBlink(channel)).await?;
        self.send(Command::Calibrate).await
    }

    /// Pick the channel inside the calibration menu and light its indicator
    pub async fn select_calibration_channel(&self, channel: u8) -> Result<()> {
        self.send(Command::SelectChannel(channel)).await?;
        self.send(Command::IndicatorOn(channel)).await
    }

    pub async fn save_calibration(&self) -> Result<()> {
        self.send(Command::Save).await
    }

    /// Answer a "press ENTER" prompt
    pub async fn confirm(&self) -> Result<()> {
        self.send(Command::Confirm).await
    }
}
