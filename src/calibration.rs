//! # Calibration Routine
//!
//! Walks the board's calibration menu for one or more channels. Every step
//! is a fire-and-forget command; the fixed delay between steps gives the
//! firmware time to print its next prompt.
//!
//! Per channel: `LBLINK<idx>`, `C`, wait, `<idx>`, `LON<idx>`, wait. The
//! firmware then asks the operator to move the sensor to its end stops and
//! press ENTER ([`CommandGateway::confirm`]); `S` stores the result.

use std::time::Duration;
use tracing::info;

use crate::engine::CommandGateway;
use crate::error::Result;

/// Caller-driven calibration sequence
#[derive(Debug)]
pub struct CalibrationRoutine<'a> {
    gateway: &'a CommandGateway,
    step_delay: Duration,
}

impl<'a> CalibrationRoutine<'a> {
    pub fn new(gateway: &'a CommandGateway, step_delay: Duration) -> Self {
        Self { gateway, step_delay }
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Enter calibration for one channel
    ///
    /// # Errors
    ///
    /// Returns error if the channel is invalid or a step cannot be sent;
    /// later steps are not attempted
    pub async fn calibrate(&self, channel: u8) -> Result<()> {
        self.gateway.check_channel(channel)?;
        info!("Calibrating channel {}", channel);

        self.gateway.begin_calibration(channel).await?;
        tokio::time::sleep(self.step_delay).await;

        self.gateway.select_calibration_channel(channel).await?;
        tokio::time::sleep(self.step_delay).await;

        Ok(())
    }

    /// Calibrate channels one after another, stopping at the first failure
    pub async fn calibrate_all(&self, channels: &[u8]) -> Result<()> {
        for &channel in channels {
            self.calibrate(channel).await?;
        }
        Ok(())
    }

    /// Store the calibration on the board
    pub async fn save(&self) -> Result<()> {
        self.gateway.save_calibration().await
    }
}
