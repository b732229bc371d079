//! # Acquisition Engine
//!
//! Owns the transport, the channel state and the recording session, and
//! exposes them through a narrow method-call contract. Presentation code
//! polls [`Engine::live_snapshot`], which leaves session histories out so
//! its cost does not grow with the recording; export takes the full copy
//! from [`Engine::snapshot`].
//!
//! Link states: `Disconnected -> Connecting -> Reading -> Disconnected`.
//!
//! This module handles:
//! - Connecting (open, settle, start the read task, light indicators)
//! - Disconnecting (stop the read task, indicators off, close, stop recording)
//! - Tare, range, enable and reset operations on channels
//! - Recording session start/stop
//! - Status line fan-out to subscribers

mod acquisition;
pub mod gateway;
pub mod state;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::calibration::CalibrationRoutine;
use crate::channel::{ChannelSnapshot, LiveSnapshot};
use crate::config::Config;
use crate::error::{MonitorError, Result};
use crate::protocol::encoder::Command;
use crate::protocol::message::Line;
use crate::serial::LineTransport;
use crate::session::SessionState;

pub use gateway::{AckKind, CommandGateway, PendingAck, SharedTransport};
pub use state::EngineState;

/// Time given to the board to act on the final commands before the port closes
const DISCONNECT_FLUSH_DELAY: Duration = Duration::from_millis(100);

/// Buffered status lines per subscriber before the oldest are dropped
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Connection state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Reading,
}

/// Consistent copy of everything a presentation layer displays
#[derive(Debug, Clone, Serialize)]
pub struct LiveView {
    pub link: LinkState,
    pub session: SessionState,
    pub channels: Vec<LiveSnapshot>,
}

impl LiveView {
    pub fn channel(&self, index: u8) -> Option<&LiveSnapshot> {
        self.channels.iter().find(|c| c.index == index)
    }

    pub fn enabled_channels(&self) -> impl Iterator<Item = &LiveSnapshot> {
        self.channels.iter().filter(|c| c.enabled)
    }

    /// Session samples held by enabled channels
    pub fn recorded_samples(&self) -> usize {
        self.enabled_channels().map(|c| c.recorded).sum()
    }
}

/// Full copy of the engine including session histories, for export
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub link: LinkState,
    pub session: SessionState,
    pub channels: Vec<ChannelSnapshot>,
}

impl EngineSnapshot {
    pub fn channel(&self, index: u8) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.index == index)
    }

    pub fn enabled_channels(&self) -> impl Iterator<Item = &ChannelSnapshot> {
        self.channels.iter().filter(|c| c.enabled)
    }

    /// Whether any enabled channel holds recorded samples
    pub fn has_recording(&self) -> bool {
        self.enabled_channels().any(|c| !c.history.is_empty())
    }
}

/// State shared with the acquisition task
pub(crate) struct Shared {
    state: Mutex<EngineState>,
    reading: AtomicBool,
    status_tx: broadcast::Sender<String>,
    gateway: CommandGateway,
}

impl Shared {
    /// Lock the channel/session state
    ///
    /// Every mutation completes before anything that could panic, so a
    /// poisoned lock still guards consistent data.
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_status(&self, line: &str) {
        // No subscribers is fine
        let _ = self.status_tx.send(line.to_string());
    }
}

struct EngineInner {
    config: Config,
    shared: Arc<Shared>,
    transport: SharedTransport,
    link: Mutex<LinkState>,
    /// Read task handle; the lock also serialises connect/disconnect
    reader: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Telemetry acquisition and session recording engine
///
/// Cheap to clone; clones share the same engine.
///
/// # Examples
///
/// ```no_run
/// use transducer_monitor::config::Config;
/// use transducer_monitor::engine::Engine;
/// use transducer_monitor::serial::SerialTransport;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load("config/default.toml")?;
///     let engine = Engine::new(config.clone(), Box::new(SerialTransport::new(&config.serial)))?;
///
///     engine.connect().await?;
///     engine.start_recording();
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     engine.stop_recording();
///     engine.disconnect().await?;
///
///     let snapshot = engine.snapshot();
///     println!("{} samples", snapshot.channels[0].history.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("link", &self.link_state())
            .field("session", &self.session_state())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create a disconnected engine
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `transport` - Closed transport the engine will open on `connect`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration does not validate
    pub fn new(config: Config, transport: Box<dyn LineTransport>) -> Result<Self> {
        config.validate()?;

        let transport: SharedTransport = Arc::new(tokio::sync::Mutex::new(transport));
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::new(&config.channels, Instant::now())),
            reading: AtomicBool::new(false),
            status_tx,
            gateway: CommandGateway::new(transport.clone(), config.channels.count),
        });

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                shared,
                transport,
                link: Mutex::new(LinkState::Disconnected),
                reader: tokio::sync::Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn gateway(&self) -> &CommandGateway {
        &self.inner.shared.gateway
    }

    /// Calibration routine using the configured step delay
    pub fn calibration(&self) -> CalibrationRoutine<'_> {
        CalibrationRoutine::new(self.gateway(), self.inner.config.calibration.step_delay())
    }

    /// Receive every status line the board sends
    pub fn subscribe_status(&self) -> broadcast::Receiver<String> {
        self.inner.shared.status_tx.subscribe()
    }

    pub fn link_state(&self) -> LinkState {
        *self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_link(&self, link: LinkState) {
        *self.inner.link.lock().unwrap_or_else(PoisonError::into_inner) = link;
    }

    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Reading
    }

    /// Open the transport and start acquiring
    ///
    /// Waits the configured settle delay after opening (the board resets
    /// when the port opens), starts the read task and switches on the
    /// indicators of enabled channels. Connecting while already connected
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the transport cannot be opened; the engine
    /// stays `Disconnected`
    pub async fn connect(&self) -> Result<()> {
        let mut reader = self.inner.reader.lock().await;
        if self.link_state() != LinkState::Disconnected {
            debug!("Already connected");
            return Ok(());
        }

        self.set_link(LinkState::Connecting);

        let opened = {
            let mut port = self.inner.transport.lock().await;
            port.open().await.map(|_| port.name().to_string())
        };

        let name = match opened {
            Ok(name) => name,
            Err(e) => {
                error!("Could not connect: {}", e);
                self.set_link(LinkState::Disconnected);
                return Err(MonitorError::Connection(e.to_string()));
            }
        };

        let settle = self.inner.config.serial.settle_delay();
        if !settle.is_zero() {
            debug!("Waiting {:?} for the device to settle", settle);
            tokio::time::sleep(settle).await;
        }

        self.inner.shared.reading.store(true, Ordering::Release);
        self.set_link(LinkState::Reading);
        *reader = Some(tokio::spawn(acquisition::run(
            self.inner.shared.clone(),
            self.inner.transport.clone(),
            self.inner.config.serial.poll_interval(),
        )));
        drop(reader);

        if self.inner.config.device.indicators {
            for index in self.enabled_indices() {
                if let Err(e) = self.gateway().send(Command::IndicatorOn(index)).await {
                    warn!("Could not switch on indicator {}: {}", index, e);
                }
            }
        }

        info!("Connected to {}", name);
        Ok(())
    }

    /// Stop acquiring and close the transport
    ///
    /// The read task is stopped first, then indicator-off (and optionally
    /// disable) commands are sent, then the port is closed. A running
    /// recording session is stopped. Disconnecting while disconnected is a
    /// no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let mut reader = self.inner.reader.lock().await;
        if self.link_state() == LinkState::Disconnected {
            debug!("Already disconnected");
            return Ok(());
        }

        self.inner.shared.reading.store(false, Ordering::Release);
        if let Some(handle) = reader.take() {
            if let Err(e) = handle.await {
                warn!("Acquisition task ended abnormally: {}", e);
            }
        }

        let device = &self.inner.config.device;
        let mut farewell = Vec::new();
        for index in 1..=self.inner.config.channels.count {
            if device.disable_on_disconnect {
                farewell.push(Command::Disable(index));
            }
            if device.indicators {
                farewell.push(Command::IndicatorOff(index));
            }
        }

        if !farewell.is_empty() {
            for command in farewell {
                if let Err(e) = self.gateway().send(command).await {
                    warn!("Could not send {} before disconnecting: {}", command, e);
                }
            }
            tokio::time::sleep(DISCONNECT_FLUSH_DELAY).await;
        }

        self.gateway().clear_pending();
        let closed = self.inner.transport.lock().await.close().await;

        self.inner.shared.state().stop_recording();
        self.set_link(LinkState::Disconnected);
        info!("Disconnected");

        closed.map_err(MonitorError::from)
    }

    /// Indices of the enabled channels, in order
    pub fn enabled_indices(&self) -> Vec<u8> {
        self.inner.shared.state().enabled_indices()
    }

    /// Session samples held by enabled channels
    pub fn recorded_samples(&self) -> usize {
        self.inner.shared.state().recorded_samples()
    }

    /// Whether any enabled channel holds recorded samples
    pub fn has_recording(&self) -> bool {
        self.recorded_samples() > 0
    }

    /// Feed one line as if it had been read from the transport
    pub fn process_line(&self, line: &str) -> Option<Line> {
        acquisition::route_line(&self.inner.shared, line, Instant::now())
    }

    /// Start a recording session
    ///
    /// # Returns
    ///
    /// * `bool` - `false` if a session was already running
    pub fn start_recording(&self) -> bool {
        self.inner.shared.state().start_recording(Instant::now())
    }

    /// Stop the recording session; recorded data stays available
    pub fn stop_recording(&self) -> bool {
        self.inner.shared.state().stop_recording()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.shared.state().session_state()
    }

    pub fn is_recording(&self) -> bool {
        self.inner.shared.state().is_recording()
    }

    /// Toggle the tare latch of a channel
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - Latch state after the call
    pub fn tare(&self, index: u8) -> Result<bool> {
        self.inner.shared.state().tare(index)
    }

    /// Clear a channel's buffers, offset, tare latch and extrema
    pub fn reset(&self, index: u8) -> Result<()> {
        self.inner.shared.state().reset(index)
    }

    /// Set a channel's full-scale range locally, without telling the board
    pub fn set_range(&self, index: u8, range: f64) -> Result<()> {
        self.inner.shared.state().set_range(index, range)
    }

    /// Enable or disable a channel
    ///
    /// While connected the board is told as well (`E`/`LON` or `D`/`LOFF`);
    /// a failed send is logged and the local change still applies.
    pub async fn set_enabled(&self, index: u8, enabled: bool) -> Result<()> {
        self.inner.shared.state().set_enabled(index, enabled)?;

        if !self.is_connected() {
            return Ok(());
        }

        let commands = if enabled {
            [Command::Enable(index), Command::IndicatorOn(index)]
        } else {
            [Command::Disable(index), Command::IndicatorOff(index)]
        };

        for command in commands {
            if let Err(e) = self.gateway().send(command).await {
                warn!("Could not send {}: {}", command, e);
            }
        }
        Ok(())
    }

    /// Send free text to the board
    pub async fn send_command(&self, text: &str) -> Result<()> {
        self.gateway().send_command(text).await
    }

    /// Ask the board to change a channel's range
    ///
    /// The local range follows once the board acknowledges it.
    pub async fn set_channel_range(&self, index: u8, range: f64) -> Result<()> {
        self.gateway().set_channel_range(index, range).await
    }

    /// Display copy of all channels and the engine/session state
    ///
    /// Session histories are left out; see [`Engine::snapshot`].
    pub fn live_snapshot(&self) -> LiveView {
        let state = self.inner.shared.state();
        LiveView {
            link: self.link_state(),
            session: state.session_state(),
            channels: state.live_snapshots(),
        }
    }

    /// Full copy including every session history
    ///
    /// Costs grow with the recording; take it for export, not for polling.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.inner.shared.state();
        EngineSnapshot {
            link: self.link_state(),
            session: state.session_state(),
            channels: state.snapshots(),
        }
    }

    /// Display copy of one channel
    pub fn channel(&self, index: u8) -> Option<LiveSnapshot> {
        self.inner.shared.state().channel(index).map(|c| c.live_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ConversionPolicy;
    use crate::serial::port_trait::mocks::MockTransport;
    use std::io;
    use tokio_test::assert_ok;

    fn test_config(conversion: ConversionPolicy) -> Config {
        let mut config = Config::with_conversion(conversion);
        config.serial.settle_delay_ms = 0;
        config.serial.poll_interval_ms = 1;
        config
    }

    fn engine_with(config: Config) -> (Engine, MockTransport) {
        let mock = MockTransport::new();
        let engine = Engine::new(config, Box::new(mock.clone())).unwrap();
        (engine, mock)
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("Condition not reached in time");
    }

    #[test]
    fn test_new_engine_is_disconnected_and_idle() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        assert_eq!(engine.link_state(), LinkState::Disconnected);
        assert_eq!(engine.session_state(), SessionState::Idle);
        assert_eq!(engine.snapshot().channels.len(), 5);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = test_config(ConversionPolicy::Identity);
        config.channels.live_capacity = 0;
        assert!(Engine::new(config, Box::new(MockTransport::new())).is_err());
    }

    #[test]
    fn test_scenario_identity_conversion() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.process_line("Pot1:12.50,Pot2:3.00");
        assert_eq!(engine.channel(1).unwrap().latest, Some(12.5));
        assert_eq!(engine.channel(2).unwrap().latest, Some(3.0));
    }

    #[test]
    fn test_scenario_inverted_conversion() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Inverted));
        engine.process_line("Pot1:12.50,Pot2:3.00");
        // convert(raw, 25.0) - offset
        assert_eq!(engine.channel(1).unwrap().latest, Some(12.5));
        assert_eq!(engine.channel(2).unwrap().latest, Some(22.0));
    }

    #[test]
    fn test_scenario_range_ack_updates_one_channel() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Inverted));
        let parsed = engine.process_line("✓ Range T3 updated to 40.0mm");
        assert!(matches!(parsed, Some(Line::RangeAck(_))));

        let snapshot = engine.snapshot();
        for ch in &snapshot.channels {
            let expected = if ch.index == 3 { 40.0 } else { 25.0 };
            assert_eq!(ch.range, expected, "channel {}", ch.index);
        }
    }

    #[test]
    fn test_range_ack_for_unknown_channel_is_ignored() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Inverted));
        engine.process_line("✓ Range T8 updated to 40.0mm");
        assert!(engine.snapshot().channels.iter().all(|c| c.range == 25.0));
    }

    #[tokio::test]
    async fn test_scenario_disable_mid_session_keeps_history() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        assert!(engine.start_recording());
        engine.process_line("Pot1:1.0,Pot2:2.0");
        engine.process_line("Pot1:1.5,Pot2:2.5");

        engine.set_enabled(2, false).await.unwrap();
        engine.process_line("Pot1:1.7,Pot2:2.7");

        let ch2 = engine.channel(2).unwrap();
        assert!(!ch2.enabled);
        assert_eq!(ch2.recorded, 2);
        assert_eq!(ch2.live.len(), 2);
        assert_eq!(engine.channel(1).unwrap().recorded, 3);
        assert_eq!(engine.snapshot().channel(2).unwrap().history.len(), 2);
    }

    #[test]
    fn test_scenario_five_samples_export_five_rows() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.process_line("Pot1:9.9");
        engine.start_recording();
        for i in 0..5 {
            engine.process_line(&format!("Pot1:{}.0,Pot2:{}.5", i, i));
        }
        engine.stop_recording();
        engine.process_line("Pot1:9.9");

        let mut out = Vec::new();
        let rows = crate::export::csv::write_csv(&engine.snapshot().channels, 4, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(rows, 5);
        assert_eq!(text.lines().count(), 6);
        assert!(text.starts_with("Time(s),Sensor 1,Sensor 2,"));
    }

    #[test]
    fn test_session_isolation() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.process_line("Pot1:1.0");
        engine.process_line("Pot1:2.0");
        assert_eq!(engine.channel(1).unwrap().recorded, 0);

        engine.start_recording();
        engine.process_line("Pot1:3.0");
        engine.stop_recording();
        engine.start_recording();
        engine.process_line("Pot1:4.0");

        let snapshot = engine.snapshot();
        let ch = snapshot.channel(1).unwrap();
        let values: Vec<f64> = ch.history.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![4.0]);
        assert_eq!(ch.session_min, Some(4.0));
        assert_eq!(ch.live.len(), 4);
    }

    #[test]
    fn test_start_recording_twice_is_noop() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        assert!(engine.start_recording());
        engine.process_line("Pot1:1.0");
        assert!(!engine.start_recording());
        assert_eq!(engine.channel(1).unwrap().recorded, 1);
    }

    #[test]
    fn test_tare_round_trip_through_engine() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Inverted));
        engine.process_line("Pot1:5.0");
        assert!(engine.tare(1).unwrap());
        engine.process_line("Pot1:5.0");
        assert_eq!(engine.channel(1).unwrap().latest, Some(0.0));

        assert!(!engine.tare(1).unwrap());
        engine.process_line("Pot1:5.0");
        assert_eq!(engine.channel(1).unwrap().latest, Some(20.0));
        assert_eq!(engine.channel(1).unwrap().offset, 0.0);
    }

    #[test]
    fn test_tare_on_empty_channel() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        assert!(!engine.tare(2).unwrap());
        assert_eq!(engine.channel(2).unwrap().offset, 0.0);
        assert!(engine.tare(9).is_err());
    }

    #[test]
    fn test_malformed_field_does_not_block_others() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.process_line("Pot1:1.0|Pot2:oops|Pot3:3.0");
        assert_eq!(engine.channel(1).unwrap().latest, Some(1.0));
        assert_eq!(engine.channel(2).unwrap().latest, None);
        assert_eq!(engine.channel(3).unwrap().latest, Some(3.0));
    }

    #[test]
    fn test_live_buffer_capacity_from_config() {
        let mut config = test_config(ConversionPolicy::Identity);
        config.channels.live_capacity = 3;
        let (engine, _) = engine_with(config);
        for i in 0..10 {
            engine.process_line(&format!("Pot1:{}", i));
        }
        let values: Vec<f64> = engine.channel(1).unwrap().live.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn test_status_lines_reach_subscribers() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        let mut status = engine.subscribe_status();
        engine.process_line("Sistema iniciado");
        engine.process_line("Pot1:1.0");
        engine.process_line("T1: Min=1 Max=2 Rango=30.00mm");

        assert_eq!(status.recv().await.unwrap(), "Sistema iniciado");
        assert_eq!(status.recv().await.unwrap(), "T1: Min=1 Max=2 Rango=30.00mm");
        assert!(status.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_lifecycle() {
        let mut config = test_config(ConversionPolicy::Identity);
        config.channels.enabled = vec![1, 3];
        let (engine, mock) = engine_with(config);

        assert_ok!(engine.connect().await);
        assert_eq!(engine.link_state(), LinkState::Reading);
        assert!(mock.is_open_now());
        assert_eq!(mock.written_lines(), vec!["LON1", "LON3"]);

        mock.clear_written();
        assert_ok!(engine.disconnect().await);
        assert_eq!(engine.link_state(), LinkState::Disconnected);
        assert!(!mock.is_open_now());
        assert_eq!(mock.written_lines(), vec!["LOFF1", "LOFF2", "LOFF3", "LOFF4", "LOFF5"]);
    }

    #[tokio::test]
    async fn test_disconnect_with_disable_commands() {
        let mut config = test_config(ConversionPolicy::Identity);
        config.channels.count = 2;
        config.channels.enabled = vec![1];
        config.device.disable_on_disconnect = true;
        let (engine, mock) = engine_with(config);

        engine.connect().await.unwrap();
        mock.clear_written();
        engine.disconnect().await.unwrap();
        assert_eq!(mock.written_lines(), vec!["D1", "LOFF1", "D2", "LOFF2"]);
    }

    #[tokio::test]
    async fn test_connect_twice_is_noop() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        engine.connect().await.unwrap();
        let written = mock.get_written_data().len();
        engine.connect().await.unwrap();
        assert_eq!(mock.get_written_data().len(), written);
        engine.disconnect().await.unwrap();
        assert_ok!(engine.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        mock.set_open_error(io::ErrorKind::NotFound);

        let result = engine.connect().await;
        assert!(matches!(result, Err(MonitorError::Connection(_))));
        assert_eq!(engine.link_state(), LinkState::Disconnected);
        assert!(mock.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_read_loop_routes_lines() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        let mut status = engine.subscribe_status();
        engine.connect().await.unwrap();

        mock.push_line("Pot1:1.25,Pot2:2.5");
        mock.push_line("");
        mock.push_line("hello from the board");
        mock.push_line("✓ Range T2 updated to 30.0mm");

        wait_until(|| mock.pending_lines() == 0).await;
        wait_until(|| engine.channel(2).map(|c| c.range) == Some(30.0)).await;

        assert_eq!(engine.channel(1).unwrap().latest, Some(1.25));
        assert_eq!(status.recv().await.unwrap(), "hello from the board");

        engine.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_errors_do_not_stop_loop() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        engine.connect().await.unwrap();

        mock.fail_next_reads(3);
        mock.push_line("Pot1:4.0");
        wait_until(|| engine.channel(1).and_then(|c| c.latest) == Some(4.0)).await;

        assert_eq!(engine.link_state(), LinkState::Reading);
        engine.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_stops_recording() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        engine.connect().await.unwrap();
        engine.start_recording();

        mock.push_line("Pot1:1.0");
        wait_until(|| engine.channel(1).map(|c| c.recorded) == Some(1)).await;

        engine.disconnect().await.unwrap();
        assert_eq!(engine.session_state(), SessionState::Idle);
        assert_eq!(engine.channel(1).unwrap().recorded, 1, "history kept for export");
    }

    #[tokio::test]
    async fn test_send_command_while_disconnected() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        assert!(matches!(engine.send_command("C").await, Err(MonitorError::NotConnected)));
        assert!(mock.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_set_channel_range_round_trip() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Inverted));
        engine.connect().await.unwrap();
        mock.clear_written();

        engine.set_channel_range(2, 40.0).await.unwrap();
        assert_eq!(mock.written_lines(), vec!["R2,40"]);
        assert_eq!(engine.gateway().pending_acks().len(), 1);
        assert_eq!(engine.channel(2).unwrap().range, 25.0, "waits for the board");

        mock.push_line("✓ Rango T2 actualizado a 40.00mm");
        wait_until(|| engine.gateway().pending_acks().is_empty()).await;
        assert_eq!(engine.channel(2).unwrap().range, 40.0);

        engine.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_enabled_sends_commands_when_connected() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));

        engine.set_enabled(4, false).await.unwrap();
        assert!(mock.get_written_data().is_empty(), "nothing sent while disconnected");

        engine.connect().await.unwrap();
        mock.clear_written();
        engine.set_enabled(4, true).await.unwrap();
        engine.set_enabled(5, false).await.unwrap();
        assert_eq!(mock.written_lines(), vec!["E4", "LON4", "D5", "LOFF5"]);

        assert!(engine.set_enabled(6, true).await.is_err());
        engine.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_enabled_send_failure_still_applies() {
        let (engine, mock) = engine_with(test_config(ConversionPolicy::Identity));
        engine.connect().await.unwrap();
        mock.set_write_error(io::ErrorKind::BrokenPipe);

        assert_ok!(engine.set_enabled(1, false).await);
        assert!(!engine.channel(1).unwrap().enabled);
        engine.disconnect().await.unwrap();
    }

    #[test]
    fn test_reset_and_local_range() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Inverted));
        engine.set_range(1, 30.0).unwrap();
        engine.process_line("Pot1:10.0");
        assert_eq!(engine.channel(1).unwrap().latest, Some(20.0));

        engine.tare(1).unwrap();
        engine.reset(1).unwrap();
        let ch = engine.channel(1).unwrap();
        assert!(ch.live.is_empty());
        assert_eq!(ch.offset, 0.0);
        assert!(!ch.is_tared);
        assert_eq!(ch.range, 30.0, "reset keeps the range");
    }

    #[test]
    fn test_snapshot_helpers() {
        let mut config = test_config(ConversionPolicy::Identity);
        config.channels.enabled = vec![2, 4];
        let (engine, _) = engine_with(config);

        let snapshot = engine.snapshot();
        let enabled: Vec<u8> = snapshot.enabled_channels().map(|c| c.index).collect();
        assert_eq!(enabled, vec![2, 4]);
        assert!(!snapshot.has_recording());
        assert_eq!(snapshot.channel(4).unwrap().label, "Sensor 4");
    }

    #[test]
    fn test_live_view_leaves_history_out() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.start_recording();
        for i in 0..50 {
            engine.process_line(&format!("Pot1:{}.0,Pot3:1.0", i));
        }

        let view = engine.live_snapshot();
        assert_eq!(view.session, SessionState::Recording);
        assert_eq!(view.channel(1).unwrap().recorded, 50);
        assert_eq!(view.channel(1).unwrap().latest, Some(49.0));
        assert_eq!(view.recorded_samples(), 100);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["channels"][0].get("history").is_none());
        assert_eq!(json["channels"][0]["recorded"], 50);

        assert_eq!(engine.snapshot().channel(1).unwrap().history.len(), 50);
    }

    #[tokio::test]
    async fn test_cheap_accessors() {
        let (engine, _) = engine_with(test_config(ConversionPolicy::Identity));
        engine.set_enabled(2, false).await.unwrap();
        assert_eq!(engine.enabled_indices(), vec![1, 3, 4, 5]);
        assert!(!engine.has_recording());

        engine.start_recording();
        engine.process_line("Pot1:1.0,Pot2:2.0,Pot4:4.0");
        assert_eq!(engine.recorded_samples(), 2, "disabled channel 2 records nothing");
        assert!(engine.has_recording());
    }
}
