//! # Serial Communication Module
//!
//! Line-oriented transport to the acquisition board over a USB serial port.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Reading newline-terminated lines with a bounded wait
//! - Writing command lines
//! - Closing and reopening the port across connect cycles

pub mod port_trait;

pub use port_trait::LineTransport;

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::config::SerialConfig;

/// Serial port transport
///
/// Partially received lines survive a read that times out: bytes are kept in
/// an internal buffer until the terminator arrives.
pub struct SerialTransport {
    /// Device path (e.g., /dev/ttyUSB0 or COM3)
    device_path: String,
    baud_rate: u32,
    timeout: Duration,
    /// Open port, buffered for line reads
    port: Option<BufReader<tokio_serial::SerialStream>>,
    /// Bytes of the line currently being received
    partial: Vec<u8>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Create a closed transport for the configured port
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use transducer_monitor::config::SerialConfig;
    /// use transducer_monitor::serial::{LineTransport, SerialTransport};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut serial = SerialTransport::new(&SerialConfig::default());
    ///     serial.open().await?;
    ///     serial.write_all(b"LON1\n").await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            device_path: config.port.clone(),
            baud_rate: config.baud_rate,
            timeout: config.timeout(),
            port: None,
            partial: Vec::new(),
        }
    }

    /// Get the device path of the serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn port_mut(&mut self) -> io::Result<&mut BufReader<tokio_serial::SerialStream>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is not open"))
    }
}

#[async_trait]
impl LineTransport for SerialTransport {
    async fn open(&mut self) -> io::Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        debug!("Opening serial port {} at {} baud", self.device_path, self.baud_rate);

        let stream = tokio_serial::new(&self.device_path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.timeout)
            .open_native_async()
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("Failed to open {}: {}", self.device_path, e),
                )
            })?;

        info!("Opened serial port {}", self.device_path);
        self.partial.clear();
        self.port = Some(BufReader::new(stream));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            info!("Closed serial port {}", self.device_path);
        }
        self.partial.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port_mut()?.get_mut().write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port_mut()?.get_mut().flush().await
    }

    async fn read_line(&mut self, wait: Duration) -> io::Result<Option<String>> {
        let port = match self.port.as_mut() {
            Some(port) => port,
            None => {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "serial port is not open"))
            }
        };

        // read_until keeps already received bytes in `partial` if the wait elapses
        let result = tokio::time::timeout(wait, port.read_until(b'\n', &mut self.partial)).await;
        match result {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "serial port closed")),
            Ok(Ok(_)) => {
                let line = String::from_utf8_lossy(&self.partial)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                self.partial.clear();
                Ok(Some(line))
            }
            Ok(Err(e)) => Err(e),
        }
    }

    fn name(&self) -> &str {
        &self.device_path
    }
}
