//! Trait abstraction for line-oriented transport operations to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;

/// Trait for line-oriented transport I/O
#[async_trait]
pub trait LineTransport: Send {
    /// Open the underlying connection
    async fn open(&mut self) -> io::Result<()>;

    /// Close the connection; closing a closed transport is a no-op
    async fn close(&mut self) -> io::Result<()>;

    /// Whether the connection is open
    fn is_open(&self) -> bool;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Wait at most `wait` for one complete line
    ///
    /// Returns `Ok(None)` when no complete line arrived in time. The line is
    /// returned without its terminator.
    async fn read_line(&mut self, wait: Duration) -> io::Result<Option<String>>;

    /// Human-readable name of the endpoint (e.g. the device path)
    fn name(&self) -> &str;
}
