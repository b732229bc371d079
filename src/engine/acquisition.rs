//! # Acquisition Loop
//!
//! Background task that reads lines from the transport and routes them:
//! measurements to the channels, range acknowledgements to the gateway and
//! the channel ranges, everything else to status subscribers.
//!
//! Each line is fully routed before the next one is read. Errors on a single
//! iteration are logged and the loop carries on; only clearing the reading
//! flag stops it, which is observed within one poll interval.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::gateway::SharedTransport;
use super::Shared;
use crate::protocol::decoder::parse_line;
use crate::protocol::message::Line;

/// Run the read loop until the reading flag is cleared
///
/// # Arguments
///
/// * `shared` - Engine state, gateway and status channel
/// * `transport` - Transport to read from
/// * `poll_interval` - Longest wait for a line, and the back-off after a read error
pub(crate) async fn run(shared: Arc<Shared>, transport: SharedTransport, poll_interval: Duration) {
    info!("Acquisition loop started");

    let mut lines: u64 = 0;
    let mut consecutive_errors: u64 = 0;

    while shared.reading.load(Ordering::Acquire) {
        let result = {
            let mut port = transport.lock().await;
            port.read_line(poll_interval).await
        };

        match result {
            Ok(Some(line)) => {
                if consecutive_errors > 0 {
                    info!("Serial reads recovered after {} errors", consecutive_errors);
                    consecutive_errors = 0;
                }
                route_line(&shared, &line, Instant::now());
                lines += 1;
            }
            Ok(None) => {}
            Err(e) => {
                if consecutive_errors == 0 {
                    warn!("Error reading serial: {}", e);
                } else {
                    debug!("Error reading serial: {}", e);
                }
                consecutive_errors += 1;
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    info!("Acquisition loop stopped after {} lines", lines);
}

/// Classify one line and apply it
///
/// # Returns
///
/// * `Option<Line>` - The classification, `None` for blank lines
pub(crate) fn route_line(shared: &Shared, line: &str, at: Instant) -> Option<Line> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parsed = parse_line(line);
    match &parsed {
        Line::Measurement(batch) => {
            let stored = shared.state().ingest(batch, at);
            debug!("Stored {}/{} readings from '{}'", stored, batch.len(), line);
        }
        Line::RangeAck(ack) => {
            if shared.gateway.acknowledge(ack).is_none() {
                debug!("Range announcement for channel {} without a pending request", ack.channel);
            }

            match shared.state().set_range(ack.channel, ack.range) {
                Ok(()) => info!("Channel {} range is now {} mm", ack.channel, ack.range),
                Err(e) => warn!("Ignoring range announcement '{}': {}", line, e),
            }

            // The board's own wording is still useful on the terminal
            shared.publish_status(line);
        }
        Line::Status(text) => shared.publish_status(text),
    }

    Some(parsed)
}
