//! # Session Controller
//!
//! Decides whether incoming samples are persisted into session history and
//! owns the time reference every timestamp is expressed against.
//!
//! States: `Idle` and `Recording`. Starting a session moves the time
//! reference to "now"; stopping leaves the recorded data in place until the
//! next start.

use serde::Serialize;
use std::time::Instant;

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Recording,
}

/// Process-wide recording session
#[derive(Debug, Clone)]
pub struct SessionController {
    state: SessionState,
    started_at: Instant,
}

impl SessionController {
    /// Creates an idle session whose time reference is `reference`.
    pub fn new(reference: Instant) -> Self {
        Self {
            state: SessionState::Idle,
            started_at: reference,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Seconds elapsed since the current time reference
    pub fn elapsed(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.started_at).as_secs_f64()
    }

    /// Transition `Idle -> Recording`.
    ///
    /// # Returns
    ///
    /// * `Option<f64>` - How far the time reference moved forward (seconds),
    ///   or `None` when a session is already running
    pub fn start(&mut self, at: Instant) -> Option<f64> {
        if self.is_recording() {
            return None;
        }

        let shift = self.elapsed(at);
        self.started_at = at;
        self.state = SessionState::Recording;
        Some(shift)
    }

    /// Transition `Recording -> Idle`.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if a session was running
    pub fn stop(&mut self) -> bool {
        let was_recording = self.is_recording();
        self.state = SessionState::Idle;
        was_recording
    }
}
