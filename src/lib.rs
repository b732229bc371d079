//! # Transducer Monitor Library
//!
//! Acquire, calibrate and record multi-channel readings from a line-oriented
//! serial acquisition board.
//!
//! The [`engine::Engine`] owns the transport and a background read task that
//! parses every line: measurements land in per-channel live buffers (and in
//! the session history while recording), range announcements update the
//! channel ranges, everything else is forwarded as status text. Export and
//! presentation code work on snapshots.

pub mod calibration;
pub mod channel;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod export;
pub mod protocol;
pub mod serial;
pub mod session;
