//! # Line Protocol Module
//!
//! Text protocol spoken with the transducer acquisition board.
//!
//! This module handles:
//! - Classifying inbound lines (measurements, range acknowledgements, status)
//! - Field-by-field decoding of measurement lines
//! - Serialising outbound commands

pub mod message;
pub mod decoder;
pub mod encoder;
