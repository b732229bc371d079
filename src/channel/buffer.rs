//! # Sample Buffers
//!
//! Storage behind a channel: a fixed-capacity live buffer for display and an
//! unbounded session history for export.

use serde::Serialize;
use std::collections::VecDeque;

/// One timestamped value. `t` is seconds since the session start reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub t: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(t: f64, value: f64) -> Self {
        Self { t, value }
    }
}

/// Bounded FIFO of the most recent samples
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl LiveBuffer {
    /// Creates an empty buffer holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Shifts every timestamp back by `shift` seconds.
    ///
    /// Used when the time reference moves forward so the buffer stays
    /// expressed against the current reference and remains monotonic.
    pub fn rebase(&mut self, shift: f64) {
        for sample in &mut self.samples {
            sample.t -= shift;
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}

/// Unbounded record of one session with running extrema
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    samples: Vec<Sample>,
    min: Option<f64>,
    max: Option<f64>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample and updates the extrema incrementally.
    pub fn push(&mut self, sample: Sample) {
        self.min = Some(self.min.map_or(sample.value, |m| m.min(sample.value)));
        self.max = Some(self.max.map_or(sample.value, |m| m.max(sample.value)));
        self.samples.push(sample);
    }

    /// Drops all samples and unsets the extrema.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.min = None;
        self.max = None;
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}
