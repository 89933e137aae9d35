//! Windowed replay of a finite recording.
//!
//! [`StreamSimulator`] turns a continuous `channels × samples` recording into
//! an ordered, finite, restartable sequence of fixed-size [`StreamChunk`]s,
//! emulating live acquisition for the streaming inference path. The source
//! recording is read-only; every chunk is an owned copy handed to the
//! consumer, with no look-ahead buffering.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use vortex_core::{Error, Result};

/// Windowing parameters, in samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Window length. Every emitted chunk spans exactly this many samples.
    pub window_len: usize,
    /// Hop between consecutive window starts. `step == window_len` gives
    /// disjoint windows, `step < window_len` overlapping ones.
    pub step: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            window_len: 160,
            step: 40,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_len == 0 || self.step == 0 {
            return Err(Error::Config(format!(
                "window_len and step must be positive, got {} and {}",
                self.window_len, self.step
            )));
        }
        if self.step > self.window_len {
            return Err(Error::Config(format!(
                "step ({}) must not exceed window_len ({})",
                self.step, self.window_len
            )));
        }
        Ok(())
    }
}

/// One window of the replayed recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Sample offset of the first column within the source recording.
    pub start_sample: usize,
    /// `channels × window_len` window data, owned by the consumer.
    pub data: Array2<f64>,
}

impl StreamChunk {
    /// Window onset in seconds for a given sampling rate.
    pub fn onset_secs(&self, sample_rate_hz: f64) -> f64 {
        self.start_sample as f64 / sample_rate_hz
    }
}

/// Deterministic replay of a recording as a chunk sequence.
pub struct StreamSimulator {
    recording: Array2<f64>,
    config: StreamConfig,
}

impl StreamSimulator {
    pub fn new(recording: Array2<f64>, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { recording, config })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Number of chunks one full replay yields:
    /// `floor((samples − window_len) / step) + 1`, or 0 when the recording
    /// is shorter than one window.
    pub fn n_chunks(&self) -> usize {
        let total = self.recording.ncols();
        if total < self.config.window_len {
            0
        } else {
            (total - self.config.window_len) / self.config.step + 1
        }
    }

    /// Lazy iterator over chunks in strictly increasing start order.
    ///
    /// Calling this again restarts the replay from the first chunk; the
    /// source is never mutated, so every replay yields the same sequence.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            simulator: self,
            next: 0,
        }
    }
}

/// Iterator state for one replay pass.
pub struct Chunks<'a> {
    simulator: &'a StreamSimulator,
    next: usize,
}

impl Iterator for Chunks<'_> {
    type Item = StreamChunk;

    fn next(&mut self) -> Option<StreamChunk> {
        if self.next >= self.simulator.n_chunks() {
            return None;
        }
        let config = &self.simulator.config;
        let start = self.next * config.step;
        let data = self
            .simulator
            .recording
            .slice(s![.., start..start + config.window_len])
            .to_owned();
        self.next += 1;
        Some(StreamChunk {
            start_sample: start,
            data,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.simulator.n_chunks() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
