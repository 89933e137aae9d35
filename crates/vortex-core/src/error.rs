//! Error types for the Vortex motor-imagery decoder.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("covariance needs at least as many samples as channels: {channels} channels, {samples} samples")]
    InsufficientSamples { channels: usize, samples: usize },

    #[error("channel {channel} has zero variance over the window")]
    FlatChannel { channel: usize },

    #[error("CSP requires exactly 2 classes, got {got}")]
    UnsupportedClassCount { got: usize },

    #[error("composite covariance is ill-conditioned: pivot {min_pivot:.3e} below tolerance {tolerance:.3e}")]
    IllConditionedCovariance { min_pivot: f64, tolerance: f64 },

    #[error("channel count mismatch: filter bank fitted on {expected_channels} channels, input has {actual_channels}")]
    ShapeMismatch {
        expected_channels: usize,
        actual_channels: usize,
    },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
