//! # Vortex-CSP
//!
//! Common Spatial Patterns (CSP) core for motor-imagery decoding.
//!
//! CSP learns spatial filters that maximize the variance ratio between two
//! classes of multichannel trials. The log-variance of the filtered signal
//! is a compact per-trial feature that a downstream linear classifier
//! separates well.
//!
//! ## Stages
//!
//! 1. **Covariance**: per-trial spatial covariance, averaged per class
//! 2. **Filter bank**: generalized symmetric eigensolve against the
//!    composite covariance, symmetric selection of extreme eigenvectors
//! 3. **Features**: project, per-component variance, natural log
//! 4. **Stream replay**: windowed, restartable chunking of a continuous
//!    recording for streaming inference
//!
//! Band-pass filtering and dataset parsing happen upstream; this crate
//! consumes already-epoched trials.

pub mod covariance;
pub mod filters;
pub mod stream;

pub use covariance::*;
pub use filters::*;
pub use stream::*;
