//! Spatial covariance estimation for multichannel windows.

use ndarray::{Array2, ArrayView2, Axis};

use vortex_core::{ClassLabel, Error, Result, TrialSet};

/// Sample covariance estimator for `channels × samples` windows.
///
/// Trace normalization divides each covariance by its trace so that absolute
/// signal amplitude does not dominate when covariances are averaged across
/// trials of varying strength. Recommended when feeding CSP.
#[derive(Debug, Clone, Copy)]
pub struct Covariance {
    trace_normalize: bool,
}

impl Default for Covariance {
    fn default() -> Self {
        Self {
            trace_normalize: false,
        }
    }
}

impl Covariance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_normalization(mut self, enabled: bool) -> Self {
        self.trace_normalize = enabled;
        self
    }

    /// Sample covariance of a `channels × samples` window.
    ///
    /// Each channel is mean-centered, the outer product is normalized by the
    /// sample count, and the result is symmetrized against floating-point
    /// drift. Errors if the window is rank-deficient (`samples < channels`)
    /// or any channel is flat.
    pub fn estimate(&self, window: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (channels, samples) = window.dim();
        if samples < channels {
            return Err(Error::InsufficientSamples { channels, samples });
        }

        let means = window
            .mean_axis(Axis(1))
            .ok_or_else(|| Error::InvalidInput("window has no samples".into()))?;
        let centered = &window - &means.insert_axis(Axis(1));

        for (channel, row) in centered.axis_iter(Axis(0)).enumerate() {
            if row.iter().all(|v| v.abs() < f64::EPSILON) {
                return Err(Error::FlatChannel { channel });
            }
        }

        let mut cov = centered.dot(&centered.t()) / samples as f64;

        // Symmetrize: the dot product can pick up asymmetry in the last ulps.
        let cov_t = cov.t().to_owned();
        cov = (&cov + &cov_t) * 0.5;

        if self.trace_normalize {
            let trace: f64 = cov.diag().sum();
            cov /= trace;
        }

        Ok(cov)
    }

    /// Average covariance across all trials of `label` in `set`.
    ///
    /// Averages (rather than sums) per-trial covariances so that class
    /// covariances stay comparable under trial-count imbalance.
    pub fn class_average(&self, set: &TrialSet, label: ClassLabel) -> Result<Array2<f64>> {
        let channels = set.n_channels();
        let mut sum = Array2::<f64>::zeros((channels, channels));
        let mut count = 0usize;

        for trial in set.trials().iter().filter(|t| t.label() == label) {
            sum += &self.estimate(trial.data().view())?;
            count += 1;
        }

        if count == 0 {
            return Err(Error::InvalidInput(format!(
                "no trials with label {label} in set"
            )));
        }

        Ok(sum / count as f64)
    }
}
