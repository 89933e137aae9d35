//! Fundamental types for motor-imagery decoding.
//!
//! Trials arrive from an external acquisition/epoching collaborator with
//! sampling rate and channel layout already resolved; nothing in this crate
//! parses raw recordings or annotation files.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// External subject number (e.g. participant index in a public dataset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub u32);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:03}", self.0)
    }
}

/// Experiment-condition grouping (e.g. "imagine-fists" vs "move-feet").
///
/// Treated as an opaque label supplied alongside each trial set; the decoder
/// never hardcodes a mapping from dataset run numbers to conditions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunType(pub String);

impl RunType {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Class identity of a trial (e.g. 1 = left fist, 2 = right fist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassLabel(pub u32);

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fixed-duration multichannel signal segment.
///
/// The data matrix is `channels × samples`, real-valued, already band-pass
/// filtered upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    data: Array2<f64>,
    label: ClassLabel,
    sample_rate_hz: f64,
}

impl Trial {
    pub fn new(data: Array2<f64>, label: ClassLabel, sample_rate_hz: f64) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidInput("trial data is empty".into()));
        }
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "sampling rate must be positive, got {sample_rate_hz}"
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "trial data contains NaN or infinite samples".into(),
            ));
        }
        Ok(Self {
            data,
            label,
            sample_rate_hz,
        })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn label(&self) -> ClassLabel {
        self.label
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Ordered collection of equally shaped labeled trials.
///
/// Invariant: all members share the same `channels × samples` shape and
/// sampling rate. Class balance is not required here; class-count
/// requirements belong to the fitting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSet {
    trials: Vec<Trial>,
}

impl TrialSet {
    pub fn new(trials: Vec<Trial>) -> Result<Self> {
        let first = trials
            .first()
            .ok_or_else(|| Error::InvalidInput("trial set is empty".into()))?;
        let (channels, samples) = (first.n_channels(), first.n_samples());
        let rate = first.sample_rate_hz();

        for (i, trial) in trials.iter().enumerate() {
            if trial.n_channels() != channels || trial.n_samples() != samples {
                return Err(Error::InvalidInput(format!(
                    "trial {i} has shape {}x{}, expected {channels}x{samples}",
                    trial.n_channels(),
                    trial.n_samples()
                )));
            }
            if (trial.sample_rate_hz() - rate).abs() > f64::EPSILON {
                return Err(Error::InvalidInput(format!(
                    "trial {i} sampled at {} Hz, expected {rate} Hz",
                    trial.sample_rate_hz()
                )));
            }
        }

        Ok(Self { trials })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn n_channels(&self) -> usize {
        self.trials[0].n_channels()
    }

    pub fn n_samples(&self) -> usize {
        self.trials[0].n_samples()
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.trials[0].sample_rate_hz()
    }

    /// Labels in trial order.
    pub fn labels(&self) -> Vec<ClassLabel> {
        self.trials.iter().map(Trial::label).collect()
    }

    /// Distinct class labels, sorted ascending.
    pub fn classes(&self) -> Vec<ClassLabel> {
        let mut classes = self.labels();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Number of trials carrying `label`.
    pub fn class_count(&self, label: ClassLabel) -> usize {
        self.trials.iter().filter(|t| t.label() == label).count()
    }

    /// New set holding clones of the trials at `indices`, in the given order.
    ///
    /// Used by the fold splitter to materialize train/test partitions.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let mut picked = Vec::with_capacity(indices.len());
        for &i in indices {
            let trial = self.trials.get(i).ok_or_else(|| {
                Error::InvalidInput(format!("subset index {i} out of range ({})", self.len()))
            })?;
            picked.push(trial.clone());
        }
        Self::new(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn trial(channels: usize, samples: usize, label: u32) -> Trial {
        let data = Array2::from_shape_fn((channels, samples), |(c, s)| (c + s) as f64);
        Trial::new(data, ClassLabel(label), 160.0).unwrap()
    }

    #[test]
    fn test_trial_rejects_empty_data() {
        let result = Trial::new(Array2::zeros((0, 0)), ClassLabel(1), 160.0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_trial_rejects_nonfinite_samples() {
        let mut data = Array2::zeros((2, 4));
        data[[1, 2]] = f64::NAN;
        let result = Trial::new(data, ClassLabel(1), 160.0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_trial_set_enforces_shape_invariant() {
        let result = TrialSet::new(vec![trial(4, 32, 1), trial(4, 16, 2)]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_trial_set_classes_sorted_distinct() {
        let set = TrialSet::new(vec![trial(2, 8, 2), trial(2, 8, 1), trial(2, 8, 2)]).unwrap();
        assert_eq!(set.classes(), vec![ClassLabel(1), ClassLabel(2)]);
        assert_eq!(set.class_count(ClassLabel(2)), 2);
    }

    #[test]
    fn test_subset_preserves_order() {
        let set = TrialSet::new(vec![trial(2, 8, 1), trial(2, 8, 2), trial(2, 8, 1)]).unwrap();
        let sub = set.subset(&[2, 0]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.labels(), vec![ClassLabel(1), ClassLabel(1)]);

        assert!(set.subset(&[7]).is_err());
    }
}
