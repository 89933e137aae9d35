//! CSP + classifier composition.

use ndarray::Axis;

use vortex_core::{ClassLabel, Error, Result, TrialSet};
use vortex_csp::{CspConfig, SpatialFilterBank, StreamChunk};

use crate::classifier::Classifier;

/// Label assigned to one stream window, with its time metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamPrediction {
    pub label: ClassLabel,
    pub start_sample: usize,
}

/// Training and inference orchestration: spatial filtering into feature
/// vectors, then the opaque classifier capability.
///
/// Holds no global state; everything lives in the fitted filter bank and
/// the classifier instance it owns.
pub struct ClassificationPipeline<C: Classifier> {
    csp_config: CspConfig,
    classifier: C,
    bank: Option<SpatialFilterBank>,
}

impl<C: Classifier> ClassificationPipeline<C> {
    pub fn new(csp_config: CspConfig, classifier: C) -> Self {
        Self {
            csp_config,
            classifier,
            bank: None,
        }
    }

    /// Fit the filter bank on `train`, then the classifier on the
    /// transformed training features.
    pub fn fit(&mut self, train: &TrialSet) -> Result<()> {
        let bank = SpatialFilterBank::fit(&self.csp_config, train)?;
        let features = bank.transform(train)?;
        self.classifier.fit(features.view(), &train.labels())?;
        self.bank = Some(bank);
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.bank.is_some()
    }

    /// Fitted filter bank, if any.
    pub fn bank(&self) -> Option<&SpatialFilterBank> {
        self.bank.as_ref()
    }

    fn fitted_bank(&self) -> Result<&SpatialFilterBank> {
        self.bank
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("pipeline used before fit".into()))
    }

    /// Predict one label per trial in `set`.
    pub fn predict_trials(&self, set: &TrialSet) -> Result<Vec<ClassLabel>> {
        let features = self.fitted_bank()?.transform(set)?;
        self.classifier.predict(features.view())
    }

    /// Predict the label of one stream window, carrying its start offset
    /// through to the caller.
    pub fn predict_chunk(&self, chunk: &StreamChunk) -> Result<StreamPrediction> {
        let features = self.fitted_bank()?.transform_one(chunk.data.view())?;
        let as_row = features.insert_axis(Axis(0));
        let labels = self.classifier.predict(as_row.view())?;
        Ok(StreamPrediction {
            label: labels[0],
            start_sample: chunk.start_sample,
        })
    }

    /// Fraction of `set` whose predicted label matches the true one.
    pub fn accuracy_on(&self, set: &TrialSet) -> Result<f64> {
        let predicted = self.predict_trials(set)?;
        let correct = predicted
            .iter()
            .zip(set.labels())
            .filter(|(p, t)| **p == *t)
            .count();
        Ok(correct as f64 / set.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LogisticRegression;
    use ndarray::Array2;
    use vortex_core::Trial;
    use vortex_csp::{StreamConfig, StreamSimulator};

    fn noise(i: usize) -> f64 {
        ((i.wrapping_mul(1_103_515_245).wrapping_add(12_345)) % 2048) as f64 / 2048.0 - 0.5
    }

    fn synth_trial(seed: usize, strong_channel: usize, label: u32) -> Trial {
        let data = Array2::from_shape_fn((4, 96), |(c, t)| {
            let amp = if c == strong_channel { 5.0 } else { 1.0 };
            let freq = 0.11 + 0.029 * c as f64;
            amp * (freq * t as f64 + 1.7 * c as f64 + 0.3 * seed as f64).sin()
                + 0.3 * noise(seed * 7919 + c * 131 + t)
        });
        Trial::new(data, ClassLabel(label), 160.0).unwrap()
    }

    fn training_set() -> TrialSet {
        let mut trials = Vec::new();
        for i in 0..10 {
            trials.push(synth_trial(i, 0, 1));
            trials.push(synth_trial(i + 1000, 1, 2));
        }
        TrialSet::new(trials).unwrap()
    }

    #[test]
    fn test_fit_then_predict_recovers_training_labels() {
        let set = training_set();
        let mut pipeline =
            ClassificationPipeline::new(CspConfig::default(), LogisticRegression::default());
        pipeline.fit(&set).unwrap();

        let accuracy = pipeline.accuracy_on(&set).unwrap();
        assert!(
            accuracy > 0.9,
            "training accuracy {accuracy} unexpectedly low"
        );
    }

    #[test]
    fn test_unfitted_pipeline_refuses_inference() {
        let pipeline =
            ClassificationPipeline::new(CspConfig::default(), LogisticRegression::default());
        assert!(!pipeline.is_fitted());
        assert!(pipeline.predict_trials(&training_set()).is_err());
    }

    #[test]
    fn test_streaming_predictions_carry_offsets() {
        let set = training_set();
        let mut pipeline =
            ClassificationPipeline::new(CspConfig::default(), LogisticRegression::default());
        pipeline.fit(&set).unwrap();

        // Replay one class-1 trial as an overlapping stream.
        let recording = synth_trial(42, 0, 1).data().clone();
        let simulator = StreamSimulator::new(
            recording,
            StreamConfig {
                window_len: 48,
                step: 16,
            },
        )
        .unwrap();

        let predictions: Vec<StreamPrediction> = simulator
            .chunks()
            .map(|chunk| pipeline.predict_chunk(&chunk).unwrap())
            .collect();

        assert_eq!(predictions.len(), simulator.n_chunks());
        for (i, prediction) in predictions.iter().enumerate() {
            assert_eq!(prediction.start_sample, i * 16);
            assert!(
                prediction.label == ClassLabel(1) || prediction.label == ClassLabel(2)
            );
        }
    }
}
