//! Cross-subject, cross-run-type evaluation sweep.
//!
//! Drives the classification pipeline over every supplied
//! (subject, run-type) unit with stratified k-fold cross-validation. Units
//! are independent, so they fan out across a rayon worker pool; each worker
//! fits its own filter bank and classifier, and score records are merged
//! only after all workers finish.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use vortex_core::{Result, RunType, SubjectId, TrialSet};
use vortex_csp::CspConfig;

use crate::classifier::Classifier;
use crate::folds::{stratified_folds, training_indices};
use crate::pipeline::ClassificationPipeline;
use crate::report::{EvaluationReport, ScoreRecord, SkipReason, SkipRecord};

/// One (subject, run-type) trial set supplied by the acquisition
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationUnit {
    pub subject: SubjectId,
    pub run_type: RunType,
    pub trials: TrialSet,
}

/// Sweep parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Cross-validation folds per unit.
    pub n_folds: usize,
    /// CSP parameters shared by every pipeline fit.
    pub csp: CspConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            csp: CspConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(vortex_core::Error::Config(format!(
                "n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        self.csp.validate()
    }
}

/// Evaluation driver. `make_classifier` builds a fresh classifier for every
/// fold, so no fitted state is ever shared between folds or workers.
pub struct EvaluationHarness<F> {
    config: EvaluationConfig,
    make_classifier: F,
}

enum UnitOutcome {
    Scored {
        records: Vec<ScoreRecord>,
        fold_skips: Vec<SkipRecord>,
    },
    Skipped(SkipRecord),
}

impl<C, F> EvaluationHarness<F>
where
    C: Classifier,
    F: Fn() -> C + Sync,
{
    pub fn new(config: EvaluationConfig, make_classifier: F) -> Self {
        Self {
            config,
            make_classifier,
        }
    }

    /// Run the full sweep and aggregate into a report.
    ///
    /// A unit that cannot be evaluated (too few trials, class imbalance
    /// below the fold count, wrong class count) is recorded as skipped and
    /// excluded from its run-type mean; it never aborts the sweep. The same
    /// isolation applies per fold.
    pub fn evaluate(&self, units: &[EvaluationUnit]) -> Result<EvaluationReport> {
        self.config.validate()?;

        let outcomes: Vec<UnitOutcome> = units
            .par_iter()
            .map(|unit| self.evaluate_unit(unit))
            .collect();

        // Merge only after every worker has finished.
        let mut records = Vec::new();
        let mut skips = Vec::new();
        for outcome in outcomes {
            match outcome {
                UnitOutcome::Scored {
                    records: unit_records,
                    fold_skips,
                } => {
                    records.extend(unit_records);
                    skips.extend(fold_skips);
                }
                UnitOutcome::Skipped(skip) => skips.push(skip),
            }
        }

        let report = EvaluationReport::new(records, skips, units.len());
        tracing::info!(
            evaluated = report.evaluated_units(),
            expected = report.expected_units(),
            final_score = report.final_score(),
            "evaluation sweep complete"
        );
        Ok(report)
    }

    fn evaluate_unit(&self, unit: &EvaluationUnit) -> UnitOutcome {
        if let Some(reason) = self.skip_reason(&unit.trials) {
            tracing::warn!(
                subject = %unit.subject,
                run_type = %unit.run_type,
                "skipping unit: {reason}"
            );
            return UnitOutcome::Skipped(SkipRecord {
                subject: unit.subject,
                run_type: unit.run_type.clone(),
                fold: None,
                reason,
            });
        }

        let labels = unit.trials.labels();
        let folds = match stratified_folds(&labels, self.config.n_folds) {
            Ok(folds) => folds,
            Err(e) => {
                return UnitOutcome::Skipped(SkipRecord {
                    subject: unit.subject,
                    run_type: unit.run_type.clone(),
                    fold: None,
                    reason: SkipReason::FoldFailed {
                        message: e.to_string(),
                    },
                });
            }
        };

        let mut records = Vec::with_capacity(folds.len());
        let mut fold_skips = Vec::new();

        for held_out in 0..folds.len() {
            match self.evaluate_fold(&unit.trials, &folds, held_out) {
                Ok(accuracy) => records.push(ScoreRecord {
                    subject: unit.subject,
                    run_type: unit.run_type.clone(),
                    fold: held_out,
                    accuracy,
                }),
                Err(e) => {
                    tracing::warn!(
                        subject = %unit.subject,
                        run_type = %unit.run_type,
                        fold = held_out,
                        "fold failed: {e}"
                    );
                    fold_skips.push(SkipRecord {
                        subject: unit.subject,
                        run_type: unit.run_type.clone(),
                        fold: Some(held_out),
                        reason: SkipReason::FoldFailed {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        tracing::info!(
            subject = %unit.subject,
            run_type = %unit.run_type,
            folds = records.len(),
            "unit evaluated"
        );

        UnitOutcome::Scored {
            records,
            fold_skips,
        }
    }

    fn evaluate_fold(
        &self,
        trials: &TrialSet,
        folds: &[Vec<usize>],
        held_out: usize,
    ) -> Result<f64> {
        let train = trials.subset(&training_indices(folds, held_out))?;
        let test = trials.subset(&folds[held_out])?;

        let mut pipeline =
            ClassificationPipeline::new(self.config.csp, (self.make_classifier)());
        pipeline.fit(&train)?;
        pipeline.accuracy_on(&test)
    }

    /// Structural checks decided before any fitting happens.
    fn skip_reason(&self, trials: &TrialSet) -> Option<SkipReason> {
        if trials.len() < self.config.n_folds {
            return Some(SkipReason::TooFewTrials {
                have: trials.len(),
                need: self.config.n_folds,
            });
        }

        let classes = trials.classes();
        if classes.len() != 2 {
            return Some(SkipReason::WrongClassCount {
                got: classes.len(),
            });
        }

        let smallest = classes
            .iter()
            .map(|&c| trials.class_count(c))
            .min()
            .unwrap_or(0);
        if smallest < self.config.n_folds {
            return Some(SkipReason::ClassTooSmall {
                have: smallest,
                need: self.config.n_folds,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LogisticRegression;
    use ndarray::Array2;
    use vortex_core::{ClassLabel, Trial};

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

    fn unit(subject: u32, run_type: &str, per_class: usize, seed: usize) -> EvaluationUnit {
        let mut trials = Vec::new();
        for i in 0..per_class {
            trials.push(synth_trial(seed + i, 0, 1));
            trials.push(synth_trial(seed + i + 1000, 1, 2));
        }
        EvaluationUnit {
            subject: SubjectId(subject),
            run_type: RunType::new(run_type),
            trials: TrialSet::new(trials).unwrap(),
        }
    }

    fn harness(n_folds: usize) -> EvaluationHarness<impl Fn() -> LogisticRegression + Sync> {
        EvaluationHarness::new(
            EvaluationConfig {
                n_folds,
                csp: CspConfig::default(),
            },
            LogisticRegression::default,
        )
    }

    #[test]
    fn test_full_sweep_scores_every_unit() {
        let units = vec![
            unit(1, "open-fists", 6, 0),
            unit(1, "imagine-fists", 6, 50),
            unit(2, "open-fists", 6, 100),
            unit(2, "imagine-fists", 6, 150),
        ];

        let report = harness(3).evaluate(&units).unwrap();

        assert_eq!(report.evaluated_units(), 4);
        assert_eq!(report.expected_units(), 4);
        assert!(report.skips().is_empty());
        assert_eq!(report.records().len(), 4 * 3);
        assert_eq!(report.run_type_means().len(), 2);

        let score = report.final_score().unwrap();
        assert!((0.0..=1.0).contains(&score), "score {score} out of range");
    }

    #[test]
    fn test_undersized_unit_is_skipped_not_fatal() {
        let units = vec![
            unit(1, "open-fists", 6, 0),
            unit(2, "open-fists", 2, 100), // 2 per class < 3 folds
        ];

        let report = harness(3).evaluate(&units).unwrap();

        assert_eq!(report.evaluated_units(), 1);
        assert_eq!(report.expected_units(), 2);
        assert_eq!(report.skips().len(), 1);
        assert!(matches!(
            report.skips()[0].reason,
            SkipReason::ClassTooSmall { have: 2, need: 3 }
        ));
        assert!(report.final_score().is_some());
    }

    #[test]
    fn test_single_class_unit_is_skipped() {
        let trials: Vec<Trial> = (0..8).map(|i| synth_trial(i, 0, 1)).collect();
        let units = vec![EvaluationUnit {
            subject: SubjectId(7),
            run_type: RunType::new("open-fists"),
            trials: TrialSet::new(trials).unwrap(),
        }];

        let report = harness(3).evaluate(&units).unwrap();
        assert_eq!(report.evaluated_units(), 0);
        assert!(matches!(
            report.skips()[0].reason,
            SkipReason::WrongClassCount { got: 1 }
        ));
        assert!(report.final_score().is_none());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let result = harness(1).evaluate(&[]);
        assert!(result.is_err());
    }
}
