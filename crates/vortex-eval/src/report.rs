//! Score aggregation and the final evaluation report.
//!
//! Fold accuracies roll up in three stages: fold → (subject, run-type)
//! mean → run-type mean across subjects → final mean across run-types.
//! Skipped combinations are carried alongside the scores so the report can
//! state how much of the expected sweep actually contributed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use vortex_core::{RunType, SubjectId};

/// Accuracy of one cross-validation fold of one (subject, run-type) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub subject: SubjectId,
    pub run_type: RunType,
    pub fold: usize,
    pub accuracy: f64,
}

/// Why a unit or fold produced no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Fewer trials than folds.
    TooFewTrials { have: usize, need: usize },
    /// Some class has fewer trials than folds, so stratification would
    /// produce empty-class folds.
    ClassTooSmall { have: usize, need: usize },
    /// The unit does not carry exactly two classes.
    WrongClassCount { got: usize },
    /// One fold failed during fit or prediction.
    FoldFailed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewTrials { have, need } => {
                write!(f, "{have} trials for {need} folds")
            }
            Self::ClassTooSmall { have, need } => {
                write!(f, "smallest class has {have} trials for {need} folds")
            }
            Self::WrongClassCount { got } => write!(f, "{got} classes present, need 2"),
            Self::FoldFailed { message } => write!(f, "fold failed: {message}"),
        }
    }
}

/// Non-fatal record of a combination (or single fold) that could not be
/// evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub subject: SubjectId,
    pub run_type: RunType,
    /// `None` when the whole unit was skipped, `Some` for one failed fold.
    pub fold: Option<usize>,
    pub reason: SkipReason,
}

/// Aggregated outcome of one evaluation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    records: Vec<ScoreRecord>,
    skips: Vec<SkipRecord>,
    expected_units: usize,
}

impl EvaluationReport {
    pub fn new(records: Vec<ScoreRecord>, skips: Vec<SkipRecord>, expected_units: usize) -> Self {
        Self {
            records,
            skips,
            expected_units,
        }
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn skips(&self) -> &[SkipRecord] {
        &self.skips
    }

    /// Number of (subject, run-type) combinations expected by the sweep.
    pub fn expected_units(&self) -> usize {
        self.expected_units
    }

    /// Number of combinations that produced at least one fold score.
    pub fn evaluated_units(&self) -> usize {
        self.unit_means().len()
    }

    /// Mean fold accuracy per (subject, run-type) combination.
    pub fn unit_means(&self) -> BTreeMap<(SubjectId, RunType), f64> {
        let mut sums: BTreeMap<(SubjectId, RunType), (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            let entry = sums
                .entry((record.subject, record.run_type.clone()))
                .or_insert((0.0, 0));
            entry.0 += record.accuracy;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect()
    }

    /// Mean fold accuracy for one combination, if it was evaluated.
    pub fn unit_mean(&self, subject: SubjectId, run_type: &RunType) -> Option<f64> {
        self.unit_means().remove(&(subject, run_type.clone()))
    }

    /// Per-run-type mean across the subjects evaluated for that run-type.
    ///
    /// Skipped combinations are excluded from the mean rather than counted
    /// as zero.
    pub fn run_type_means(&self) -> BTreeMap<RunType, f64> {
        let mut sums: BTreeMap<RunType, (f64, usize)> = BTreeMap::new();
        for ((_, run_type), mean) in self.unit_means() {
            let entry = sums.entry(run_type).or_insert((0.0, 0));
            entry.0 += mean;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(run_type, (sum, count))| (run_type, sum / count as f64))
            .collect()
    }

    /// Arithmetic mean across run-type means; `None` when nothing was
    /// evaluated.
    pub fn final_score(&self) -> Option<f64> {
        let means = self.run_type_means();
        if means.is_empty() {
            return None;
        }
        Some(means.values().sum::<f64>() / means.len() as f64)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evaluation report")?;
        for (run_type, mean) in self.run_type_means() {
            writeln!(f, "  {run_type}: {mean:.4}")?;
        }
        match self.final_score() {
            Some(score) => writeln!(f, "  final score: {score:.4}")?,
            None => writeln!(f, "  final score: n/a (nothing evaluated)")?,
        }
        if !self.skips.is_empty() {
            writeln!(
                f,
                "  evaluated {} of {} subject/run-type combinations",
                self.evaluated_units(),
                self.expected_units
            )?;
            for skip in &self.skips {
                match skip.fold {
                    Some(fold) => writeln!(
                        f,
                        "  skipped {} {} fold {fold}: {}",
                        skip.subject, skip.run_type, skip.reason
                    )?,
                    None => writeln!(
                        f,
                        "  skipped {} {}: {}",
                        skip.subject, skip.run_type, skip.reason
                    )?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: u32, run_type: &str, fold: usize, accuracy: f64) -> ScoreRecord {
        ScoreRecord {
            subject: SubjectId(subject),
            run_type: RunType::new(run_type),
            fold,
            accuracy,
        }
    }

    /// 2 subjects × 4 run-types with synthetic accuracies: the final score
    /// must equal the mean of 4 run-type means, each the mean of exactly 2
    /// subject means.
    #[test]
    fn test_nested_aggregation_arithmetic() {
        let mut records = Vec::new();
        let accuracies = [
            [[0.6, 0.8], [0.7, 0.9]], // run-type A: subject means 0.7, 0.8
            [[0.5, 0.5], [0.9, 0.7]], // run-type B: subject means 0.5, 0.8
            [[1.0, 1.0], [0.6, 0.6]], // run-type C: subject means 1.0, 0.6
            [[0.4, 0.6], [0.8, 1.0]], // run-type D: subject means 0.5, 0.9
        ];
        let names = ["A", "B", "C", "D"];
        for (r, per_subject) in accuracies.iter().enumerate() {
            for (s, folds) in per_subject.iter().enumerate() {
                for (fold, &accuracy) in folds.iter().enumerate() {
                    records.push(record(s as u32 + 1, names[r], fold, accuracy));
                }
            }
        }

        let report = EvaluationReport::new(records, Vec::new(), 8);
        assert_eq!(report.evaluated_units(), 8);

        let means = report.run_type_means();
        assert!((means[&RunType::new("A")] - 0.75).abs() < 1e-12);
        assert!((means[&RunType::new("B")] - 0.65).abs() < 1e-12);
        assert!((means[&RunType::new("C")] - 0.80).abs() < 1e-12);
        assert!((means[&RunType::new("D")] - 0.70).abs() < 1e-12);

        let expected_final = (0.75 + 0.65 + 0.80 + 0.70) / 4.0;
        assert!((report.final_score().unwrap() - expected_final).abs() < 1e-12);
    }

    #[test]
    fn test_skipped_units_are_excluded_not_zeroed() {
        let records = vec![
            record(1, "A", 0, 0.9),
            record(1, "A", 1, 0.7),
            // subject 2 run-type A skipped entirely
        ];
        let skips = vec![SkipRecord {
            subject: SubjectId(2),
            run_type: RunType::new("A"),
            fold: None,
            reason: SkipReason::TooFewTrials { have: 3, need: 5 },
        }];

        let report = EvaluationReport::new(records, skips, 2);
        assert_eq!(report.evaluated_units(), 1);
        assert_eq!(report.expected_units(), 2);

        // Mean over the one evaluated subject only: (0.9 + 0.7) / 2.
        let means = report.run_type_means();
        assert!((means[&RunType::new("A")] - 0.8).abs() < 1e-12);

        let rendered = report.to_string();
        assert!(rendered.contains("evaluated 1 of 2"));
        assert!(rendered.contains("skipped S002 A"));
    }

    #[test]
    fn test_empty_report_has_no_score() {
        let report = EvaluationReport::new(Vec::new(), Vec::new(), 4);
        assert!(report.final_score().is_none());
        assert_eq!(report.evaluated_units(), 0);
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = EvaluationReport::new(
            vec![record(1, "A", 0, 0.75)],
            Vec::new(),
            1,
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records(), report.records());
        assert_eq!(back.final_score(), report.final_score());
    }
}
