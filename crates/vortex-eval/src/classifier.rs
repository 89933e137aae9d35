//! Downstream classifier capability.
//!
//! The pipeline treats the classifier as an opaque fit/predict dependency;
//! any implementation of [`Classifier`] can be plugged in. A binary logistic
//! regression is provided so the crate works out of the box.

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use vortex_core::{ClassLabel, Error, Result};

/// Opaque fit/predict capability consumed by the classification pipeline.
pub trait Classifier: Send {
    /// Train on a `trials × features` matrix with parallel labels.
    fn fit(&mut self, features: ArrayView2<f64>, labels: &[ClassLabel]) -> Result<()>;

    /// Predict one label per row of `features`.
    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<ClassLabel>>;
}

/// Hyperparameters for [`LogisticRegression`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    pub learning_rate: f64,
    pub max_epochs: usize,
    /// L2 ridge strength on the weights (not the bias).
    pub l2: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_epochs: 500,
            l2: 1e-3,
        }
    }
}

/// Binary logistic regression trained by full-batch gradient descent.
///
/// Deterministic: weights start at zero, so two fits on the same data give
/// identical models. CSP log-variance features are low-dimensional and well
/// scaled, so plain gradient descent converges without standardization.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    state: Option<FittedLogistic>,
}

#[derive(Debug, Clone)]
struct FittedLogistic {
    weights: Array1<f64>,
    bias: f64,
    /// Label mapped to the negative side of the decision function.
    negative: ClassLabel,
    /// Label mapped to the positive side.
    positive: ClassLabel,
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: ArrayView2<f64>, labels: &[ClassLabel]) -> Result<()> {
        let (rows, dims) = features.dim();
        if rows == 0 || rows != labels.len() {
            return Err(Error::Classifier(format!(
                "feature rows ({rows}) and labels ({}) disagree",
                labels.len()
            )));
        }

        let mut classes: Vec<ClassLabel> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() != 2 {
            return Err(Error::Classifier(format!(
                "logistic regression requires exactly 2 classes, got {}",
                classes.len()
            )));
        }
        let (negative, positive) = (classes[0], classes[1]);

        let targets: Vec<f64> = labels
            .iter()
            .map(|l| if *l == positive { 1.0 } else { 0.0 })
            .collect();

        let mut weights = Array1::<f64>::zeros(dims);
        let mut bias = 0.0;
        let n = rows as f64;

        for _ in 0..self.config.max_epochs {
            let mut grad_w = Array1::<f64>::zeros(dims);
            let mut grad_b = 0.0;

            for (row, &target) in features.rows().into_iter().zip(&targets) {
                let z = row.dot(&weights) + bias;
                let residual = sigmoid(z) - target;
                grad_w.scaled_add(residual, &row);
                grad_b += residual;
            }

            grad_w /= n;
            grad_b /= n;
            grad_w.scaled_add(self.config.l2, &weights);

            weights.scaled_add(-self.config.learning_rate, &grad_w);
            bias -= self.config.learning_rate * grad_b;
        }

        self.state = Some(FittedLogistic {
            weights,
            bias,
            negative,
            positive,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<ClassLabel>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Error::Classifier("predict called before fit".into()))?;

        if features.ncols() != state.weights.len() {
            return Err(Error::Classifier(format!(
                "expected {} features per row, got {}",
                state.weights.len(),
                features.ncols()
            )));
        }

        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                let z = row.dot(&state.weights) + state.bias;
                if sigmoid(z) >= 0.5 {
                    state.positive
                } else {
                    state.negative
                }
            })
            .collect())
    }
}
