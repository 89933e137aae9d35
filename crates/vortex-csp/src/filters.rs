//! Common Spatial Patterns filter bank.
//!
//! CSP finds spatial filters (linear channel combinations) that maximize the
//! variance ratio between two classes of trials. Fitting solves the
//! generalized symmetric eigenproblem
//!
//! ```text
//! R1 · v = λ · (R1 + R2) · v
//! ```
//!
//! where `R1`/`R2` are the class-average covariances. Eigenvalues near 1
//! mark components dominated by class 1, eigenvalues near 0 mark components
//! dominated by class 2; the filter bank keeps the `k/2` most extreme
//! eigenvectors from each end of the spectrum.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use vortex_core::{ClassLabel, Error, Result, TrialSet};

use crate::covariance::Covariance;

/// Diagonal ridge added to the composite covariance before factorization.
const REGULARIZATION_EPS: f64 = 1e-8;

/// Configuration for CSP fitting and feature extraction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CspConfig {
    /// Number of spatial filters to retain. Must be even and at least 2;
    /// `n_components / 2` filters are kept from each end of the eigenvalue
    /// spectrum.
    pub n_components: usize,

    /// Relative condition threshold for the composite covariance. Fitting
    /// fails with [`Error::IllConditionedCovariance`] when the squared ratio
    /// of the smallest to largest Cholesky pivot falls below this.
    pub covariance_tolerance: f64,

    /// Floor applied to projected variances before the log transform.
    pub variance_floor: f64,

    /// Whether per-trial covariances are trace-normalized before averaging.
    pub trace_normalize: bool,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            n_components: 4,
            covariance_tolerance: 1e-10,
            variance_floor: 1e-12,
            trace_normalize: true,
        }
    }
}

impl CspConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_components < 2 || self.n_components % 2 != 0 {
            return Err(Error::Config(format!(
                "n_components must be an even integer >= 2, got {}",
                self.n_components
            )));
        }
        if !self.covariance_tolerance.is_finite() || self.covariance_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "covariance_tolerance must be a non-negative float, got {}",
                self.covariance_tolerance
            )));
        }
        if !self.variance_floor.is_finite() || self.variance_floor <= 0.0 {
            return Err(Error::Config(format!(
                "variance_floor must be a positive float, got {}",
                self.variance_floor
            )));
        }
        Ok(())
    }
}

/// Fitted CSP projection.
///
/// Produced by [`SpatialFilterBank::fit`] and immutable afterwards: every
/// method takes `&self`, so one fitted bank can be shared read-only across
/// concurrent inference callers. Fitting is atomic — any error leaves no
/// partially constructed bank behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialFilterBank {
    projection: Array2<f64>,
    class_covariances: [Array2<f64>; 2],
    classes: [ClassLabel; 2],
    eigenvalues: Vec<f64>,
    n_channels: usize,
    variance_floor: f64,
}

impl SpatialFilterBank {
    /// Fit CSP filters from a labeled trial set.
    ///
    /// Requires exactly two distinct labels. One-vs-rest decomposition for
    /// more classes is a deliberate extension point left to callers: fit one
    /// bank per class against the union of the others.
    pub fn fit(config: &CspConfig, set: &TrialSet) -> Result<Self> {
        config.validate()?;

        let classes = set.classes();
        if classes.len() != 2 {
            return Err(Error::UnsupportedClassCount { got: classes.len() });
        }
        let classes = [classes[0], classes[1]];

        let channels = set.n_channels();
        if config.n_components > channels {
            return Err(Error::Config(format!(
                "n_components ({}) exceeds channel count ({channels})",
                config.n_components
            )));
        }

        let estimator = Covariance::new().with_trace_normalization(config.trace_normalize);
        let r1 = estimator.class_average(set, classes[0])?;
        let r2 = estimator.class_average(set, classes[1])?;

        let mut composite = &r1 + &r2;
        for i in 0..channels {
            composite[[i, i]] += REGULARIZATION_EPS;
        }

        let (eigenvalues, eigenvectors) =
            generalized_symmetric_eig(&r1, &composite, config.covariance_tolerance)?;

        // Symmetric selection: k/2 columns from each end of the sorted
        // spectrum, most discriminative first.
        let half = config.n_components / 2;
        let mut selected: Vec<usize> = (0..half).collect();
        selected.extend((channels - half)..channels);

        let projection = Array2::from_shape_fn((channels, config.n_components), |(i, j)| {
            eigenvectors[(i, selected[j])]
        });
        let retained: Vec<f64> = selected.iter().map(|&j| eigenvalues[j]).collect();

        tracing::debug!(
            classes = ?classes,
            lambda_max = eigenvalues[0],
            lambda_min = eigenvalues[channels - 1],
            "fitted CSP filter bank with {} of {} components",
            config.n_components,
            channels,
        );

        Ok(Self {
            projection,
            class_covariances: [r1, r2],
            classes,
            eigenvalues: retained,
            n_channels: channels,
            variance_floor: config.variance_floor,
        })
    }

    /// Log-variance features for a single `channels × samples` window.
    ///
    /// Projects with `Wᵀ·X`, takes the per-component variance and its
    /// natural log. The variance floor guards degenerate windows.
    pub fn transform_one(&self, window: ArrayView2<f64>) -> Result<Array1<f64>> {
        if window.nrows() != self.n_channels {
            return Err(Error::ShapeMismatch {
                expected_channels: self.n_channels,
                actual_channels: window.nrows(),
            });
        }
        if window.ncols() == 0 {
            return Err(Error::InvalidInput("window has no samples".into()));
        }

        let projected = self.projection.t().dot(&window);
        let samples = projected.ncols() as f64;

        let features = projected
            .rows()
            .into_iter()
            .map(|row| {
                let mean = row.sum() / samples;
                let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples;
                var.max(self.variance_floor).ln()
            })
            .collect();

        Ok(Array1::from_vec(features))
    }

    /// Feature matrix (`trials × n_components`) for a whole trial set.
    pub fn transform(&self, set: &TrialSet) -> Result<Array2<f64>> {
        let mut features = Array2::zeros((set.len(), self.n_components()));
        for (i, trial) in set.trials().iter().enumerate() {
            let row = self.transform_one(trial.data().view())?;
            features.row_mut(i).assign(&row);
        }
        Ok(features)
    }

    /// Spatial patterns (columns of `C_composite · W`), the forward-model
    /// counterpart of the filters. Useful for topographic inspection by
    /// downstream tooling; no plotting happens here.
    pub fn spatial_patterns(&self) -> Array2<f64> {
        let composite = &self.class_covariances[0] + &self.class_covariances[1];
        composite.dot(&self.projection)
    }

    /// Retained eigenvalues, ordered like the projection columns.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// The `channels × k` projection matrix.
    pub fn projection(&self) -> &Array2<f64> {
        &self.projection
    }

    /// The two class labels, ascending; the first is the class whose
    /// variance the leading filters maximize.
    pub fn classes(&self) -> [ClassLabel; 2] {
        self.classes
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn n_components(&self) -> usize {
        self.projection.ncols()
    }
}

/// Solve `a · v = λ · b · v` for symmetric `a` and symmetric
/// positive-definite `b` by Cholesky whitening.
///
/// Factors `b = L·Lᵀ`, eigendecomposes the whitened matrix
/// `L⁻¹ · a · L⁻ᵀ`, and maps the eigenvectors back through `L⁻ᵀ`. The
/// whitening makes the returned eigenvectors `b`-orthonormal
/// (`Vᵀ · b · V = I`), which keeps projected feature scales stable.
/// Eigenpairs are returned sorted by eigenvalue, descending.
fn generalized_symmetric_eig(
    a: &Array2<f64>,
    b: &Array2<f64>,
    tolerance: f64,
) -> Result<(Vec<f64>, DMatrix<f64>)> {
    let n = a.nrows();
    let a_mat = DMatrix::from_row_iterator(n, n, a.iter().copied());
    let b_mat = DMatrix::from_row_iterator(n, n, b.iter().copied());

    let cholesky = Cholesky::new(b_mat).ok_or(Error::IllConditionedCovariance {
        min_pivot: 0.0,
        tolerance,
    })?;
    let l = cholesky.l();

    let pivots = l.diagonal();
    let min_pivot = pivots.min();
    let max_pivot = pivots.max();
    if (min_pivot / max_pivot).powi(2) < tolerance {
        return Err(Error::IllConditionedCovariance {
            min_pivot,
            tolerance,
        });
    }

    // Whiten: M = L⁻¹ · A · L⁻ᵀ, computed with triangular solves only.
    let y = l
        .solve_lower_triangular(&a_mat)
        .ok_or(Error::IllConditionedCovariance {
            min_pivot,
            tolerance,
        })?;
    let m = l
        .solve_lower_triangular(&y.transpose())
        .ok_or(Error::IllConditionedCovariance {
            min_pivot,
            tolerance,
        })?;
    let m = (&m + &m.transpose()) * 0.5;

    let eigen = SymmetricEigen::new(m);

    let back = l
        .transpose()
        .solve_upper_triangular(&eigen.eigenvectors)
        .ok_or(Error::IllConditionedCovariance {
            min_pivot,
            tolerance,
        })?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[j]
            .partial_cmp(&eigen.eigenvalues[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let values: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let mut vectors = DMatrix::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        vectors.set_column(dst, &back.column(src));
    }

    Ok((values, vectors))
}
