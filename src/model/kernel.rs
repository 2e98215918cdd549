//! Gaussian-kernel ridge regression
//!
//! Training solves
//!
//! ```text
//! (K + I / C) alpha = y,    K[i, j] = exp(-||x_i - x_j||^2 / (2 sigma^2))
//! ```
//!
//! in the least-squares sense, and prediction evaluates `K_cross * alpha` between
//! query rows and the support rows. Every support row takes part in the solution;
//! there is no sparsity-inducing selection.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Regularization strength used when none (or a non-positive one) is given
pub const DEFAULT_C: f64 = 1000.0;

/// Relative size of a negative squared distance still attributed to round-off
const ROUNDOFF_TOLERANCE: f64 = 1e-9;

const SOLVE_EPS: f64 = 1e-12;

/// Hyperparameters of the regressor
///
/// `None` or a non-positive value selects the built-in heuristic: [DEFAULT_C] for `c`,
/// and the mean pairwise squared distance between support rows for `sigma`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelParams {
    /// Regularization strength (the diagonal gets `1 / c`)
    pub c: Option<f64>,
    /// Gaussian kernel width
    pub sigma: Option<f64>,
}

impl KernelParams {
    pub fn new(c: f64, sigma: f64) -> Self {
        Self {
            c: Some(c),
            sigma: Some(sigma),
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = Some(c);
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    fn positive_c(&self) -> Option<f64> {
        self.c.filter(|c| *c > 0.0)
    }

    fn positive_sigma(&self) -> Option<f64> {
        self.sigma.filter(|s| *s > 0.0)
    }
}

/// Outcome of [train]: the coefficients and the hyperparameters actually used
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedKernel {
    pub alpha: DVector<f64>,
    pub c: f64,
    pub sigma: f64,
}

/// Squared Euclidean distances between every row of `a` and every row of `b`
///
/// Computed as `||a_i||^2 + ||b_j||^2 - 2 a_i . b_j`. Slightly negative results
/// from cancellation are clamped to zero; anything beyond round-off is reported
/// as [ForecastError::NumericInstability].
pub fn squared_distances(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ForecastError> {
    if a.ncols() != b.ncols() {
        return Err(ForecastError::invalid(format!(
            "rows have {} and {} columns",
            a.ncols(),
            b.ncols()
        )));
    }

    let a2: Vec<f64> = a.row_iter().map(|r| r.norm_squared()).collect();
    let b2: Vec<f64> = b.row_iter().map(|r| r.norm_squared()).collect();
    let cross = a * b.transpose();

    let mut d = DMatrix::zeros(a.nrows(), b.nrows());
    for i in 0..a.nrows() {
        for j in 0..b.nrows() {
            let scale = a2[i] + b2[j];
            d[(i, j)] = clamp_roundoff(scale - 2.0 * cross[(i, j)], scale).map_err(|e| {
                ForecastError::unstable(format!("rows {} and {}: {}", i, j, e))
            })?;
        }
    }
    Ok(d)
}

fn clamp_roundoff(value: f64, scale: f64) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("non-finite squared distance {}", value));
    }
    if value < -ROUNDOFF_TOLERANCE * scale.max(1.0) {
        return Err(format!(
            "squared distance {:e} is negative beyond round-off",
            value
        ));
    }
    Ok(value.max(0.0))
}

/// Mean of all entries of a squared-distance matrix
pub fn estimate_sigma(distances: &DMatrix<f64>) -> f64 {
    if distances.is_empty() {
        return 0.0;
    }
    distances.mean()
}

/// `exp(-D / (2 sigma^2))`, entries in `[0, 1]` for clamped distances
pub fn gaussian_kernel(distances: &DMatrix<f64>, sigma: f64) -> DMatrix<f64> {
    let gamma = -1.0 / (2.0 * sigma * sigma);
    distances.map(|d| (d * gamma).exp())
}

/// Train the regressor on normalized `support` rows and raw `targets`
///
/// # Errors
///
/// * [ForecastError::InvalidInput] if the support set is empty, the row count does
///   not match the target count, or sigma has to be estimated from identical rows
/// * [ForecastError::NumericInstability] if the distances or the solve break down
pub fn train(
    support: &DMatrix<f64>,
    targets: &DVector<f64>,
    params: KernelParams,
) -> Result<TrainedKernel, ForecastError> {
    let n = support.nrows();
    if n == 0 {
        return Err(ForecastError::invalid("support set is empty"));
    }
    if targets.len() != n {
        return Err(ForecastError::invalid(format!(
            "{} support rows but {} targets",
            n,
            targets.len()
        )));
    }

    let d = squared_distances(support, support)?;

    let c = params.positive_c().unwrap_or(DEFAULT_C);
    let sigma = match params.positive_sigma() {
        Some(sigma) => sigma,
        None => {
            let estimate = estimate_sigma(&d);
            if !(estimate > 0.0) {
                return Err(ForecastError::invalid(
                    "cannot estimate the kernel width: all support rows are identical",
                ));
            }
            tracing::debug!("Estimated kernel width sigma = {}", estimate);
            estimate
        }
    };

    let mut k = gaussian_kernel(&d, sigma);
    for i in 0..n {
        k[(i, i)] += 1.0 / c;
    }

    let alpha = k
        .svd(true, true)
        .solve(targets, SOLVE_EPS)
        .map_err(ForecastError::unstable)?;
    if alpha.iter().any(|a| !a.is_finite()) {
        return Err(ForecastError::unstable(
            "kernel system produced non-finite coefficients",
        ));
    }

    Ok(TrainedKernel { alpha, c, sigma })
}

/// Evaluate the trained regressor at each row of `query`
///
/// `sigma` must be the width used in training; a non-positive width is rejected
/// rather than re-estimated from the query.
pub fn predict(
    support: &DMatrix<f64>,
    query: &DMatrix<f64>,
    alpha: &DVector<f64>,
    sigma: f64,
) -> Result<DVector<f64>, ForecastError> {
    if support.nrows() != alpha.len() {
        return Err(ForecastError::invalid(format!(
            "{} support rows but {} coefficients",
            support.nrows(),
            alpha.len()
        )));
    }
    if !(sigma > 0.0) {
        return Err(ForecastError::invalid(format!(
            "kernel width {} is not positive",
            sigma
        )));
    }

    let d = squared_distances(query, support)?;
    Ok(gaussian_kernel(&d, sigma) * alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_support() -> (DMatrix<f64>, DVector<f64>) {
        let support = DMatrix::from_row_slice(
            3,
            5,
            &[
                1.0, 0.0, 0.0, 0.0, 0.0, //
                2.0, 0.0, 0.0, 0.0, 0.0, //
                3.0, 0.0, 0.0, 0.0, 0.0,
            ],
        );
        (support, DVector::from_vec(vec![10.0, 20.0, 30.0]))
    }

    #[test]
    fn test_recovers_training_target() {
        let (support, targets) = line_support();
        let trained = train(&support, &targets, KernelParams::default().with_c(1000.0)).unwrap();

        // Mean of [0, 1, 4, 1, 0, 1, 4, 1, 0]
        assert_relative_eq!(trained.sigma, 12.0 / 9.0);
        assert_eq!(trained.c, 1000.0);

        let query = DMatrix::from_row_slice(1, 5, &[2.0, 0.0, 0.0, 0.0, 0.0]);
        let y = predict(&support, &query, &trained.alpha, trained.sigma).unwrap();
        assert!((y[0] - 20.0).abs() < 0.5, "predicted {}", y[0]);
    }

    #[test]
    fn test_non_positive_params_fall_back() {
        let (support, targets) = line_support();
        let trained = train(&support, &targets, KernelParams::new(-1.0, 0.0)).unwrap();
        assert_eq!(trained.c, DEFAULT_C);
        assert_relative_eq!(trained.sigma, 12.0 / 9.0);

        let fixed = train(&support, &targets, KernelParams::new(5.0, 2.0)).unwrap();
        assert_eq!((fixed.c, fixed.sigma), (5.0, 2.0));
    }

    #[test]
    fn test_distances_are_symmetric() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, -3.0, 0.5, 1.0, 2.0]);
        let d = squared_distances(&x, &x).unwrap();
        for i in 0..3 {
            assert_eq!(d[(i, i)], 0.0);
            for j in 0..3 {
                assert_eq!(d[(i, j)], d[(j, i)]);
            }
        }
        assert_eq!(d[(0, 1)], 18.25);
        assert_eq!(d[(0, 2)], 0.0);
    }

    #[test]
    fn test_roundoff_is_clamped() {
        assert_eq!(clamp_roundoff(-1e-12, 4.0), Ok(0.0));
        assert_eq!(clamp_roundoff(-1e4, 1e16), Ok(0.0));
        assert_eq!(clamp_roundoff(2.5, 4.0), Ok(2.5));
        assert!(clamp_roundoff(-0.1, 4.0).is_err());
        assert!(clamp_roundoff(f64::NAN, 4.0).is_err());
    }

    #[test]
    fn test_kernel_values_in_unit_interval() {
        let a = DMatrix::from_fn(6, 5, |i, j| ((i * 7 + j * 3) % 5) as f64 - 2.0);
        let b = DMatrix::from_fn(4, 5, |i, j| ((i * 2 + j) % 3) as f64 * 0.5);
        let d = squared_distances(&a, &b).unwrap();
        for sigma in [1e-3, 0.5, 1.0, 10.0, 1e4] {
            let k = gaussian_kernel(&d, sigma);
            assert!(k.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_predict_is_idempotent() {
        let (support, targets) = line_support();
        let trained = train(&support, &targets, KernelParams::default()).unwrap();
        let query = DMatrix::from_row_slice(
            2,
            5,
            &[
                1.5, 0.0, 0.0, 0.0, 0.0, //
                2.5, 1.0, 0.0, 0.0, 0.0,
            ],
        );
        let first = predict(&support, &query, &trained.alpha, trained.sigma).unwrap();
        let second = predict(&support, &query, &trained.alpha, trained.sigma).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_errors() {
        let (support, targets) = line_support();
        let short = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(
            train(&support, &short, KernelParams::default()),
            Err(ForecastError::InvalidInput { .. })
        ));

        let trained = train(&support, &targets, KernelParams::default()).unwrap();
        let narrow = DMatrix::from_row_slice(1, 4, &[0.0, 0.0, 0.0, 0.0]);
        assert!(predict(&support, &narrow, &trained.alpha, trained.sigma).is_err());
        assert!(predict(&support, &support, &short, trained.sigma).is_err());
    }

    #[test]
    fn test_prediction_rejects_non_positive_sigma() {
        let (support, targets) = line_support();
        let trained = train(&support, &targets, KernelParams::default()).unwrap();
        for sigma in [0.0, -1.0] {
            assert!(matches!(
                predict(&support, &support, &trained.alpha, sigma),
                Err(ForecastError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_identical_rows_cannot_estimate_sigma() {
        let support = DMatrix::from_element(3, 5, 1.0);
        let targets = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            train(&support, &targets, KernelParams::default()),
            Err(ForecastError::InvalidInput { .. })
        ));
        assert!(train(&support, &targets, KernelParams::default().with_sigma(1.0)).is_ok());
    }
}
