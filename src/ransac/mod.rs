//! Robust fitting of the population concentration-decay curve
//!
//! Measurements are modelled as a linear combination of three time basis
//! functions,
//!
//! ```text
//! C(t) = a0 * t^-2 + a1 * ln(t) + a2 * (1 - e^-t)
//! ```
//!
//! and fitted with RANSAC: a fixed number of trials each draw a small random
//! subset of the measurements, solve the least-squares problem on that subset
//! and count how many of *all* measurements lie within `threshold` of the
//! trial curve. The trial with the most inliers wins.
//!
//! The inlier set is what the kernel regressor later uses as its support set.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Number of trials drawn when not configured otherwise
pub const DEFAULT_TRIALS: usize = 100_000;

/// Number of coefficients in the decay model, and therefore the smallest usable subset
pub const N_COEFFICIENTS: usize = 3;

/// Singular values below this are treated as zero when solving a trial subset
const SVD_EPS: f64 = 1e-12;

/// Options for the robust fitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Largest absolute residual (in concentration units) still counted as an inlier
    pub threshold: f64,
    /// Number of measurements drawn per trial (at least 3)
    pub subset_size: usize,
    /// Number of trials
    pub trials: usize,
    /// Seed for the random source. `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            threshold: 500.0,
            subset_size: 4,
            trials: DEFAULT_TRIALS,
            seed: None,
        }
    }
}

impl RansacOptions {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_subset_size(mut self, subset_size: usize) -> Self {
        self.subset_size = subset_size;
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A random source honouring [RansacOptions::seed]
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// A best-so-far improvement observed during fitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    /// Zero-based trial index
    pub trial: usize,
    /// Inlier count of that trial
    pub inliers: usize,
}

/// Result of [fit]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustFit {
    /// Decay model coefficients `[a0, a1, a2]`
    pub coefficients: [f64; N_COEFFICIENTS],
    /// Indices of the inlier measurements, ascending
    pub inliers: Vec<usize>,
    /// Every improvement of the best trial, in order
    pub history: Vec<Improvement>,
    /// Number of trials run
    pub trials: usize,
    /// Number of measurements the fit was run on
    pub n_samples: usize,
}

impl RobustFit {
    pub fn n_inliers(&self) -> usize {
        self.inliers.len()
    }

    /// Indices not in the inlier set
    pub fn outliers(&self) -> Vec<usize> {
        let mut is_inlier = vec![false; self.n_samples];
        self.inliers.iter().for_each(|&i| is_inlier[i] = true);
        (0..self.n_samples).filter(|&i| !is_inlier[i]).collect()
    }

    /// Evaluate the fitted decay curve at `time` (> 0)
    pub fn predict(&self, time: f64) -> f64 {
        basis(time)
            .iter()
            .zip(self.coefficients.iter())
            .map(|(b, a)| b * a)
            .sum()
    }
}

/// Basis functions `[t^-2, ln t, 1 - e^-t]`
pub fn basis(time: f64) -> [f64; N_COEFFICIENTS] {
    [time.powi(-2), time.ln(), 1.0 - (-time).exp()]
}

/// Fit the decay model to `(times, concentrations)` while rejecting outliers
///
/// # Errors
///
/// * [ForecastError::InvalidInput] if the arrays differ in length, a time is not
///   strictly positive, the threshold is not positive, or the subset size is below 3
///   or larger than the number of measurements
/// * [ForecastError::DegenerateFit] if no trial produced a single inlier
///
/// # Example
///
/// ```rust
/// use pkforecast::ransac::{fit, RansacOptions};
///
/// let times = [1.0, 2.0, 4.0, 6.0, 8.0, 12.0];
/// let conc: Vec<f64> = times
///     .iter()
///     .map(|t: &f64| 50.0 * (1.0 - (-t).exp()) - 5.0 * t.ln())
///     .collect();
///
/// let options = RansacOptions::default()
///     .with_threshold(1.0)
///     .with_subset_size(3)
///     .with_trials(500)
///     .with_seed(7);
/// let result = fit(&times, &conc, &options, &mut options.rng()).unwrap();
/// assert_eq!(result.n_inliers(), times.len());
/// ```
pub fn fit<R: Rng + ?Sized>(
    times: &[f64],
    concentrations: &[f64],
    options: &RansacOptions,
    rng: &mut R,
) -> Result<RobustFit, ForecastError> {
    let n = times.len();
    let k = options.subset_size;

    if concentrations.len() != n {
        return Err(ForecastError::invalid(format!(
            "{} times but {} concentrations",
            n,
            concentrations.len()
        )));
    }
    if k < N_COEFFICIENTS {
        return Err(ForecastError::invalid(format!(
            "subset size {} is below the {} model coefficients",
            k, N_COEFFICIENTS
        )));
    }
    if n < k {
        return Err(ForecastError::invalid(format!(
            "subset size {} exceeds the {} available samples",
            k, n
        )));
    }
    if let Some((i, t)) = times
        .iter()
        .enumerate()
        .find(|(_, t)| !(t.is_finite() && **t > 0.0))
    {
        return Err(ForecastError::invalid(format!(
            "time {} at index {} is not strictly positive",
            t, i
        )));
    }
    if !(options.threshold.is_finite() && options.threshold > 0.0) {
        return Err(ForecastError::invalid(format!(
            "threshold {} is not positive",
            options.threshold
        )));
    }

    let design = DMatrix::from_fn(n, N_COEFFICIENTS, |i, j| basis(times[i])[j]);
    let y = DVector::from_column_slice(concentrations);

    let mut best_count = 0;
    let mut best_coefficients = [0.0; N_COEFFICIENTS];
    let mut best_inliers = Vec::new();
    let mut history = Vec::new();

    let mut picks = vec![0usize; k];
    for trial in 0..options.trials {
        picks.iter_mut().for_each(|p| *p = rng.random_range(0..n));

        let sub_x = DMatrix::from_fn(k, N_COEFFICIENTS, |r, c| design[(picks[r], c)]);
        let sub_y = DVector::from_fn(k, |r, _| y[picks[r]]);
        let a = sub_x
            .svd(true, true)
            .solve(&sub_y, SVD_EPS)
            .map_err(ForecastError::unstable)?;
        if a.iter().any(|v| !v.is_finite()) {
            tracing::trace!("Trial {} produced non-finite coefficients, skipping", trial);
            continue;
        }

        let fitted = &design * &a;
        let is_inlier = |i: usize| (fitted[i] - y[i]).abs() < options.threshold;
        let count = (0..n).filter(|&i| is_inlier(i)).count();

        if count > best_count {
            tracing::debug!(
                "RANSAC trial {}, # inliers = {}, alpha = {:.4} {:.4} {:.4}",
                trial,
                count,
                a[0],
                a[1],
                a[2]
            );
            best_count = count;
            best_coefficients = [a[0], a[1], a[2]];
            best_inliers = (0..n).filter(|&i| is_inlier(i)).collect();
            history.push(Improvement {
                trial,
                inliers: count,
            });
        }
    }

    if best_count == 0 {
        return Err(ForecastError::DegenerateFit {
            trials: options.trials,
        });
    }

    tracing::info!(
        "# inliers = {} / {}, alpha = {:.4} {:.4} {:.4}",
        best_count,
        n,
        best_coefficients[0],
        best_coefficients[1],
        best_coefficients[2]
    );

    Ok(RobustFit {
        coefficients: best_coefficients,
        inliers: best_inliers,
        history,
        trials: options.trials,
        n_samples: n,
    })
}
