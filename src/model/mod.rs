//! The trained concentration model
//!
//! A [RegressionModel] owns everything needed to predict: the normalization
//! constants computed at training time, the kernel hyperparameters, the
//! normalized support rows with their raw concentration targets, and the
//! kernel coefficients. Rows passed to [RegressionModel::predict] are always
//! normalized with the stored constants, never with statistics of the query.
//!
//! ```rust
//! use pkforecast::*;
//!
//! let rows = vec![
//!     CovariateRow::new(1.0, 400.0, 0.0, 40.0, 70.0),
//!     CovariateRow::new(4.0, 400.0, 1.0, 55.0, 80.0),
//!     CovariateRow::new(12.0, 600.0, 0.0, 63.0, 66.0),
//!     CovariateRow::new(24.0, 600.0, 1.0, 48.0, 91.0),
//! ];
//! let targets = [1800.0, 1500.0, 900.0, 400.0];
//!
//! let model = RegressionModel::train(&rows, &targets, KernelParams::default()).unwrap();
//! let predicted = model.predict(&rows[..1]).unwrap();
//! assert_eq!(predicted.len(), 1);
//! assert!(predicted[0].is_finite());
//! ```

pub mod kernel;
pub mod normalizer;
mod update;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::data::covariate::{column, row_of, to_matrix};
use crate::data::{CovariateRow, Demographics};
use crate::error::ForecastError;

pub use kernel::{KernelParams, DEFAULT_C};
pub use normalizer::NormalizationConstants;
pub use update::Replacement;

/// A trained kernel ridge model over normalized covariate rows
#[derive(Debug, Clone)]
pub struct RegressionModel {
    constants: NormalizationConstants,
    c: f64,
    sigma: f64,
    support: DMatrix<f64>,
    targets: DVector<f64>,
    alpha: DVector<f64>,
}

impl RegressionModel {
    /// Train on all `rows`, with `targets` the measured concentrations
    pub fn train(
        rows: &[CovariateRow],
        targets: &[f64],
        params: KernelParams,
    ) -> Result<Self, ForecastError> {
        let indices: Vec<usize> = (0..rows.len()).collect();
        Self::train_subset(rows, targets, &indices, params)
    }

    /// Train on `rows[i]` / `targets[i]` for each `i` in `indices`
    ///
    /// Normalization constants are computed over the selected rows only.
    pub fn train_subset(
        rows: &[CovariateRow],
        targets: &[f64],
        indices: &[usize],
        params: KernelParams,
    ) -> Result<Self, ForecastError> {
        if rows.len() != targets.len() {
            return Err(ForecastError::invalid(format!(
                "{} covariate rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        let constants = NormalizationConstants::fit_subset(rows, indices)?;

        let support_rows: Vec<CovariateRow> =
            indices.iter().map(|&i| constants.apply(&rows[i])).collect();
        let support = to_matrix(&support_rows);
        let targets = DVector::from_iterator(indices.len(), indices.iter().map(|&i| targets[i]));

        let trained = kernel::train(&support, &targets, params)?;
        tracing::info!(
            "Trained on {} support rows, C = {}, sigma = {}",
            support.nrows(),
            trained.c,
            trained.sigma
        );

        Ok(RegressionModel {
            constants,
            c: trained.c,
            sigma: trained.sigma,
            support,
            targets,
            alpha: trained.alpha,
        })
    }

    pub fn constants(&self) -> &NormalizationConstants {
        &self.constants
    }

    /// Regularization strength in use
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Kernel width in use
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Normalized support rows, one per support sample
    pub fn support(&self) -> &DMatrix<f64> {
        &self.support
    }

    /// Raw concentration label of each support row
    pub fn targets(&self) -> &DVector<f64> {
        &self.targets
    }

    pub fn alpha(&self) -> &DVector<f64> {
        &self.alpha
    }

    pub fn n_support(&self) -> usize {
        self.support.nrows()
    }

    /// Support row `i`, normalized
    pub fn support_row(&self, i: usize) -> CovariateRow {
        row_of(&self.support, i)
    }

    /// Predict concentrations for raw covariate rows
    pub fn predict(&self, rows: &[CovariateRow]) -> Result<Vec<f64>, ForecastError> {
        let query = to_matrix(&self.constants.apply_all(rows));
        Ok(self.predict_normalized(&query)?.iter().copied().collect())
    }

    /// Predict for rows that are already normalized with [RegressionModel::constants]
    pub fn predict_normalized(&self, query: &DMatrix<f64>) -> Result<DVector<f64>, ForecastError> {
        self.check_shapes()?;
        kernel::predict(&self.support, query, &self.alpha, self.sigma)
    }

    /// Predict a concentration-time curve for a patient receiving `dose`
    pub fn predict_curve(
        &self,
        demographics: Demographics,
        dose: f64,
        grid: &TimeGrid,
    ) -> Result<Curve, ForecastError> {
        let times = grid.times()?;
        let rows: Vec<CovariateRow> = times
            .iter()
            .map(|&t| {
                CovariateRow::new(
                    t,
                    dose,
                    demographics.sex,
                    demographics.age,
                    demographics.weight,
                )
            })
            .collect();
        let concentrations = self.predict(&rows)?;
        Ok(Curve {
            times,
            concentrations,
        })
    }

    fn check_shapes(&self) -> Result<(), ForecastError> {
        let n = self.support.nrows();
        if self.targets.len() != n || self.alpha.len() != n {
            return Err(ForecastError::invalid(format!(
                "model holds {} support rows, {} targets and {} coefficients",
                n,
                self.targets.len(),
                self.alpha.len()
            )));
        }
        Ok(())
    }

    /// Column `TIME` of the support rows replaced by `time` (normalized)
    fn support_at_time(&self, time: f64) -> DMatrix<f64> {
        let mut query = self.support.clone();
        query.column_mut(column::TIME).fill(time);
        query
    }
}

/// Evenly spaced prediction times from `start` to `stop` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeGrid {
    pub start: f64,
    pub stop: f64,
    /// Number of points
    pub n: usize,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            start: 1.0,
            stop: 24.0,
            n: 24,
        }
    }
}

impl TimeGrid {
    pub fn new(start: f64, stop: f64, n: usize) -> Self {
        Self { start, stop, n }
    }

    /// The grid points; a single point grid holds only `start`
    pub fn times(&self) -> Result<Vec<f64>, ForecastError> {
        if !(self.start >= 0.0) || !(self.start < self.stop) || self.n < 1 {
            return Err(ForecastError::invalid(format!(
                "invalid time grid: start {}, stop {}, {} points",
                self.start, self.stop, self.n
            )));
        }
        if self.n == 1 {
            return Ok(vec![self.start]);
        }
        let step = (self.stop - self.start) / (self.n - 1) as f64;
        Ok((0..self.n).map(|j| self.start + j as f64 * step).collect())
    }
}

/// A predicted concentration-time curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub times: Vec<f64>,
    pub concentrations: Vec<f64>,
}
