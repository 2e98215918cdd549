use serde::{Deserialize, Serialize};

use crate::data::{CovariateRow, N_COVARIATES};
use crate::error::ForecastError;

/// Per-column `(mean, std)` frozen at training time
///
/// A zero standard deviation is stored as `1`, so a constant column maps to zero
/// after centering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConstants {
    pub means: [f64; N_COVARIATES],
    pub stds: [f64; N_COVARIATES],
}

impl NormalizationConstants {
    /// Compute the constants over every row
    pub fn fit(rows: &[CovariateRow]) -> Result<Self, ForecastError> {
        let indices: Vec<usize> = (0..rows.len()).collect();
        Self::fit_subset(rows, &indices)
    }

    /// Compute the constants over `rows[i]` for each `i` in `indices` only
    pub fn fit_subset(rows: &[CovariateRow], indices: &[usize]) -> Result<Self, ForecastError> {
        if indices.is_empty() {
            return Err(ForecastError::invalid(
                "cannot normalize over an empty set of rows",
            ));
        }
        if let Some(&i) = indices.iter().find(|&&i| i >= rows.len()) {
            return Err(ForecastError::invalid(format!(
                "row index {} out of range for {} rows",
                i,
                rows.len()
            )));
        }

        let n = indices.len() as f64;
        let mut means = [0.0; N_COVARIATES];
        let mut stds = [0.0; N_COVARIATES];
        for j in 0..N_COVARIATES {
            let first = rows[indices[0]][j];
            // Summation round-off would leave a tiny std on a constant column
            if indices.iter().all(|&i| rows[i][j] == first) {
                means[j] = first;
                stds[j] = 1.0;
                tracing::debug!("Feature {} is constant at {}", j, first);
                continue;
            }
            let mean = indices.iter().map(|&i| rows[i][j]).sum::<f64>() / n;
            let var = indices
                .iter()
                .map(|&i| (rows[i][j] - mean).powi(2))
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            means[j] = mean;
            stds[j] = if std > 0.0 { std } else { 1.0 };
            tracing::debug!("Feature {}, mean {}, std {}", j, mean, std);
        }

        Ok(NormalizationConstants { means, stds })
    }

    pub fn apply(&self, row: &CovariateRow) -> CovariateRow {
        let mut out = *row;
        for j in 0..N_COVARIATES {
            out[j] = (row[j] - self.means[j]) / self.stds[j];
        }
        out
    }

    pub fn apply_all(&self, rows: &[CovariateRow]) -> Vec<CovariateRow> {
        rows.iter().map(|r| self.apply(r)).collect()
    }

    /// Map a normalized row back to raw covariate units
    pub fn invert(&self, row: &CovariateRow) -> CovariateRow {
        let mut out = *row;
        for j in 0..N_COVARIATES {
            out[j] = row[j] * self.stds[j] + self.means[j];
        }
        out
    }
}
