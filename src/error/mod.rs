use thiserror::Error;

use crate::data::parser::ParseError;
use crate::settings::SettingsError;

#[derive(Error, Debug, Clone)]
pub enum ForecastError {
    /// Inputs violate a precondition (non-positive times, mismatched shapes, ...)
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The robust fitter found no inliers in any trial
    #[error("Robust fit is degenerate: no inliers found in {trials} trials")]
    DegenerateFit { trials: usize },

    /// A numerical routine produced a result that cannot be trusted
    #[error("Numerical instability: {reason}")]
    NumericInstability { reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl ForecastError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ForecastError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn unstable(reason: impl Into<String>) -> Self {
        ForecastError::NumericInstability {
            reason: reason.into(),
        }
    }
}
