//! Run configuration
//!
//! Every field has a default, so a settings file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "ransac": { "threshold": 250.0, "seed": 11 },
//!   "kernel": { "c": 1.0, "sigma": 1.0 },
//!   "curve": { "start": 0.5, "stop": 48.0, "n": 96 },
//!   "dose": 600.0
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::model::{KernelParams, TimeGrid};
use crate::ransac::RansacOptions;

#[derive(Error, Debug, Clone)]
pub enum SettingsError {
    #[error("Could not read settings file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Invalid settings: {0}")]
    Format(String),
}

/// Settings for a complete fit-and-forecast run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Robust fitter options
    pub ransac: RansacOptions,
    /// Kernel hyperparameters used for the initial training
    pub kernel: KernelParams,
    /// Times at which curves are predicted
    pub curve: TimeGrid,
    /// Dose used for curve prediction
    pub dose: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ransac: RansacOptions::default(),
            kernel: KernelParams::default(),
            curve: TimeGrid::default(),
            dose: 400.0,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(|e| SettingsError::Format(e.to_string()))
    }

    pub fn with_ransac(mut self, ransac: RansacOptions) -> Self {
        self.ransac = ransac;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelParams) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_curve(mut self, curve: TimeGrid) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_dose(mut self, dose: f64) -> Self {
        self.dose = dose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.ransac.threshold, 500.0);
        assert_eq!(s.ransac.subset_size, 4);
        assert_eq!(s.ransac.trials, 100_000);
        assert_eq!(s.kernel, KernelParams::default());
        assert_eq!(s.curve, TimeGrid::new(1.0, 24.0, 24));
        assert_eq!(s.dose, 400.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s = Settings::from_json(
            r#"{ "ransac": { "threshold": 250.0, "seed": 11 }, "kernel": { "c": 1000.0 } }"#,
        )
        .unwrap();
        assert_eq!(s.ransac.threshold, 250.0);
        assert_eq!(s.ransac.seed, Some(11));
        assert_eq!(s.ransac.subset_size, 4);
        assert_eq!(s.kernel.c, Some(1000.0));
        assert_eq!(s.kernel.sigma, None);
        assert_eq!(s.curve, TimeGrid::default());
    }

    #[test]
    fn test_round_trip_through_json() {
        let s = Settings::default()
            .with_dose(600.0)
            .with_curve(TimeGrid::new(0.5, 48.0, 96));
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), s);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Settings::from_json("{ \"dose\": \"lots\" }"),
            Err(SettingsError::Format(_))
        ));
        assert!(matches!(
            Settings::from_file("/nonexistent/settings.json"),
            Err(SettingsError::Io { .. })
        ));
    }
}
