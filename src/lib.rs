//! Concentration-time forecasting from sparse clinical measurements.
//!
//! The crate fits a population model in three stages:
//!
//! 1. [ransac::fit] fits a three-parameter decay curve to all measurements and
//!    keeps the inliers,
//! 2. [NormalizationConstants] standardize the covariates `[time, dose, sex, age, weight]`
//!    of those inliers,
//! 3. [RegressionModel] trains a Gaussian-kernel ridge regressor on them.
//!
//! The trained model predicts concentrations for new covariate rows and can be
//! refreshed online with [RegressionModel::update], which swaps the least
//! consistent support sample for a new measurement.
//!
//! ```rust
//! use pkforecast::prelude::*;
//!
//! let patients: Vec<Patient> = (0..6)
//!     .map(|i| {
//!         let scale = 1.0 + 0.1 * i as f64;
//!         Patient::builder(i.to_string())
//!             .demographics((i % 2) as f64, 40.0 + 4.0 * i as f64, 60.0 + 5.0 * i as f64)
//!             .measurement(1.0, 1500.0 * scale, 400.0)
//!             .measurement(4.0, 1100.0 * scale, 400.0)
//!             .measurement(12.0, 600.0 * scale, 400.0)
//!             .measurement(24.0, 250.0 * scale, 400.0)
//!             .build()
//!     })
//!     .collect();
//! let data = Data::new(patients);
//!
//! let settings = Settings::default()
//!     .with_ransac(RansacOptions::default().with_trials(2_000).with_seed(3));
//! let fit = fit_population_seeded(&data, &settings).unwrap();
//!
//! let curve = fit
//!     .model
//!     .predict_curve(data.patients()[0].demographics(), 400.0, &settings.curve)
//!     .unwrap();
//! assert_eq!(curve.concentrations.len(), 24);
//! ```

pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod ransac;
pub mod settings;

//extension traits
pub use crate::data::builder::PatientBuilderExt;
pub use crate::data::*;
pub use crate::model::{
    Curve, KernelParams, NormalizationConstants, RegressionModel, Replacement, TimeGrid,
};
pub use crate::pipeline::{
    fit_database, fit_population, fit_population_seeded, load_settings, PopulationFit,
};
pub use crate::ransac::{RansacOptions, RobustFit};
pub use crate::settings::Settings;
pub use error::ForecastError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{
            parser::{from_reader, read_database},
            CovariateRow, Data, Demographics, Measurement, Patient, Sample,
        };
    }
    pub mod model {
        pub use crate::model::{
            kernel, Curve, KernelParams, NormalizationConstants, RegressionModel, Replacement,
            TimeGrid,
        };
        pub use crate::ransac::{fit as fit_robust, RansacOptions, RobustFit};
    }

    //extension traits
    pub use crate::data::builder::PatientBuilderExt;
    pub use crate::data::*;
    pub use crate::model::{Curve, KernelParams, NormalizationConstants, RegressionModel, TimeGrid};
    pub use crate::pipeline::{
        fit_database, fit_population, fit_population_seeded, load_settings, PopulationFit,
    };
    pub use crate::ransac::{RansacOptions, RobustFit};
    pub use crate::settings::Settings;
    pub use crate::ForecastError;
}
