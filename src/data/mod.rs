pub mod builder;
pub mod covariate;
pub mod parser;
pub mod structs;
pub use covariate::{CovariateRow, N_COVARIATES};
pub use structs::{Data, Demographics, Measurement, Patient, Sample};
