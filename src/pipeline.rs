//! Population fit: robust inlier selection followed by kernel training

use rand::Rng;
use std::path::Path;

use crate::data::parser::read_database;
use crate::data::Data;
use crate::error::ForecastError;
use crate::model::RegressionModel;
use crate::ransac::{self, RobustFit};
use crate::settings::Settings;

/// The result of [fit_population]
#[derive(Debug, Clone)]
pub struct PopulationFit {
    /// The robust decay fit that selected the support set
    pub robust: RobustFit,
    /// The kernel model trained on the inliers
    pub model: RegressionModel,
}

/// Fit a [RegressionModel] to every measurement in `data`
///
/// Measurements rejected by the robust fitter are dropped; the remaining ones
/// become the support set and define the normalization constants.
pub fn fit_population<R: Rng + ?Sized>(
    data: &Data,
    settings: &Settings,
    rng: &mut R,
) -> Result<PopulationFit, ForecastError> {
    let samples = data.samples();
    let times: Vec<f64> = samples.iter().map(|s| s.time).collect();
    let concentrations: Vec<f64> = samples.iter().map(|s| s.concentration).collect();

    let robust = ransac::fit(&times, &concentrations, &settings.ransac, rng)?;
    if robust.n_inliers() < samples.len() {
        tracing::info!(
            "Dropping {} outlying measurements",
            samples.len() - robust.n_inliers()
        );
    }

    let rows = data.covariate_rows();
    let model =
        RegressionModel::train_subset(&rows, &concentrations, &robust.inliers, settings.kernel)?;

    Ok(PopulationFit { robust, model })
}

/// [fit_population] with the random source described by `settings.ransac`
pub fn fit_population_seeded(
    data: &Data,
    settings: &Settings,
) -> Result<PopulationFit, ForecastError> {
    fit_population(data, settings, &mut settings.ransac.rng())
}

/// Load settings from `path`, or the defaults when no file is given
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ForecastError> {
    match path {
        Some(path) => Ok(Settings::from_file(path)?),
        None => Ok(Settings::default()),
    }
}

/// Read a training database from disk and fit it with [fit_population_seeded]
pub fn fit_database(
    path: impl AsRef<Path>,
    settings: &Settings,
) -> Result<(Data, PopulationFit), ForecastError> {
    let data = read_database(path)?;
    tracing::info!(
        "Training database: {} patients, {} samples",
        data.len(),
        data.n_samples()
    );
    let fit = fit_population_seeded(&data, settings)?;
    Ok((data, fit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser::ParseError;
    use crate::ransac::RansacOptions;
    use crate::settings::SettingsError;

    #[test]
    fn test_load_settings() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
        assert!(matches!(
            load_settings(Some(Path::new("/nonexistent/settings.json"))),
            Err(ForecastError::Settings(SettingsError::Io { .. }))
        ));
    }

    #[test]
    fn test_fit_database() {
        let records = "\
            1 1250 1 400 0 40 70\n\
            1 1300 2 400 0 40 70\n\
            1 1280 4 400 0 40 70\n\
            1 1070 8 400 0 40 70\n\
            2 1240 1 400 1 62 85\n\
            2 1330 2 400 1 62 85\n\
            2 1100 8 400 1 62 85\n\
            2 700 24 400 1 62 85\n";
        let path = std::env::temp_dir().join(format!("pkforecast_fit_{}.txt", std::process::id()));
        std::fs::write(&path, records).unwrap();

        let settings = Settings::default()
            .with_ransac(RansacOptions::default().with_trials(1_000).with_seed(2));
        let result = fit_database(&path, &settings);
        std::fs::remove_file(&path).unwrap();

        let (data, fit) = result.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(fit.model.n_support(), fit.robust.n_inliers());
    }

    #[test]
    fn test_fit_database_reports_parse_errors() {
        assert!(matches!(
            fit_database("/nonexistent/train.txt", &Settings::default()),
            Err(ForecastError::Parse(ParseError::CSVError(_)))
        ));
    }
}
