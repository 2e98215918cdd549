//! Online maintenance of the support set
//!
//! When a new measurement arrives, the model re-evaluates every support row at
//! the new measurement's time. The concentrations predicted there and the new
//! measured concentration are standardized together, and each support row gets
//! a distance to the new sample made of that standardized concentration gap plus
//! the gaps in the four non-time covariates. The row furthest from the new
//! sample is evicted and replaced, and the model is retrained. The number of
//! support rows never changes.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::data::covariate::column;
use crate::data::{Patient, Sample, N_COVARIATES};
use crate::error::ForecastError;

use super::{kernel, KernelParams, RegressionModel};

/// What a call to [RegressionModel::update] replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    /// Index of the evicted support row
    pub index: usize,
    /// Distance of the evicted row to the new sample
    pub distance: f64,
    /// Concentration label the evicted row carried
    pub previous_target: f64,
    /// Distance of every support row to the new sample, before the replacement
    pub distances: Vec<f64>,
}

impl RegressionModel {
    /// Distance of each support row to `sample`
    ///
    /// This is the quantity [RegressionModel::update] maximizes; the model is not
    /// modified.
    pub fn replacement_distances(&self, sample: &Sample) -> Result<Vec<f64>, ForecastError> {
        let raw = sample.covariates();
        if raw.iter().any(|v| !v.is_finite()) || !sample.concentration.is_finite() {
            return Err(ForecastError::invalid(format!(
                "sample contains non-finite values: {:?}",
                sample
            )));
        }
        if !(sample.time > 0.0) {
            return Err(ForecastError::invalid(format!(
                "sample time {} is not strictly positive",
                sample.time
            )));
        }
        let x = self.constants.apply(&raw);

        let query = self.support_at_time(x.time());
        let comparison = self.predict_normalized(&query)?;

        let (mean, std) = joint_moments(sample.concentration, &comparison);
        let conc = (sample.concentration - mean) / std;

        let distances = comparison
            .iter()
            .enumerate()
            .map(|(i, predicted)| {
                let dc = (predicted - mean) / std - conc;
                let covariates: f64 = (column::DOSE..N_COVARIATES)
                    .map(|j| (self.support[(i, j)] - x[j]).powi(2))
                    .sum();
                dc * dc + covariates
            })
            .collect();
        Ok(distances)
    }

    /// Replace the support row least consistent with `sample` and retrain
    ///
    /// The model's current `C` and sigma are reused. If retraining fails the
    /// model is left exactly as it was.
    pub fn update(&mut self, sample: &Sample) -> Result<Replacement, ForecastError> {
        let distances = self.replacement_distances(sample)?;

        // First maximum wins
        let (index, distance) = distances.iter().copied().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |best, (i, d)| if d > best.1 { (i, d) } else { best },
        );

        let x = self.constants.apply(&sample.covariates());
        let mut support = self.support.clone();
        for j in 0..N_COVARIATES {
            support[(index, j)] = x[j];
        }
        let mut targets: DVector<f64> = self.targets.clone();
        let previous_target = targets[index];
        targets[index] = sample.concentration;

        let trained = kernel::train(&support, &targets, KernelParams::new(self.c, self.sigma))?;

        self.support = support;
        self.targets = targets;
        self.alpha = trained.alpha;
        self.c = trained.c;
        self.sigma = trained.sigma;

        tracing::info!(
            "Replaced support sample {} (distance {:.4}, concentration {} -> {})",
            index,
            distance,
            previous_target,
            sample.concentration
        );

        Ok(Replacement {
            index,
            distance,
            previous_target,
            distances,
        })
    }

    /// Feed every measurement of `patient` to [RegressionModel::update], in order
    pub fn update_patient(&mut self, patient: &Patient) -> Result<Vec<Replacement>, ForecastError> {
        patient
            .samples()
            .iter()
            .map(|sample| self.update(sample))
            .collect()
    }
}

/// Mean and population std of `first` together with `rest`; a zero std becomes 1
fn joint_moments(first: f64, rest: &DVector<f64>) -> (f64, f64) {
    if rest.iter().all(|&v| v == first) {
        return (first, 1.0);
    }
    let n = (rest.len() + 1) as f64;
    let mean = (first + rest.sum()) / n;
    let var = ((first - mean).powi(2) + rest.iter().map(|v| (v - mean).powi(2)).sum::<f64>()) / n;
    let std = var.sqrt();
    (mean, if std > 0.0 { std } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::builder::PatientBuilder;
    use crate::data::CovariateRow;
    use approx::assert_relative_eq;

    fn model() -> RegressionModel {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for (p, (sex, age, weight)) in [(0.0, 30.0, 60.0), (1.0, 50.0, 75.0), (0.0, 65.0, 90.0)]
            .into_iter()
            .enumerate()
        {
            for t in [2.0, 6.0, 12.0, 24.0] {
                let dose = 400.0 + 100.0 * p as f64;
                rows.push(CovariateRow::new(t, dose, sex, age, weight));
                targets.push(dose * 3.0 * (-0.08 * t).exp());
            }
        }
        RegressionModel::train(&rows, &targets, KernelParams::new(100.0, 3.0)).unwrap()
    }

    fn sample(time: f64, concentration: f64, dose: f64, sex: f64, age: f64, weight: f64) -> Sample {
        Sample {
            time,
            concentration,
            dose,
            sex,
            age,
            weight,
        }
    }

    #[test]
    fn test_joint_moments() {
        let (mean, std) = joint_moments(4.0, &DVector::from_vec(vec![2.0, 6.0, 4.0]));
        assert_relative_eq!(mean, 4.0);
        assert_relative_eq!(std, 2.0_f64.sqrt());

        let (_, std) = joint_moments(1.0, &DVector::from_vec(vec![1.0, 1.0]));
        assert_eq!(std, 1.0);

        let (mean, std) = joint_moments(40.1, &DVector::from_element(9, 40.1));
        assert_eq!(mean, 40.1);
        assert_eq!(std, 1.0);
    }

    #[test]
    fn test_far_sample_evicts_the_maximum_distance_row() {
        let mut model = model();
        let far = sample(8.0, 5000.0, 900.0, 1.0, 95.0, 140.0);

        let before = model.replacement_distances(&far).unwrap();
        let replacement = model.update(&far).unwrap();

        let max = before.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(replacement.distance, max);
        assert_eq!(before[replacement.index], max);
        assert_eq!(replacement.distances, before);
    }

    #[test]
    fn test_update_overwrites_row_and_keeps_shapes() {
        let mut model = model();
        let n = model.n_support();
        let new = sample(3.0, 1234.0, 450.0, 1.0, 40.0, 70.0);

        let replacement = model.update(&new).unwrap();

        assert_eq!(model.n_support(), n);
        assert_eq!(model.targets().len(), n);
        assert_eq!(model.alpha().len(), n);
        assert_eq!(model.targets()[replacement.index], 1234.0);

        let stored = model.constants().invert(&model.support_row(replacement.index));
        for (got, want) in stored.iter().zip(new.covariates().iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_update_reuses_hyperparameters_and_constants() {
        let mut model = model();
        let constants = *model.constants();
        model
            .update(&sample(5.0, 800.0, 500.0, 0.0, 45.0, 70.0))
            .unwrap();
        assert_eq!(model.c(), 100.0);
        assert_eq!(model.sigma(), 3.0);
        assert_eq!(model.constants(), &constants);
    }

    #[test]
    fn test_update_retrains_alpha() {
        let mut model = model();
        let new = sample(5.0, 800.0, 500.0, 0.0, 45.0, 70.0);
        model.update(&new).unwrap();

        let fresh = kernel::train(
            model.support(),
            model.targets(),
            KernelParams::new(model.c(), model.sigma()),
        )
        .unwrap();
        assert_eq!(model.alpha(), &fresh.alpha);
    }

    #[test]
    fn test_update_patient_applies_each_sample() {
        let mut model = model();
        let patient = PatientBuilder::new("new")
            .demographics(1.0, 58.0, 77.0)
            .measurement(2.0, 1500.0, 500.0)
            .measurement(10.0, 900.0, 500.0)
            .measurement(20.0, 400.0, 500.0)
            .build();
        let replacements = model.update_patient(&patient).unwrap();
        assert_eq!(replacements.len(), 3);
        assert_eq!(model.n_support(), 12);
    }

    #[test]
    fn test_invalid_sample_leaves_model_untouched() {
        let mut model = model();
        let targets = model.targets().clone();
        let err = model.update(&sample(0.0, 100.0, 400.0, 0.0, 30.0, 60.0));
        assert!(matches!(err, Err(ForecastError::InvalidInput { .. })));
        let err = model.update(&sample(2.0, f64::NAN, 400.0, 0.0, 30.0, 60.0));
        assert!(matches!(err, Err(ForecastError::InvalidInput { .. })));
        assert_eq!(model.targets(), &targets);
    }
}
