use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::covariate::CovariateRow;

/// One clinical measurement together with the covariates of the patient it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time since dose
    pub time: f64,
    /// Measured drug concentration
    pub concentration: f64,
    /// Administered dose
    pub dose: f64,
    pub sex: f64,
    pub age: f64,
    pub weight: f64,
}

impl Sample {
    /// The covariate row `[time, dose, sex, age, weight]` for this measurement
    pub fn covariates(&self) -> CovariateRow {
        CovariateRow::new(self.time, self.dose, self.sex, self.age, self.weight)
    }
}

/// A single measurement as stored on a [Patient]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub time: f64,
    pub concentration: f64,
    pub dose: f64,
}

/// Demographic covariates shared by every measurement of a patient
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub sex: f64,
    pub age: f64,
    pub weight: f64,
}

/// A patient: an identifier, its demographics and the measurements recorded for it
///
/// Measurements keep the order in which they were read, which is not necessarily
/// chronological.
///
/// # Examples
///
/// ```
/// use pkforecast::*;
///
/// let patient = Patient::builder("17")
///     .demographics(1.0, 54.0, 72.5)
///     .measurement(2.0, 1450.0, 400.0)
///     .measurement(12.0, 820.0, 400.0)
///     .build();
///
/// assert_eq!(patient.len(), 2);
/// assert_eq!(patient.samples()[1].weight, 72.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    id: String,
    demographics: Demographics,
    measurements: Vec<Measurement>,
}

impl Patient {
    pub fn new(
        id: impl Into<String>,
        demographics: Demographics,
        measurements: Vec<Measurement>,
    ) -> Self {
        Patient {
            id: id.into(),
            demographics,
            measurements,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn demographics(&self) -> Demographics {
        self.demographics
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Number of measurements
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub(crate) fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    /// Expand the measurements into full [Sample]s carrying the patient's demographics
    pub fn samples(&self) -> Vec<Sample> {
        let d = self.demographics;
        self.measurements
            .iter()
            .map(|m| Sample {
                time: m.time,
                concentration: m.concentration,
                dose: m.dose,
                sex: d.sex,
                age: d.age,
                weight: d.weight,
            })
            .collect()
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.demographics;
        writeln!(
            f,
            "Patient {}: sex {}, age {}, weight {}",
            self.id, d.sex, d.age, d.weight
        )?;
        let join = |values: Vec<String>| values.join(" ");
        writeln!(
            f,
            "    concentrations: {}",
            join(self.measurements.iter().map(|m| m.concentration.to_string()).collect())
        )?;
        writeln!(
            f,
            "    times: {}",
            join(self.measurements.iter().map(|m| m.time.to_string()).collect())
        )?;
        write!(
            f,
            "    doses: {}",
            join(self.measurements.iter().map(|m| m.dose.to_string()).collect())
        )
    }
}

/// An ordered collection of [Patient]s, as produced by the record reader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Data {
    patients: Vec<Patient>,
}

impl Data {
    pub fn new(patients: Vec<Patient>) -> Self {
        Data { patients }
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn add_patient(&mut self, patient: Patient) {
        self.patients.push(patient);
    }

    pub fn get_patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id() == id)
    }

    /// Number of patients
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Total number of measurements over all patients
    pub fn n_samples(&self) -> usize {
        self.patients.iter().map(Patient::len).sum()
    }

    /// All samples, patient by patient, in ingestion order
    pub fn samples(&self) -> Vec<Sample> {
        self.patients.iter().flat_map(|p| p.samples()).collect()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples().iter().map(|s| s.time).collect()
    }

    pub fn concentrations(&self) -> Vec<f64> {
        self.samples().iter().map(|s| s.concentration).collect()
    }

    /// Covariate rows aligned with [Data::samples]
    pub fn covariate_rows(&self) -> Vec<CovariateRow> {
        self.samples().iter().map(Sample::covariates).collect()
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for patient in &self.patients {
            writeln!(f, "{}", patient)?;
        }
        Ok(())
    }
}
