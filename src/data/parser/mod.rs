//! Reader for whitespace-separated measurement records.
//!
//! Each line holds one measurement:
//!
//! ```text
//! ID  CONCENTRATION  TIME  DOSE  SEX  AGE  WEIGHT
//! ```
//!
//! Consecutive lines sharing an ID form one [Patient]. The demographics of a
//! patient are taken from its first line. Lines starting with `#` are comments.

use serde::Deserialize;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::data::*;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Error encountered when reading the underlying file
    #[error("CSV error: {0}")]
    CSVError(String),
    /// A record could not be turned into a measurement
    #[error("Malformed record on line {line}: {reason}")]
    Record { line: u64, reason: String },
}

/// Read a measurement file from disk
///
/// # Example
///
/// ```rust,no_run
/// use pkforecast::prelude::data::read_database;
///
/// let data = read_database("complete_train.txt").unwrap();
/// println!("Number of patients: {}", data.len());
/// ```
pub fn read_database(path: impl AsRef<Path>) -> Result<Data, ParseError> {
    let reader = reader_builder()
        .from_path(path.as_ref())
        .map_err(|e| ParseError::CSVError(e.to_string()))?;
    collect(reader)
}

/// Read measurements from any [io::Read] source
pub fn from_reader<R: io::Read>(source: R) -> Result<Data, ParseError> {
    collect(reader_builder().from_reader(source))
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'));
    builder
}

#[derive(Deserialize, Debug)]
struct Record {
    id: String,
    concentration: f64,
    time: f64,
    dose: f64,
    sex: f64,
    age: f64,
    weight: f64,
}

fn collect<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Data, ParseError> {
    let mut data = Data::default();
    let mut current: Option<Patient> = None;

    for result in reader.records() {
        let raw = result.map_err(|e| ParseError::CSVError(e.to_string()))?;
        let line = raw.position().map(|p| p.line()).unwrap_or_default();

        // Runs of spaces and tabs produce empty or compound fields
        let fields: csv::StringRecord = raw.iter().flat_map(str::split_whitespace).collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 7 {
            return Err(ParseError::Record {
                line,
                reason: format!("expected 7 fields, found {}", fields.len()),
            });
        }
        let record: Record = fields.deserialize(None).map_err(|e| ParseError::Record {
            line,
            reason: e.to_string(),
        })?;

        let measurement = Measurement {
            time: record.time,
            concentration: record.concentration,
            dose: record.dose,
        };

        match current.as_mut() {
            Some(patient) if patient.id() == record.id => {
                let first = patient.demographics();
                if (first.sex, first.age, first.weight) != (record.sex, record.age, record.weight)
                {
                    tracing::warn!(
                        "Line {}: demographics of patient {} differ from its first record",
                        line,
                        record.id
                    );
                }
                patient.push(measurement)
            }
            _ => {
                if let Some(done) = current.take() {
                    data.add_patient(done);
                }
                if data.get_patient(&record.id).is_some() {
                    tracing::warn!(
                        "Line {}: patient {} reappears after other patients, read as a new patient",
                        line,
                        record.id
                    );
                }
                let demographics = Demographics {
                    sex: record.sex,
                    age: record.age,
                    weight: record.weight,
                };
                current = Some(Patient::new(record.id, demographics, vec![measurement]));
            }
        }
    }

    if let Some(done) = current {
        data.add_patient(done);
    }

    tracing::debug!(
        "Read {} patients with {} measurements",
        data.len(),
        data.n_samples()
    );
    Ok(data)
}
