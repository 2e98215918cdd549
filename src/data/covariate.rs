//! Fixed-order covariate rows used for both training and prediction.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of covariate columns
pub const N_COVARIATES: usize = 5;

/// Column positions inside a [CovariateRow]
pub mod column {
    pub const TIME: usize = 0;
    pub const DOSE: usize = 1;
    pub const SEX: usize = 2;
    pub const AGE: usize = 3;
    pub const WEIGHT: usize = 4;
}

/// `[time, dose, sex, age, weight]` for a single measurement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CovariateRow([f64; N_COVARIATES]);

impl CovariateRow {
    pub fn new(time: f64, dose: f64, sex: f64, age: f64, weight: f64) -> Self {
        CovariateRow([time, dose, sex, age, weight])
    }

    pub fn time(&self) -> f64 {
        self.0[column::TIME]
    }

    pub fn dose(&self) -> f64 {
        self.0[column::DOSE]
    }

    pub fn sex(&self) -> f64 {
        self.0[column::SEX]
    }

    pub fn age(&self) -> f64 {
        self.0[column::AGE]
    }

    pub fn weight(&self) -> f64 {
        self.0[column::WEIGHT]
    }

    pub fn as_array(&self) -> &[f64; N_COVARIATES] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
}

impl From<[f64; N_COVARIATES]> for CovariateRow {
    fn from(values: [f64; N_COVARIATES]) -> Self {
        CovariateRow(values)
    }
}

impl Index<usize> for CovariateRow {
    type Output = f64;

    fn index(&self, column: usize) -> &f64 {
        &self.0[column]
    }
}

impl IndexMut<usize> for CovariateRow {
    fn index_mut(&mut self, column: usize) -> &mut f64 {
        &mut self.0[column]
    }
}

/// Stack rows into an `n x 5` matrix
pub fn to_matrix(rows: &[CovariateRow]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), N_COVARIATES, |i, j| rows[i][j])
}

/// Read row `i` of an `n x 5` matrix back into a [CovariateRow]
pub fn row_of(matrix: &DMatrix<f64>, i: usize) -> CovariateRow {
    let mut row = CovariateRow::default();
    for j in 0..N_COVARIATES {
        row[j] = matrix[(i, j)];
    }
    row
}
