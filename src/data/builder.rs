use crate::data::*;

pub trait PatientBuilderExt {
    fn builder(id: impl Into<String>) -> PatientBuilder;
}

impl PatientBuilderExt for Patient {
    fn builder(id: impl Into<String>) -> PatientBuilder {
        PatientBuilder::new(id)
    }
}

pub struct PatientBuilder {
    id: String,
    demographics: Demographics,
    measurements: Vec<Measurement>,
}

impl PatientBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        PatientBuilder {
            id: id.into(),
            demographics: Demographics::default(),
            measurements: Vec::new(),
        }
    }

    pub fn demographics(mut self, sex: f64, age: f64, weight: f64) -> Self {
        self.demographics = Demographics { sex, age, weight };
        self
    }

    pub fn measurement(mut self, time: f64, concentration: f64, dose: f64) -> Self {
        self.measurements.push(Measurement {
            time,
            concentration,
            dose,
        });
        self
    }

    /// Add one measurement per concentration, `delta` apart after the last one and with its dose
    ///
    /// # Panics
    ///
    /// Panics if no measurement has been added yet.
    pub fn repeat(mut self, concentrations: &[f64], delta: f64) -> Self {
        let last = match self.measurements.last() {
            Some(m) => *m,
            None => panic!("There is no measurement to repeat"),
        };
        for (i, &c) in concentrations.iter().enumerate() {
            self = self.measurement(last.time + delta * (i + 1) as f64, c, last.dose);
        }
        self
    }

    pub fn build(self) -> Patient {
        Patient::new(self.id, self.demographics, self.measurements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat() {
        let patient = Patient::builder("a")
            .measurement(1.0, 10.0, 200.0)
            .repeat(&[8.0, 6.0], 2.0)
            .build();
        let times: Vec<f64> = patient.measurements().iter().map(|m| m.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
        assert!(patient.measurements().iter().all(|m| m.dose == 200.0));
    }

    #[test]
    #[should_panic(expected = "no measurement to repeat")]
    fn test_repeat_without_measurement() {
        let _ = Patient::builder("a").repeat(&[1.0], 1.0);
    }
}
