use serde::{Deserialize, Serialize};

use crate::common::{Gender, PatientContext};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    /// Inclusive upper age bound for this band.
    pub max_age: u8,
    pub shift: f32,
}

/// Demographic prior shifts applied to the fused probability.
///
/// Anemia cutoffs differ by population: children accept lower hemoglobin,
/// adult men have the highest cutoff, and prevalence rises in the elderly.
/// The combined shift is clamped to `[-cap / 2, cap / 2]`, so two contexts
/// can never move the same image evidence further apart than `cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub male_shift: f32,
    pub female_shift: f32,
    pub child_shift: f32,
    /// Sorted by `max_age`; ages above the last band get no age shift.
    pub age_bands: Vec<AgeBand>,
    pub cap: f32,
}

impl CalibrationParams {
    pub fn with_cap(cap: f32) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.cap.is_finite() || !(0.0..=0.5).contains(&self.cap) {
            return Err(ModelError::InvalidParameters(format!(
                "calibration cap {} is outside [0, 0.5]",
                self.cap
            )));
        }
        let shifts = [self.male_shift, self.female_shift, self.child_shift]
            .into_iter()
            .chain(self.age_bands.iter().map(|b| b.shift));
        for shift in shifts {
            if !shift.is_finite() {
                return Err(ModelError::InvalidParameters(
                    "calibration shift is not finite".to_string(),
                ));
            }
        }
        if self
            .age_bands
            .windows(2)
            .any(|pair| pair[0].max_age >= pair[1].max_age)
        {
            return Err(ModelError::InvalidParameters(
                "age bands must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            male_shift: 0.03,
            female_shift: 0.0,
            child_shift: -0.02,
            age_bands: vec![
                AgeBand {
                    max_age: 4,
                    shift: -0.02,
                },
                AgeBand {
                    max_age: 11,
                    shift: -0.01,
                },
                AgeBand {
                    max_age: 64,
                    shift: 0.0,
                },
                AgeBand {
                    max_age: 120,
                    shift: 0.03,
                },
            ],
            cap: 0.15,
        }
    }
}

pub struct DemographicCalibration<'a> {
    params: &'a CalibrationParams,
}

impl<'a> DemographicCalibration<'a> {
    pub fn new(params: &'a CalibrationParams) -> Self {
        Self { params }
    }

    /// Bounded shift for this patient, in probability units.
    pub fn shift(&self, context: &PatientContext) -> f32 {
        let gender_shift = match context.gender() {
            Gender::Male => self.params.male_shift,
            Gender::Female => self.params.female_shift,
            Gender::Child => self.params.child_shift,
        };
        let age_shift = self
            .params
            .age_bands
            .iter()
            .find(|band| context.age() <= band.max_age)
            .map(|band| band.shift)
            .unwrap_or(0.0);

        let half_cap = self.params.cap / 2.0;
        (gender_shift + age_shift).clamp(-half_cap, half_cap)
    }

    pub fn apply(&self, probability: f32, context: &PatientContext) -> (f32, f32) {
        let shift = self.shift(context);
        ((probability + shift).clamp(0.0, 1.0), shift)
    }
}
