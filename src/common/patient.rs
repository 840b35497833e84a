use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

pub const MAX_AGE: u8 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Child,
}

/// Demographic prior applied at the fusion stage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    gender: Gender,
    age: u8,
}

impl PatientContext {
    pub fn new(gender: Gender, age: u8) -> Result<Self, PredictionError> {
        if age == 0 || age > MAX_AGE {
            return Err(PredictionError::InvalidPatientContext(format!(
                "age must be between 1 and {MAX_AGE}, got {age}"
            )));
        }
        Ok(Self { gender, age })
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn age(&self) -> u8 {
        self.age
    }
}

impl Default for PatientContext {
    fn default() -> Self {
        Self {
            gender: Gender::Female,
            age: 30,
        }
    }
}
