use serde::{Deserialize, Serialize};

use crate::common::Modality;
use crate::error::PredictionError;

/// Fixed-length, ordered features for one modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    modality: Modality,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(modality: Modality, values: Vec<f32>) -> Result<Self, PredictionError> {
        if values.len() != modality.feature_len() {
            return Err(PredictionError::InvalidRegion {
                modality,
                reason: format!(
                    "expected {} features, extracted {}",
                    modality.feature_len(),
                    values.len()
                ),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(PredictionError::InvalidRegion {
                modality,
                reason: format!("feature {index} is not finite"),
            });
        }
        Ok(Self { modality, values })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
