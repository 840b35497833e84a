use serde::{Deserialize, Serialize};

use crate::common::Modality;
use crate::error::PredictionError;

/// Anemia likelihood in [0, 1] produced by one modality's scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityScore {
    modality: Modality,
    probability: f32,
}

impl ModalityScore {
    /// NaN and out-of-range probabilities are rejected, never clamped.
    pub fn new(modality: Modality, probability: f32) -> Result<Self, PredictionError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(PredictionError::InvalidScore {
                modality,
                reason: format!("probability {probability} is outside [0, 1]"),
            });
        }
        Ok(Self {
            modality,
            probability,
        })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nan_and_out_of_range() {
        assert!(ModalityScore::new(Modality::Eye, f32::NAN).is_err());
        assert!(ModalityScore::new(Modality::Eye, 1.01).is_err());
        assert!(ModalityScore::new(Modality::Eye, -0.01).is_err());
        assert!(ModalityScore::new(Modality::Eye, 0.0).is_ok());
        assert!(ModalityScore::new(Modality::Eye, 1.0).is_ok());
    }
}
