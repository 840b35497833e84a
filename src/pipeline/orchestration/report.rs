use crate::common::Modality;
use crate::error::PredictionError;
use crate::pipeline::context::StageMetrics;
use crate::pipeline::types::{ModalityScore, PredictionResult};

/// A supplied image that was excluded from fusion.
#[derive(Debug)]
pub struct ModalityFailure {
    pub modality: Modality,
    pub error: PredictionError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalityTiming {
    pub modality: Modality,
    pub metrics: StageMetrics,
}

/// Everything one prediction produced, in canonical modality order.
#[derive(Debug)]
pub struct PredictionReport {
    pub request_id: uuid::Uuid,
    pub result: PredictionResult,
    pub scores: Vec<ModalityScore>,
    pub failures: Vec<ModalityFailure>,
    /// Fused probability before demographic calibration.
    pub image_probability: f32,
    pub demographic_shift: f32,
    pub timings: Vec<ModalityTiming>,
}

impl PredictionReport {
    pub fn score(&self, modality: Modality) -> Option<ModalityScore> {
        self.scores.iter().copied().find(|s| s.modality() == modality)
    }

    pub fn failure(&self, modality: Modality) -> Option<&PredictionError> {
        self.failures
            .iter()
            .find(|f| f.modality == modality)
            .map(|f| &f.error)
    }
}
