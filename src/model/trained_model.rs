use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Modality;
use crate::error::ModelError;
use crate::pipeline::services::fusion::{CalibrationParams, EnsembleFusion, FusionParams};
use crate::pipeline::services::scoring::{ModalityScorer, ModalityScorers};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub samples_per_class: usize,
    /// Held-out accuracy per modality, in canonical modality order.
    pub validation_accuracy: Vec<(Modality, f32)>,
}

/// Parameters for every scorer plus the fusion and calibration constants.
/// Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    scorers: ModalityScorers,
    fusion: FusionParams,
    calibration: CalibrationParams,
    metadata: ModelMetadata,
}

impl TrainedModel {
    pub fn new(
        scorers: ModalityScorers,
        fusion: FusionParams,
        calibration: CalibrationParams,
        metadata: ModelMetadata,
    ) -> Result<Self, ModelError> {
        let model = Self {
            scorers,
            fusion,
            calibration,
            metadata,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.scorers.validate()?;
        self.fusion.validate()?;
        self.calibration.validate()
    }

    pub fn scorers(&self) -> &ModalityScorers {
        &self.scorers
    }

    pub fn fusion_params(&self) -> &FusionParams {
        &self.fusion
    }

    pub fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn scorer(&self) -> ModalityScorer<'_> {
        ModalityScorer::new(&self.scorers)
    }

    pub fn fusion(&self) -> EnsembleFusion<'_> {
        EnsembleFusion::new(&self.fusion, &self.calibration)
    }
}
