use serde::{Deserialize, Serialize};

use crate::common::Modality;
use crate::error::{ModelError, PredictionError};
use crate::pipeline::types::{FeatureVector, ModalityScore};

const MIN_SCALE: f32 = 1e-6;

/// Standardized logistic regression parameters for one modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerParams {
    pub modality: Modality,
    pub feature_means: Vec<f32>,
    pub feature_scales: Vec<f32>,
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl ScorerParams {
    /// An untrained scorer that returns 0.5 for every input.
    pub fn neutral(modality: Modality) -> Self {
        let len = modality.feature_len();
        Self {
            modality,
            feature_means: vec![0.0; len],
            feature_scales: vec![1.0; len],
            weights: vec![0.0; len],
            bias: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let len = self.modality.feature_len();
        for (name, values) in [
            ("feature_means", &self.feature_means),
            ("feature_scales", &self.feature_scales),
            ("weights", &self.weights),
        ] {
            if values.len() != len {
                return Err(ModelError::InvalidParameters(format!(
                    "{} scorer has {} {name}, expected {len}",
                    self.modality,
                    values.len()
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::InvalidParameters(format!(
                    "{} scorer has non-finite {name}",
                    self.modality
                )));
            }
        }
        if self.feature_scales.iter().any(|s| *s < MIN_SCALE) {
            return Err(ModelError::InvalidParameters(format!(
                "{} scorer has a feature scale below {MIN_SCALE}",
                self.modality
            )));
        }
        if !self.bias.is_finite() {
            return Err(ModelError::InvalidParameters(format!(
                "{} scorer has a non-finite bias",
                self.modality
            )));
        }
        Ok(())
    }

    /// Log-odds of anemia for a raw (unstandardized) feature slice.
    pub fn logit(&self, features: &[f32]) -> f32 {
        features
            .iter()
            .zip(&self.feature_means)
            .zip(&self.feature_scales)
            .zip(&self.weights)
            .map(|(((x, mean), scale), w)| w * (x - mean) / scale)
            .sum::<f32>()
            + self.bias
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Independently trained scorer parameters, one slot per modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityScorers {
    pub eye: ScorerParams,
    pub forniceal: ScorerParams,
    pub palpebral: ScorerParams,
    pub forniceal_palpebral: ScorerParams,
}

impl ModalityScorers {
    pub fn get(&self, modality: Modality) -> &ScorerParams {
        match modality {
            Modality::Eye => &self.eye,
            Modality::Forniceal => &self.forniceal,
            Modality::Palpebral => &self.palpebral,
            Modality::FornicealPalpebral => &self.forniceal_palpebral,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for modality in Modality::ALL {
            let params = self.get(modality);
            if params.modality != modality {
                return Err(ModelError::InvalidParameters(format!(
                    "{modality} slot holds a {} scorer",
                    params.modality
                )));
            }
            params.validate()?;
        }
        Ok(())
    }
}

/// Pure mapping from a feature vector to that modality's anemia probability.
#[derive(Debug, Clone, Copy)]
pub struct ModalityScorer<'a> {
    scorers: &'a ModalityScorers,
}

impl<'a> ModalityScorer<'a> {
    pub fn new(scorers: &'a ModalityScorers) -> Self {
        Self { scorers }
    }

    pub fn score(&self, features: &FeatureVector) -> Result<ModalityScore, PredictionError> {
        let modality = features.modality();
        let params = self.scorers.get(modality);
        if params.weights.len() != features.len() {
            return Err(PredictionError::InvalidScore {
                modality,
                reason: format!(
                    "scorer expects {} features, got {}",
                    params.weights.len(),
                    features.len()
                ),
            });
        }
        let logit = params.logit(features.values());
        ModalityScore::new(modality, sigmoid(logit))
    }
}
