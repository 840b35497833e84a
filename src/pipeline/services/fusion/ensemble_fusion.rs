use serde::{Deserialize, Serialize};
use tracing::debug;

use super::demographic_calibration::{CalibrationParams, DemographicCalibration};
use crate::common::{Modality, PatientContext};
use crate::error::{ModelError, PredictionError};
use crate::pipeline::types::{ModalityScore, PredictionResult};

/// Pre-trained reliability weight per modality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityWeights {
    pub eye: f32,
    pub forniceal: f32,
    pub palpebral: f32,
    pub forniceal_palpebral: f32,
}

impl ModalityWeights {
    pub fn uniform() -> Self {
        Self {
            eye: 1.0,
            forniceal: 1.0,
            palpebral: 1.0,
            forniceal_palpebral: 1.0,
        }
    }

    pub fn get(&self, modality: Modality) -> f32 {
        match modality {
            Modality::Eye => self.eye,
            Modality::Forniceal => self.forniceal,
            Modality::Palpebral => self.palpebral,
            Modality::FornicealPalpebral => self.forniceal_palpebral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    pub weights: ModalityWeights,
    pub decision_threshold: f32,
}

impl FusionParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        for modality in Modality::ALL {
            let weight = self.weights.get(modality);
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ModelError::InvalidParameters(format!(
                    "{modality} fusion weight {weight} must be positive"
                )));
            }
        }
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            return Err(ModelError::InvalidParameters(format!(
                "decision threshold {} is outside (0, 1)",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            weights: ModalityWeights::uniform(),
            decision_threshold: 0.5,
        }
    }
}

/// Fused output before it is collapsed into a [`PredictionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusedPrediction {
    pub image_probability: f32,
    pub demographic_shift: f32,
    pub result: PredictionResult,
}

/// Weighted average of the supplied modality scores, renormalized over the
/// modalities present, followed by a bounded demographic shift.
pub struct EnsembleFusion<'a> {
    params: &'a FusionParams,
    calibration: DemographicCalibration<'a>,
}

impl<'a> EnsembleFusion<'a> {
    pub fn new(params: &'a FusionParams, calibration: &'a CalibrationParams) -> Self {
        Self {
            params,
            calibration: DemographicCalibration::new(calibration),
        }
    }

    pub fn fuse(
        &self,
        scores: &[ModalityScore],
        context: &PatientContext,
    ) -> Result<FusedPrediction, PredictionError> {
        if scores.is_empty() {
            return Err(PredictionError::InsufficientEvidence(
                "no modality produced a score".to_string(),
            ));
        }
        for (index, score) in scores.iter().enumerate() {
            if scores[..index]
                .iter()
                .any(|s| s.modality() == score.modality())
            {
                return Err(PredictionError::DuplicateModality(score.modality()));
            }
        }

        let (weighted, total_weight) =
            scores
                .iter()
                .fold((0.0f32, 0.0f32), |(weighted, total), score| {
                    let weight = self.params.weights.get(score.modality());
                    (weighted + weight * score.probability(), total + weight)
                });
        if total_weight.is_nan() || total_weight <= 0.0 {
            return Err(PredictionError::InsufficientEvidence(
                "supplied modalities carry no fusion weight".to_string(),
            ));
        }
        let image_probability = (weighted / total_weight).clamp(0.0, 1.0);
        let (probability, demographic_shift) = self.calibration.apply(image_probability, context);

        debug!(
            "Fused {} scores: image probability {:.3}, demographic shift {:+.3}, final {:.3}",
            scores.len(),
            image_probability,
            demographic_shift,
            probability
        );

        Ok(FusedPrediction {
            image_probability,
            demographic_shift,
            result: PredictionResult::from_probability(
                probability,
                self.params.decision_threshold,
                scores.len(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Gender;

    fn score(modality: Modality, probability: f32) -> ModalityScore {
        ModalityScore::new(modality, probability).unwrap()
    }

    fn params() -> (FusionParams, CalibrationParams) {
        let fusion = FusionParams {
            weights: ModalityWeights {
                eye: 2.0,
                forniceal: 1.0,
                palpebral: 1.0,
                forniceal_palpebral: 1.5,
            },
            decision_threshold: 0.5,
        };
        (fusion, CalibrationParams::default())
    }

    #[test]
    fn empty_score_set_is_insufficient_evidence() {
        let (fusion, calibration) = params();
        let err = EnsembleFusion::new(&fusion, &calibration)
            .fuse(&[], &PatientContext::default())
            .unwrap_err();
        assert!(matches!(err, PredictionError::InsufficientEvidence(_)));
    }

    #[test]
    fn renormalizes_over_present_modalities() {
        let (fusion, calibration) = params();
        let fuser = EnsembleFusion::new(&fusion, &calibration);
        let context = PatientContext::default();

        let single = fuser.fuse(&[score(Modality::Forniceal, 0.7)], &context).unwrap();
        assert!((single.image_probability - 0.7).abs() < 1e-6);

        let pair = fuser
            .fuse(
                &[score(Modality::Eye, 0.9), score(Modality::Palpebral, 0.3)],
                &context,
            )
            .unwrap();
        assert!((pair.image_probability - 0.7).abs() < 1e-6);
        assert_eq!(pair.result.modality_count(), 2);
    }

    #[test]
    fn agreeing_modalities_never_flip_label() {
        let (fusion, calibration) = params();
        let fuser = EnsembleFusion::new(&fusion, &calibration);
        let context = PatientContext::default();

        let mut anemic = vec![score(Modality::Eye, 0.62)];
        let mut healthy = vec![score(Modality::Eye, 0.35)];
        for (modality, high, low) in [
            (Modality::Forniceal, 0.55, 0.45),
            (Modality::Palpebral, 0.99, 0.01),
            (Modality::FornicealPalpebral, 0.51, 0.49),
        ] {
            anemic.push(score(modality, high));
            healthy.push(score(modality, low));
            assert!(fuser.fuse(&anemic, &context).unwrap().result.is_anemic());
            assert!(!fuser.fuse(&healthy, &context).unwrap().result.is_anemic());
        }
    }

    #[test]
    fn demographic_shift_is_bounded() {
        let (fusion, calibration) = params();
        let fuser = EnsembleFusion::new(&fusion, &calibration);
        let scores = [score(Modality::Eye, 0.56), score(Modality::Forniceal, 0.5)];

        let female = fuser.fuse(&scores, &PatientContext::default()).unwrap();
        let male = fuser
            .fuse(&scores, &PatientContext::new(Gender::Male, 70).unwrap())
            .unwrap();
        let child = fuser
            .fuse(&scores, &PatientContext::new(Gender::Child, 2).unwrap())
            .unwrap();

        assert_eq!(female.image_probability, male.image_probability);
        for a in [&female, &male, &child] {
            for b in [&female, &male, &child] {
                let delta = (a.result.probability() - b.result.probability()).abs();
                assert!(delta <= calibration.cap + 1e-6);
            }
        }
    }

    #[test]
    fn duplicate_modalities_are_rejected() {
        let (fusion, calibration) = params();
        let err = EnsembleFusion::new(&fusion, &calibration)
            .fuse(
                &[score(Modality::Eye, 0.4), score(Modality::Eye, 0.6)],
                &PatientContext::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PredictionError::DuplicateModality(Modality::Eye)));
    }

    #[test]
    fn confidence_reports_chosen_side() {
        let (fusion, calibration) = params();
        let fuser = EnsembleFusion::new(&fusion, &calibration);
        let fused = fuser
            .fuse(&[score(Modality::Eye, 0.2)], &PatientContext::default())
            .unwrap();
        assert_eq!(fused.result.label().as_binary(), 0);
        assert!((fused.result.confidence() - 80.0).abs() < 1e-3);
    }
}
