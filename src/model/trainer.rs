use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::synthetic::{SyntheticTissue, conjunctiva_crop, eye_photo};
use super::trained_model::{ModelMetadata, TrainedModel};
use crate::common::Modality;
use crate::config::{RegionConfig, Settings, TrainingConfig};
use crate::error::ModelError;
use crate::pipeline::services::features::FeatureExtractor;
use crate::pipeline::services::fusion::{CalibrationParams, FusionParams, ModalityWeights};
use crate::pipeline::services::image::RegionExtractor;
use crate::pipeline::services::scoring::{ModalityScorers, ScorerParams, sigmoid};

/// Standardization floor for features that barely vary in the training set.
const MIN_FEATURE_SCALE: f32 = 1e-3;
/// Smallest fusion weight a modality can end up with.
const MIN_FUSION_WEIGHT: f32 = 0.05;

/// How hard each modality's synthetic samples are to separate.
#[derive(Debug, Clone, Copy)]
struct ModalityProfile {
    /// Upper bound of the per-sample noise amplitude.
    noise: f32,
    /// How far each class's pallor range reaches past the midpoint.
    overlap: f32,
}

impl ModalityProfile {
    fn for_modality(modality: Modality) -> Self {
        match modality {
            Modality::Eye => Self {
                noise: 8.0,
                overlap: 0.15,
            },
            Modality::Forniceal => Self {
                noise: 6.0,
                overlap: 0.1,
            },
            Modality::Palpebral => Self {
                noise: 7.0,
                overlap: 0.12,
            },
            Modality::FornicealPalpebral => Self {
                noise: 5.0,
                overlap: 0.08,
            },
        }
    }
}

struct Sample {
    features: Vec<f32>,
    label: f32,
}

struct FittedScorer {
    params: ScorerParams,
    validation_accuracy: f32,
}

/// Deterministic trainer: the same configuration always yields the same
/// parameters.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
    region: RegionConfig,
    calibration_cap: f32,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig, region: RegionConfig, calibration_cap: f32) -> Self {
        Self {
            config,
            region,
            calibration_cap,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.model.training.clone(),
            settings.region.clone(),
            settings.model.calibration_cap,
        )
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self) -> Result<TrainedModel, ModelError> {
        self.config.validate().map_err(ModelError::Training)?;
        info!(
            "Training model with seed {} and {} samples per class",
            self.config.seed, self.config.samples_per_class
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let extractor = RegionExtractor::new(self.region.clone());

        let mut fitted = Vec::with_capacity(Modality::ALL.len());
        for modality in Modality::ALL {
            let samples = self.build_dataset(modality, &mut rng, &extractor)?;
            let scorer = self.fit(modality, &samples)?;
            info!(
                "Trained {} scorer on {} samples, validation accuracy {:.3}",
                modality,
                samples.len(),
                scorer.validation_accuracy
            );
            fitted.push(scorer);
        }

        let weight = |index: usize| (fitted[index].validation_accuracy - 0.5).max(MIN_FUSION_WEIGHT);
        let fusion = FusionParams {
            weights: ModalityWeights {
                eye: weight(0),
                forniceal: weight(1),
                palpebral: weight(2),
                forniceal_palpebral: weight(3),
            },
            decision_threshold: 0.5,
        };
        let metadata = ModelMetadata {
            trained_at: Utc::now(),
            seed: self.config.seed,
            samples_per_class: self.config.samples_per_class,
            validation_accuracy: Modality::ALL
                .iter()
                .zip(&fitted)
                .map(|(m, f)| (*m, f.validation_accuracy))
                .collect(),
        };

        let mut scorers = fitted.into_iter().map(|f| f.params);
        let mut next = || {
            scorers
                .next()
                .ok_or_else(|| ModelError::Training("missing fitted scorer".to_string()))
        };
        let scorers = ModalityScorers {
            eye: next()?,
            forniceal: next()?,
            palpebral: next()?,
            forniceal_palpebral: next()?,
        };

        TrainedModel::new(
            scorers,
            fusion,
            CalibrationParams::with_cap(self.calibration_cap),
            metadata,
        )
    }

    /// Alternating healthy and anemic samples, each pushed through the same
    /// region and feature extraction a prediction uses.
    fn build_dataset(
        &self,
        modality: Modality,
        rng: &mut StdRng,
        extractor: &RegionExtractor,
    ) -> Result<Vec<Sample>, ModelError> {
        let profile = ModalityProfile::for_modality(modality);
        let features = FeatureExtractor::new();
        let mut samples = Vec::with_capacity(self.config.samples_per_class * 2);
        let mut skipped = 0usize;

        for _ in 0..self.config.samples_per_class {
            for label in [0.0f32, 1.0] {
                let pallor = if label > 0.5 {
                    rng.random_range((0.5 - profile.overlap)..=1.0)
                } else {
                    rng.random_range(0.0..=(0.5 + profile.overlap))
                };
                let noise = rng.random_range(0.0..=profile.noise);
                let tissue = SyntheticTissue::new(pallor, noise);
                let image = if modality.is_pre_cropped() {
                    let width = rng.random_range(48..=160);
                    let height = rng.random_range(40..=120);
                    conjunctiva_crop(rng, width, height, &tissue)
                } else {
                    eye_photo(rng, 160, 120, &tissue)
                };

                let extracted = extractor
                    .extract(modality, &image)
                    .and_then(|crop| features.extract(&crop));
                match extracted {
                    Ok(vector) => samples.push(Sample {
                        features: vector.values().to_vec(),
                        label,
                    }),
                    Err(e) => {
                        skipped += 1;
                        debug!("Skipping synthetic {} sample: {}", modality, e);
                    }
                }
            }
        }

        let positives = samples.iter().filter(|s| s.label > 0.5).count();
        let negatives = samples.len() - positives;
        if positives < 2 || negatives < 2 {
            return Err(ModelError::Training(format!(
                "{modality} dataset has {positives} anemic and {negatives} healthy samples \
                 after skipping {skipped}"
            )));
        }
        Ok(samples)
    }

    /// Batch gradient descent on standardized features with an L2 penalty.
    fn fit(&self, modality: Modality, samples: &[Sample]) -> Result<FittedScorer, ModelError> {
        let len = modality.feature_len();
        let validation_len =
            ((samples.len() as f32 * self.config.validation_fraction).round() as usize).max(1);
        let (train, validation) = samples.split_at(samples.len() - validation_len);
        if train.is_empty() {
            return Err(ModelError::Training(format!(
                "{modality} has no training samples"
            )));
        }

        let n = train.len() as f32;
        let mut means = vec![0.0f32; len];
        for sample in train {
            for (mean, x) in means.iter_mut().zip(&sample.features) {
                *mean += x / n;
            }
        }
        let mut scales = vec![0.0f32; len];
        for sample in train {
            for ((scale, x), mean) in scales.iter_mut().zip(&sample.features).zip(&means) {
                *scale += (x - mean).powi(2) / n;
            }
        }
        for scale in &mut scales {
            *scale = scale.sqrt().max(MIN_FEATURE_SCALE);
        }

        let standardized: Vec<Vec<f32>> = train
            .iter()
            .map(|s| {
                s.features
                    .iter()
                    .zip(&means)
                    .zip(&scales)
                    .map(|((x, m), s)| (x - m) / s)
                    .collect()
            })
            .collect();

        let mut weights = vec![0.0f32; len];
        let mut bias = 0.0f32;
        let lr = self.config.learning_rate;
        for _ in 0..self.config.epochs {
            let mut grad_w = vec![0.0f32; len];
            let mut grad_b = 0.0f32;
            for (x, sample) in standardized.iter().zip(train) {
                let z: f32 = x.iter().zip(&weights).map(|(x, w)| x * w).sum::<f32>() + bias;
                let error = sigmoid(z) - sample.label;
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += error * xi;
                }
                grad_b += error;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * (g / n + self.config.l2 * *w);
            }
            bias -= lr * grad_b / n;
        }

        let params = ScorerParams {
            modality,
            feature_means: means,
            feature_scales: scales,
            weights,
            bias,
        };
        params.validate()?;

        let correct = validation
            .iter()
            .filter(|s| (sigmoid(params.logit(&s.features)) >= 0.5) == (s.label > 0.5))
            .count();
        let validation_accuracy = correct as f32 / validation.len() as f32;

        Ok(FittedScorer {
            params,
            validation_accuracy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{quick_training_config, trained_model};
    use crate::pipeline::types::RegionCrop;

    #[test]
    fn training_is_deterministic() {
        let trainer = ModelTrainer::new(quick_training_config(), RegionConfig::default(), 0.15);
        let first = trainer.train().unwrap();
        let second = trainer.train().unwrap();
        assert_eq!(first.scorers(), second.scorers());
        assert_eq!(first.fusion_params(), second.fusion_params());
    }

    #[test]
    fn trained_scorers_separate_pallor() {
        let model = trained_model();
        let mut rng = StdRng::seed_from_u64(1234);
        let extractor = RegionExtractor::default();
        for modality in Modality::ALL {
            let score = |pallor: f32, rng: &mut StdRng| {
                let tissue = SyntheticTissue::new(pallor, 5.0);
                let image = if modality.is_pre_cropped() {
                    conjunctiva_crop(rng, 96, 64, &tissue)
                } else {
                    eye_photo(rng, 160, 120, &tissue)
                };
                let crop: RegionCrop = extractor.extract(modality, &image).unwrap();
                let features = FeatureExtractor::new().extract(&crop).unwrap();
                model.scorer().score(&features).unwrap().probability()
            };
            assert!(score(0.95, &mut rng) > 0.5, "{modality} misses pallor");
            assert!(score(0.05, &mut rng) < 0.5, "{modality} flags healthy tissue");
        }
    }

    #[test]
    fn fusion_weights_are_positive() {
        let model = trained_model();
        for modality in Modality::ALL {
            assert!(model.fusion_params().weights.get(modality) >= MIN_FUSION_WEIGHT);
        }
        assert_eq!(model.calibration().cap, 0.15);
        assert_eq!(model.metadata().validation_accuracy.len(), 4);
    }

    #[test]
    fn invalid_configuration_fails_training() {
        let config = TrainingConfig {
            samples_per_class: 1,
            ..quick_training_config()
        };
        let trainer = ModelTrainer::new(config, RegionConfig::default(), 0.15);
        assert!(matches!(trainer.train(), Err(ModelError::Training(_))));
    }
}
