use std::path::PathBuf;
use std::sync::OnceLock;

use super::trained_model::TrainedModel;
use super::trainer::ModelTrainer;
use crate::config::{RegionConfig, TrainingConfig};

/// Small enough to train in well under a second in debug builds.
pub fn quick_training_config() -> TrainingConfig {
    TrainingConfig {
        seed: 17,
        samples_per_class: 24,
        epochs: 150,
        ..TrainingConfig::default()
    }
}

pub fn quick_trainer() -> ModelTrainer {
    ModelTrainer::new(quick_training_config(), RegionConfig::default(), 0.15)
}

/// One model shared by every unit test in the crate.
pub fn trained_model() -> TrainedModel {
    static MODEL: OnceLock<TrainedModel> = OnceLock::new();
    MODEL
        .get_or_init(|| quick_trainer().train().expect("quick training succeeds"))
        .clone()
}

/// A fresh `model.json` path inside its own temp directory. The directory is
/// not created.
pub fn temp_artifact_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("anemia-ensemble-{}", uuid::Uuid::new_v4()))
        .join("model.json")
}
