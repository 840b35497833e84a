use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::ConfigError;

/// Top-level settings, layered from `config/default.toml` and `ANEMIA__*`
/// environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfiguration,
    pub region: RegionConfig,
    pub model: ModelConfig,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("ANEMIA").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.max_level()?;
        self.pipeline.validate().map_err(ConfigError::Invalid)?;
        self.region.validate().map_err(ConfigError::Invalid)?;
        self.model.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("Unknown log level '{}'", self.level)))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Request-level policy for the prediction entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfiguration {
    /// Reject requests that do not carry an eye image before any processing.
    pub require_eye: bool,
    pub timeout_ms: u64,
    pub max_image_bytes: usize,
    pub max_image_dimension: u32,
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            require_eye: true,
            timeout_ms: 30_000,
            max_image_bytes: 25 * 1024 * 1024,
            max_image_dimension: 8192,
        }
    }
}

impl PipelineConfiguration {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("Prediction timeout must be greater than 0".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("Max image bytes must be greater than 0".to_string());
        }
        if self.max_image_dimension == 0 {
            return Err("Max image dimension must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Thresholds for locating and normalizing the conjunctival crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub min_input_side: u32,
    pub canonical_width: u32,
    pub canonical_height: u32,
    /// Luma standard deviation below which a crop counts as blank.
    pub blank_luma_std: f32,
    pub sample_step: u32,
    /// Tissue hue window in degrees; wraps through 0.
    pub tissue_hue_min: f32,
    pub tissue_hue_max: f32,
    pub tissue_min_saturation: f32,
    pub tissue_min_value: f32,
    /// Share of sampled pixels in a row that must be tissue for the row to join a band.
    pub tissue_row_fraction: f32,
    pub min_band_rows: u32,
    pub min_area_fraction: f32,
    pub sclera_min_luma: f32,
    pub sclera_max_saturation: f32,
    pub sclera_row_fraction: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_input_side: 16,
            canonical_width: 128,
            canonical_height: 64,
            blank_luma_std: 2.0,
            sample_step: 2,
            tissue_hue_min: 330.0,
            tissue_hue_max: 20.0,
            tissue_min_saturation: 0.08,
            tissue_min_value: 0.3,
            tissue_row_fraction: 0.35,
            min_band_rows: 4,
            min_area_fraction: 0.02,
            sclera_min_luma: 170.0,
            sclera_max_saturation: 0.18,
            sclera_row_fraction: 0.15,
        }
    }
}

impl RegionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_input_side == 0 {
            return Err("Minimum input side must be greater than 0".to_string());
        }
        if self.canonical_width == 0 || self.canonical_height == 0 {
            return Err("Canonical crop size must be non-zero".to_string());
        }
        if self.sample_step == 0 {
            return Err("Sample step must be greater than 0".to_string());
        }
        for (name, value) in [
            ("tissue_row_fraction", self.tissue_row_fraction),
            ("min_area_fraction", self.min_area_fraction),
            ("sclera_row_fraction", self.sclera_row_fraction),
            ("tissue_min_saturation", self.tissue_min_saturation),
            ("tissue_min_value", self.tissue_min_value),
            ("sclera_max_saturation", self.sclera_max_saturation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be between 0.0 and 1.0"));
            }
        }
        if !(0.0..360.0).contains(&self.tissue_hue_min) || !(0.0..360.0).contains(&self.tissue_hue_max)
        {
            return Err("Tissue hue bounds must be within [0, 360)".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Where the trained model is loaded from and persisted to. `None` keeps
    /// the trained model in memory only.
    pub artifact_path: Option<PathBuf>,
    /// Largest fused-probability spread demographic priors may cause.
    pub calibration_cap: f32,
    pub training: TrainingConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: Some(PathBuf::from("models/anemia_ensemble.json")),
            calibration_cap: 0.15,
            training: TrainingConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=0.5).contains(&self.calibration_cap) {
            return Err("Calibration cap must be between 0.0 and 0.5".to_string());
        }
        self.training.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    pub samples_per_class: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub l2: f32,
    pub validation_fraction: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_A9E1,
            samples_per_class: 96,
            epochs: 400,
            learning_rate: 0.5,
            l2: 1e-3,
            validation_fraction: 0.25,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.samples_per_class < 4 {
            return Err("Training needs at least 4 samples per class".to_string());
        }
        if self.epochs == 0 {
            return Err("Training epochs must be greater than 0".to_string());
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err("Learning rate must be positive".to_string());
        }
        if self.l2 < 0.0 {
            return Err("L2 penalty must not be negative".to_string());
        }
        if !(0.05..=0.5).contains(&self.validation_fraction) {
            return Err("Validation fraction must be between 0.05 and 0.5".to_string());
        }
        Ok(())
    }
}
