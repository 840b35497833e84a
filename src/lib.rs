//! Anemia screening from photographs of the eye and conjunctiva.
//!
//! Up to four image modalities are decoded, cropped to the conjunctiva,
//! reduced to pallor features and scored independently, then fused with a
//! bounded demographic prior into one [`PredictionResult`]. Callers go
//! through [`Predictor`].

pub mod common;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;

pub use common::{Gender, Modality, ModalityImages, PatientContext};
pub use config::Settings;
pub use error::{AppError, ConfigError, ModelError, PredictionError};
pub use model::{LifecycleState, ModelLifecycleManager, ModelTrainer, TrainedModel};
pub use pipeline::orchestration::{PredictionReport, Predictor};
pub use pipeline::types::{Label, PredictionResult};
