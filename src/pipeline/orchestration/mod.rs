pub mod modality_pipeline;
pub mod prediction_service;
pub mod predictor;
pub mod report;

pub use modality_pipeline::ModalityPipeline;
pub use prediction_service::{PredictionRequest, PredictionService};
pub use predictor::Predictor;
pub use report::{ModalityFailure, ModalityTiming, PredictionReport};
