pub mod context;
pub mod orchestration;
pub mod services;
pub mod types;

pub use orchestration::{PredictionReport, PredictionRequest, PredictionService, Predictor};
pub use types::{Label, PredictionResult};
