mod feature_vector;
mod modality_score;
mod prediction_result;
mod region_crop;

pub use feature_vector::FeatureVector;
pub use modality_score::ModalityScore;
pub use prediction_result::{Label, PredictionResult};
pub use region_crop::{PixelGrid, RegionCrop};
