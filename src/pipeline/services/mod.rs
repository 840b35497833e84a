pub mod decoder;
pub mod features;
pub mod fusion;
pub mod image;
pub mod scoring;

pub use decoder::ImageDecoder;
pub use features::FeatureExtractor;
pub use fusion::{EnsembleFusion, FusedPrediction};
pub use self::image::RegionExtractor;
pub use scoring::ModalityScorer;
