pub mod feature_extractor;

pub use feature_extractor::{
    COLOR_FEATURE_LEN, EXTENDED_FEATURE_LEN, FeatureExtractor, TEXTURE_FEATURE_LEN,
};
