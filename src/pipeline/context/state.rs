use crate::pipeline::types::{FeatureVector, ModalityScore, PixelGrid, RegionCrop};

// Markers to track the state of one modality's image pipeline
pub struct ReceivedState;
pub struct DecodedState {
    pub(super) grid: PixelGrid,
}
pub struct CroppedState {
    pub(super) crop: RegionCrop,
}
pub struct ExtractedState {
    pub(super) features: FeatureVector,
}
#[derive(Debug)]
pub struct ScoredState {
    pub(super) features: FeatureVector,
    pub(super) score: ModalityScore,
}

pub trait ProcessingState: 'static {
    fn state_name() -> &'static str;
}

impl ProcessingState for ReceivedState {
    fn state_name() -> &'static str {
        "Received"
    }
}

impl ProcessingState for DecodedState {
    fn state_name() -> &'static str {
        "Decoded"
    }
}

impl ProcessingState for CroppedState {
    fn state_name() -> &'static str {
        "Cropped"
    }
}

impl ProcessingState for ExtractedState {
    fn state_name() -> &'static str {
        "Extracted"
    }
}

impl ProcessingState for ScoredState {
    fn state_name() -> &'static str {
        "Scored"
    }
}
