use std::time::{Duration, Instant};

use crate::common::{Modality, RawImage};
use crate::pipeline::context::metrics::StageMetrics;
use crate::pipeline::context::state::{
    CroppedState, DecodedState, ExtractedState, ProcessingState, ReceivedState, ScoredState,
};
use crate::pipeline::types::{FeatureVector, ModalityScore, PixelGrid, RegionCrop};

// ModalityContext with compile-time stage tracking
#[derive(Debug)]
pub struct ModalityContext<S> {
    raw: RawImage,
    metrics: StageMetrics,
    stage_start: Instant,
    state: S,
}

impl<S: ProcessingState> ModalityContext<S> {
    pub fn raw(&self) -> &RawImage {
        &self.raw
    }

    pub fn modality(&self) -> Modality {
        self.raw.modality()
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }

    fn stage_elapsed(&self) -> Duration {
        self.stage_start.elapsed()
    }

    fn advance<T>(self, metrics: StageMetrics, state: T) -> ModalityContext<T> {
        ModalityContext {
            raw: self.raw,
            metrics,
            stage_start: Instant::now(),
            state,
        }
    }
}

impl ModalityContext<ReceivedState> {
    pub fn new(raw: RawImage) -> Self {
        Self {
            raw,
            metrics: StageMetrics::new(),
            stage_start: Instant::now(),
            state: ReceivedState,
        }
    }

    pub fn into_decoded(self, grid: PixelGrid) -> ModalityContext<DecodedState> {
        let mut metrics = self.metrics;
        metrics.record_decode_duration(self.stage_elapsed());
        self.advance(metrics, DecodedState { grid })
    }
}

impl ModalityContext<DecodedState> {
    pub fn grid(&self) -> &PixelGrid {
        &self.state.grid
    }

    /// The decoded grid is dropped here; only the crop travels on.
    pub fn into_cropped(self, crop: RegionCrop) -> ModalityContext<CroppedState> {
        let mut metrics = self.metrics;
        metrics.record_region_duration(self.stage_elapsed());
        self.advance(metrics, CroppedState { crop })
    }
}

impl ModalityContext<CroppedState> {
    pub fn crop(&self) -> &RegionCrop {
        &self.state.crop
    }

    pub fn into_extracted(self, features: FeatureVector) -> ModalityContext<ExtractedState> {
        let mut metrics = self.metrics;
        metrics.record_feature_duration(self.stage_elapsed());
        self.advance(metrics, ExtractedState { features })
    }
}

impl ModalityContext<ExtractedState> {
    pub fn features(&self) -> &FeatureVector {
        &self.state.features
    }

    pub fn into_scored(self, score: ModalityScore) -> ModalityContext<ScoredState> {
        let mut metrics = self.metrics;
        metrics.record_scoring_duration(self.stage_elapsed());
        ModalityContext {
            raw: self.raw,
            metrics,
            stage_start: Instant::now(),
            state: ScoredState {
                features: self.state.features,
                score,
            },
        }
    }
}

impl ModalityContext<ScoredState> {
    pub fn features(&self) -> &FeatureVector {
        &self.state.features
    }

    pub fn score(&self) -> ModalityScore {
        self.state.score
    }
}
