use std::time::Duration;

use serde::Serialize;

/// Stage timings collected while one modality moves through the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageMetrics {
    decode: Option<Duration>,
    region: Option<Duration>,
    features: Option<Duration>,
    scoring: Option<Duration>,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decode_duration(&mut self, duration: Duration) {
        self.decode = Some(duration);
    }

    pub fn record_region_duration(&mut self, duration: Duration) {
        self.region = Some(duration);
    }

    pub fn record_feature_duration(&mut self, duration: Duration) {
        self.features = Some(duration);
    }

    pub fn record_scoring_duration(&mut self, duration: Duration) {
        self.scoring = Some(duration);
    }

    pub fn decode(&self) -> Option<Duration> {
        self.decode
    }

    pub fn region(&self) -> Option<Duration> {
        self.region
    }

    pub fn features(&self) -> Option<Duration> {
        self.features
    }

    pub fn scoring(&self) -> Option<Duration> {
        self.scoring
    }

    pub fn total(&self) -> Duration {
        [self.decode, self.region, self.features, self.scoring]
            .into_iter()
            .flatten()
            .sum()
    }
}
