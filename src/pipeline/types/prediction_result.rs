use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    NoAnemia,
    Anemia,
}

impl Label {
    pub fn as_binary(&self) -> u8 {
        match self {
            Label::NoAnemia => 0,
            Label::Anemia => 1,
        }
    }
}

/// Terminal output of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    label: Label,
    confidence: f32,
    probability: f32,
    modality_count: usize,
}

impl PredictionResult {
    /// `probability` is the calibrated anemia probability; confidence is
    /// reported on the side of the chosen label.
    pub fn from_probability(probability: f32, threshold: f32, modality_count: usize) -> Self {
        let label = if probability >= threshold {
            Label::Anemia
        } else {
            Label::NoAnemia
        };
        let confidence = match label {
            Label::Anemia => probability * 100.0,
            Label::NoAnemia => (1.0 - probability) * 100.0,
        };
        Self {
            label,
            confidence,
            probability,
            modality_count,
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_anemic(&self) -> bool {
        self.label == Label::Anemia
    }

    /// Percentage in [0, 100].
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    pub fn modality_count(&self) -> usize {
        self.modality_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_follows_chosen_label() {
        let anemic = PredictionResult::from_probability(0.8, 0.5, 1);
        assert_eq!(anemic.label().as_binary(), 1);
        assert!((anemic.confidence() - 80.0).abs() < 1e-4);

        let healthy = PredictionResult::from_probability(0.2, 0.5, 2);
        assert_eq!(healthy.label(), Label::NoAnemia);
        assert!((healthy.confidence() - 80.0).abs() < 1e-4);
        assert_eq!(healthy.modality_count(), 2);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(PredictionResult::from_probability(0.5, 0.5, 1).is_anemic());
        assert!(!PredictionResult::from_probability(0.59, 0.6, 1).is_anemic());
    }
}
