pub mod modality_scorer;

pub use modality_scorer::{ModalityScorer, ModalityScorers, ScorerParams, sigmoid};
