pub mod metrics;
pub mod modality_context;
pub mod state;

pub use metrics::StageMetrics;
pub use modality_context::ModalityContext;
pub use state::{CroppedState, DecodedState, ExtractedState, ProcessingState, ReceivedState, ScoredState};
