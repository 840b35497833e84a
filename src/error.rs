use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::common::Modality;
use crate::pipeline::orchestration::ModalityFailure;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Model Error: {0}")]
    Model(#[from] ModelError),
    #[error("Prediction Error: {0}")]
    Prediction(#[from] PredictionError),
}

// Errors surfaced by a single prediction request
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to decode {modality} image: {reason}")]
    Decode { modality: Modality, reason: String },
    #[error("Conjunctival region not found in {modality} image: {reason}")]
    RegionNotFound { modality: Modality, reason: String },
    #[error("Invalid {modality} region: {reason}")]
    InvalidRegion { modality: Modality, reason: String },
    #[error("Invalid {modality} score: {reason}")]
    InvalidScore { modality: Modality, reason: String },
    #[error("Insufficient evidence: {0}")]
    InsufficientEvidence(String),
    #[error("No supplied modality could be scored: {}", summarize_failures(.0))]
    NoUsableModality(Vec<ModalityFailure>),
    #[error("Modality {0} was supplied more than once")]
    DuplicateModality(Modality),
    #[error("Invalid patient context: {0}")]
    InvalidPatientContext(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),
    #[error("Prediction timed out after {0:?}")]
    Timeout(Duration),
    #[error("Prediction worker failed: {0}")]
    Worker(String),
}

impl PredictionError {
    /// The modality whose image pipeline produced this error, if the error is
    /// confined to a single modality.
    pub fn modality(&self) -> Option<Modality> {
        match self {
            PredictionError::Decode { modality, .. }
            | PredictionError::RegionNotFound { modality, .. }
            | PredictionError::InvalidRegion { modality, .. }
            | PredictionError::InvalidScore { modality, .. } => Some(*modality),
            _ => None,
        }
    }

    /// True for both ways a request can end up with nothing to fuse.
    pub fn is_insufficient_evidence(&self) -> bool {
        matches!(
            self,
            PredictionError::InsufficientEvidence(_) | PredictionError::NoUsableModality(_)
        )
    }

    /// Per-modality failures are excluded from fusion instead of aborting the request.
    pub fn is_per_modality(&self) -> bool {
        self.modality().is_some()
    }
}

fn summarize_failures(failures: &[ModalityFailure]) -> String {
    failures
        .iter()
        .map(|f| f.error.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write model artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Incompatible model artifact version {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Model initialization task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown modality tag: {0}")]
pub struct ParseModalityError(pub String);
