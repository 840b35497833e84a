use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trained_model::TrainedModel;
use crate::error::ModelError;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format_version: u32,
    model: &'a TrainedModel,
}

#[derive(Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    model: serde_json::Value,
}

pub fn encode(model: &TrainedModel) -> Result<Vec<u8>, ModelError> {
    let artifact = ArtifactRef {
        format_version: ARTIFACT_FORMAT_VERSION,
        model,
    };
    Ok(serde_json::to_vec_pretty(&artifact)?)
}

/// Parses and validates an artifact; a version mismatch is reported before
/// the model body is interpreted.
pub fn decode(bytes: &[u8]) -> Result<TrainedModel, ModelError> {
    let envelope: ArtifactEnvelope = serde_json::from_slice(bytes)?;
    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(ModelError::IncompatibleVersion {
            found: envelope.format_version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    let model: TrainedModel = serde_json::from_value(envelope.model)?;
    model.validate()?;
    Ok(model)
}

pub fn load(path: &Path) -> Result<TrainedModel, ModelError> {
    let bytes = fs::read(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let model = decode(&bytes)?;
    debug!("Loaded model artifact from {}", path.display());
    Ok(model)
}

/// Writes to a sibling temp file and renames it into place.
pub fn save(model: &TrainedModel, path: &Path) -> Result<(), ModelError> {
    let write_error = |source| ModelError::Write {
        path: path.to_path_buf(),
        source,
    };
    let bytes = encode(model)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).map_err(write_error)?;
    fs::rename(&tmp_path, path).map_err(write_error)?;
    debug!("Saved model artifact to {}", path.display());
    Ok(())
}
