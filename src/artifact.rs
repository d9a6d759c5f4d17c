//! Persisted model artifacts.
//!
//! The fitted cross-validator model is written as pretty-printed JSON,
//! creating parent directories as needed and overwriting any existing
//! artifact at the destination.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ml::MlError;
use crate::tuning::CrossValidatorModel;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create artifact directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode model: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid model at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invalid(#[from] MlError),
}

/// Save the model to `path`, replacing any prior artifact.
pub fn save(path: &Path, model: &CrossValidatorModel) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ArtifactError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let bytes = serde_json::to_vec_pretty(model)?;
    std::fs::write(path, bytes).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a model artifact and validate its structure.
pub fn load(path: &Path) -> Result<CrossValidatorModel, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let model: CrossValidatorModel =
        serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    model.best.validate()?;
    Ok(model)
}
