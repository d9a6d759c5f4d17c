//! Model configuration resolved from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ml::Task;
use crate::ml::metrics::EvaluatorKind;
use crate::pipeline::{PipelineError, StageConfig, validate_stages};

/// Errors that may occur while loading model configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Fold count below the minimum.
    #[error("cross-validation folds must be at least 2, got {0}")]
    FoldCount(usize),
    /// Stage list is structurally invalid.
    #[error(transparent)]
    Stages(#[from] PipelineError),
    /// Evaluator targets a different task than the final stage trains.
    #[error("evaluator {evaluator} targets {evaluator_task:?} but the final stage trains a {estimator_task:?} model")]
    EvaluatorMismatch {
        evaluator: &'static str,
        evaluator_task: Task,
        estimator_task: Task,
    },
}

/// Resolved model configuration. Loaded once, immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// CSV file holding the training data.
    pub training_data: PathBuf,
    /// Destination for the persisted model artifact.
    pub model_out: PathBuf,
    /// Target column name.
    pub label: String,
    /// Number of cross-validation folds.
    pub cv_folds: usize,
    /// Metric used to rank and report models.
    pub evaluator: EvaluatorKind,
    /// Ordered stage descriptors; the last one must be an estimator.
    #[serde(rename = "stage")]
    pub stages: Vec<StageConfig>,
}

impl ModelConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ModelConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that do not need the dataset: fold count, stage
    /// ordering, and evaluator/estimator task agreement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cv_folds < 2 {
            return Err(ConfigError::FoldCount(self.cv_folds));
        }
        let estimator_task = validate_stages(&self.stages)?;
        if self.evaluator.task() != estimator_task {
            return Err(ConfigError::EvaluatorMismatch {
                evaluator: self.evaluator.name(),
                evaluator_task: self.evaluator.task(),
                estimator_task,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VALID: &str = r#"
training_data = "train.csv"
model_out = "out/model.json"
label = "species"
cv_folds = 5
evaluator = "accuracy"

[[stage]]
kind = "standard_scaler"

[[stage]]
kind = "logistic_regression"
epochs = 10
"#;

    fn parse(text: &str) -> Result<ModelConfig, ConfigError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tabtrain.toml");
        std::fs::write(&path, text).unwrap();
        ModelConfig::load(&path)
    }

    #[test]
    fn loads_a_valid_config() {
        let config = parse(VALID).unwrap();
        assert_eq!(config.label, "species");
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.evaluator, EvaluatorKind::Accuracy);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[1].name(), "logistic_regression");
    }

    #[test]
    fn rejects_too_few_folds() {
        let text = VALID.replace("cv_folds = 5", "cv_folds = 1");
        assert!(matches!(parse(&text), Err(ConfigError::FoldCount(1))));
    }

    #[test]
    fn rejects_evaluator_task_mismatch() {
        let text = VALID.replace("evaluator = \"accuracy\"", "evaluator = \"rmse\"");
        assert!(matches!(
            parse(&text),
            Err(ConfigError::EvaluatorMismatch { .. })
        ));
    }

    #[test]
    fn rejects_missing_estimator() {
        let text = r#"
training_data = "train.csv"
model_out = "model.json"
label = "y"
cv_folds = 3
evaluator = "accuracy"

[[stage]]
kind = "standard_scaler"
"#;
        assert!(matches!(parse(text), Err(ConfigError::Stages(_))));
    }

    #[test]
    fn missing_file_surfaces_read_error() {
        let dir = tempdir().unwrap();
        let err = ModelConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
