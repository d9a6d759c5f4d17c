//! Training controller: the fixed load → fit → cross-validate → evaluate →
//! persist sequence, with one wrapped error kind for every failure.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::{self, ArtifactError};
use crate::config::ModelConfig;
use crate::dataset::{self, DatasetError};
use crate::ml::metrics::{EvaluatorKind, MetricError};
use crate::ml::{Labels, Task};
use crate::pipeline::{Pipeline, PipelineError};
use crate::tuning::{CrossValidator, TuningError};

/// The single user-visible training error. The failing step's error is
/// preserved unchanged as the source, with no per-step handling.
#[derive(Debug, Error)]
#[error("model training failed")]
pub struct TrainError {
    #[from]
    source: StepError,
}

/// Underlying cause of a failed training run.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Tuning(#[from] TuningError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Outcome of a successful training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Selected model scored against the training rows.
    pub evaluation_metric: f64,
    /// Mean held-out score across the folds.
    pub cv_score: f64,
    /// Held-out score per fold.
    pub fold_scores: Vec<f64>,
    /// Pre-validation pipeline fit scored against the training rows.
    pub training_score: f64,
    pub evaluator: EvaluatorKind,
    /// Where the artifact was written.
    pub model_path: PathBuf,
    /// Stages in the persisted pipeline, including the estimator.
    pub n_stages: usize,
}

/// Owns one immutable configuration and runs the training sequence.
pub struct TrainingController {
    config: ModelConfig,
}

impl TrainingController {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run one training pass end to end.
    ///
    /// Any failure at any step surfaces as [`TrainError`]; the original
    /// cause stays reachable through `std::error::Error::source`.
    pub fn train_model(&self) -> Result<TrainReport, TrainError> {
        self.run().map_err(TrainError::from)
    }

    fn run(&self) -> Result<TrainReport, StepError> {
        let config = &self.config;

        info!(path = %config.training_data.display(), "loading training data");
        let frame = dataset::load_csv(&config.training_data)?;
        let schema = frame.schema();

        let pipeline = Pipeline::from_config(&config.stages, &schema, &config.label)?;
        info!(
            rows = frame.n_rows(),
            stages = pipeline.n_stages(),
            "pipeline built from configuration"
        );

        let features = frame.feature_matrix(&config.label)?;
        let labels = match pipeline.task() {
            Task::Classification => {
                let (classes, indices) = frame.class_labels(&config.label)?;
                Labels::Classes { classes, indices }
            }
            Task::Regression => Labels::Values(frame.numeric_labels(&config.label)?),
        };

        // Fit the full pipeline once before the search; the cross-validated
        // refit supersedes this model.
        let prefit = pipeline.fit(&features, &labels)?;
        let training_score = config
            .evaluator
            .evaluate(&labels, &prefit.predict(&features))?;
        debug!(score = training_score, "pre-validation training fit");

        let cross_validator = CrossValidator::new(&pipeline, config.evaluator, config.cv_folds);
        let cv_model = cross_validator.fit(&features, &labels)?;
        info!(
            folds = config.cv_folds,
            candidates = cv_model.search_space_size(),
            avg_score = cv_model.avg_score,
            "cross-validation finished"
        );

        // Evaluation reuses the training rows; no held-out split exists.
        let evaluation_metric = config
            .evaluator
            .evaluate(&labels, &cv_model.best.predict(&features))?;

        artifact::save(&config.model_out, &cv_model)?;
        info!(path = %config.model_out.display(), "model saved");

        Ok(TrainReport {
            evaluation_metric,
            cv_score: cv_model.avg_score,
            fold_scores: cv_model.fold_scores.clone(),
            training_score,
            evaluator: config.evaluator,
            model_path: config.model_out.clone(),
            n_stages: cv_model.best.n_stages(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn train_error_display_is_the_single_kind() {
        let err = TrainError::from(StepError::Dataset(DatasetError::Empty));
        assert_eq!(err.to_string(), "model training failed");
        let source = err.source().expect("source preserved");
        assert_eq!(source.to_string(), "no data rows");
    }
}
