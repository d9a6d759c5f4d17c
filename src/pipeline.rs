//! Configurable feature/model pipeline.
//!
//! A pipeline is the ordered list of stage descriptors from configuration:
//! zero or more transforms followed by exactly one estimator. Fitting runs
//! the stages in order, each consuming the output of the previous one, and
//! produces a serializable [`PipelineModel`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Schema;
use crate::ml::gbdt::{GbdtModel, GbdtOptions, train_gbdt};
use crate::ml::linreg::{LinRegModel, LinRegOptions, train_linreg};
use crate::ml::logreg::{LogRegModel, LogRegOptions, train_logreg};
use crate::ml::{Labels, MlError, Predictions, Task};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    NoStages,
    #[error("stage {index} ({name}) is an estimator but not the final stage")]
    EstimatorNotLast { index: usize, name: &'static str },
    #[error("final stage ({name}) is not an estimator")]
    NoEstimator { name: &'static str },
    #[error("label column not found: {0}")]
    UnknownLabel(String),
    #[error("no numeric feature columns besides the label")]
    NoFeatures,
    #[error("labels are for a {found:?} task but the estimator expects {expected:?}")]
    TaskMismatch { expected: Task, found: Task },
    #[error(transparent)]
    Train(#[from] MlError),
}

/// Stage descriptor from configuration.
///
/// Each descriptor can produce an executable stage; estimator descriptors
/// carry their training hyperparameters inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    StandardScaler,
    MinMaxScaler,
    MeanImputer,
    LogisticRegression(LogRegOptions),
    GradientBoostedStumps(GbdtOptions),
    LinearRegression(LinRegOptions),
}

impl StageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::StandardScaler => "standard_scaler",
            StageConfig::MinMaxScaler => "min_max_scaler",
            StageConfig::MeanImputer => "mean_imputer",
            StageConfig::LogisticRegression(_) => "logistic_regression",
            StageConfig::GradientBoostedStumps(_) => "gradient_boosted_stumps",
            StageConfig::LinearRegression(_) => "linear_regression",
        }
    }

    /// `Some(task)` for estimator stages, `None` for transforms.
    pub fn estimator_task(&self) -> Option<Task> {
        match self {
            StageConfig::LogisticRegression(_) | StageConfig::GradientBoostedStumps(_) => {
                Some(Task::Classification)
            }
            StageConfig::LinearRegression(_) => Some(Task::Regression),
            _ => None,
        }
    }

    pub fn is_estimator(&self) -> bool {
        self.estimator_task().is_some()
    }
}

/// Check stage ordering (transforms first, exactly one trailing estimator)
/// and return the task the pipeline targets.
pub fn validate_stages(stages: &[StageConfig]) -> Result<Task, PipelineError> {
    let Some((last, transforms)) = stages.split_last() else {
        return Err(PipelineError::NoStages);
    };
    for (index, stage) in transforms.iter().enumerate() {
        if stage.is_estimator() {
            return Err(PipelineError::EstimatorNotLast {
                index,
                name: stage.name(),
            });
        }
    }
    last.estimator_task()
        .ok_or(PipelineError::NoEstimator { name: last.name() })
}

/// Ordered stages, validated against a dataset schema.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<StageConfig>,
    task: Task,
}

impl Pipeline {
    /// Build a pipeline from configured stage descriptors and the loaded
    /// schema. The stage list is carried over exactly: same count, same
    /// order.
    pub fn from_config(
        stages: &[StageConfig],
        schema: &Schema,
        label: &str,
    ) -> Result<Self, PipelineError> {
        let task = validate_stages(stages)?;
        if schema.field(label).is_none() {
            return Err(PipelineError::UnknownLabel(label.to_string()));
        }
        if schema.numeric_feature_names(label).is_empty() {
            return Err(PipelineError::NoFeatures);
        }
        Ok(Self {
            stages: stages.to_vec(),
            task,
        })
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(StageConfig::name).collect()
    }

    pub fn task(&self) -> Task {
        self.task
    }

    /// Fit every stage in order against the given rows and labels.
    pub fn fit(&self, features: &[Vec<f64>], labels: &Labels) -> Result<PipelineModel, PipelineError> {
        if features.is_empty() {
            return Err(MlError::EmptyDataset.into());
        }
        if labels.task() != self.task {
            return Err(PipelineError::TaskMismatch {
                expected: self.task,
                found: labels.task(),
            });
        }

        let mut working: Vec<Vec<f64>> = features.to_vec();
        let (estimator_stage, transform_stages) = self
            .stages
            .split_last()
            .ok_or(PipelineError::NoStages)?;

        let mut transforms = Vec::with_capacity(transform_stages.len());
        for stage in transform_stages {
            let fitted = fit_transform(stage, &working)?;
            fitted.apply(&mut working);
            transforms.push(fitted);
        }

        let estimator = match (estimator_stage, labels) {
            (StageConfig::LogisticRegression(options), Labels::Classes { classes, indices }) => {
                TrainedEstimator::LogisticRegression(train_logreg(
                    &working, indices, classes, options,
                )?)
            }
            (StageConfig::GradientBoostedStumps(options), Labels::Classes { classes, indices }) => {
                TrainedEstimator::GradientBoostedStumps(train_gbdt(
                    &working, indices, classes, options,
                )?)
            }
            (StageConfig::LinearRegression(options), Labels::Values(values)) => {
                TrainedEstimator::LinearRegression(train_linreg(&working, values, options)?)
            }
            (stage, labels) => {
                return Err(PipelineError::TaskMismatch {
                    expected: stage.estimator_task().unwrap_or(self.task),
                    found: labels.task(),
                });
            }
        };
        // Missing values that no imputer filled train to non-finite
        // parameters; reject the fit instead of persisting them.
        estimator.validate()?;

        Ok(PipelineModel {
            transforms,
            estimator,
        })
    }
}

/// Fitted state of a transform stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum FittedTransform {
    StandardScaler { means: Vec<f64>, stds: Vec<f64> },
    MinMaxScaler { mins: Vec<f64>, maxs: Vec<f64> },
    MeanImputer { means: Vec<f64> },
}

impl FittedTransform {
    pub fn name(&self) -> &'static str {
        match self {
            FittedTransform::StandardScaler { .. } => "standard_scaler",
            FittedTransform::MinMaxScaler { .. } => "min_max_scaler",
            FittedTransform::MeanImputer { .. } => "mean_imputer",
        }
    }

    /// Apply the fitted transform in place. Missing values (`NaN`) pass
    /// through the scalers untouched; only the imputer fills them.
    pub fn apply(&self, rows: &mut [Vec<f64>]) {
        match self {
            FittedTransform::StandardScaler { means, stds } => {
                for row in rows {
                    for (col, value) in row.iter_mut().enumerate() {
                        *value = (*value - means[col]) / stds[col];
                    }
                }
            }
            FittedTransform::MinMaxScaler { mins, maxs } => {
                for row in rows {
                    for (col, value) in row.iter_mut().enumerate() {
                        *value = (*value - mins[col]) / (maxs[col] - mins[col]);
                    }
                }
            }
            FittedTransform::MeanImputer { means } => {
                for row in rows {
                    for (col, value) in row.iter_mut().enumerate() {
                        if value.is_nan() {
                            *value = means[col];
                        }
                    }
                }
            }
        }
    }
}

fn fit_transform(stage: &StageConfig, rows: &[Vec<f64>]) -> Result<FittedTransform, PipelineError> {
    let dim = rows[0].len();
    match stage {
        StageConfig::StandardScaler => {
            let means = column_means(rows, dim);
            let mut stds = vec![0.0f64; dim];
            let mut counts = vec![0usize; dim];
            for row in rows {
                for (col, &value) in row.iter().enumerate() {
                    if value.is_finite() {
                        let diff = value - means[col];
                        stds[col] += diff * diff;
                        counts[col] += 1;
                    }
                }
            }
            for (std, &count) in stds.iter_mut().zip(counts.iter()) {
                *std = if count > 0 {
                    (*std / count as f64).sqrt()
                } else {
                    0.0
                };
                if *std == 0.0 {
                    *std = 1.0;
                }
            }
            Ok(FittedTransform::StandardScaler { means, stds })
        }
        StageConfig::MinMaxScaler => {
            let mut mins = vec![f64::INFINITY; dim];
            let mut maxs = vec![f64::NEG_INFINITY; dim];
            for row in rows {
                for (col, &value) in row.iter().enumerate() {
                    if value.is_finite() {
                        mins[col] = mins[col].min(value);
                        maxs[col] = maxs[col].max(value);
                    }
                }
            }
            for col in 0..dim {
                if !mins[col].is_finite() || !maxs[col].is_finite() {
                    mins[col] = 0.0;
                    maxs[col] = 0.0;
                }
                if mins[col] == maxs[col] {
                    maxs[col] = mins[col] + 1.0;
                }
            }
            Ok(FittedTransform::MinMaxScaler { mins, maxs })
        }
        StageConfig::MeanImputer => Ok(FittedTransform::MeanImputer {
            means: column_means(rows, dim),
        }),
        estimator => Err(PipelineError::EstimatorNotLast {
            index: 0,
            name: estimator.name(),
        }),
    }
}

/// Per-column means over finite values; 0.0 for all-missing columns.
fn column_means(rows: &[Vec<f64>], dim: usize) -> Vec<f64> {
    let mut sums = vec![0.0f64; dim];
    let mut counts = vec![0usize; dim];
    for row in rows {
        for (col, &value) in row.iter().enumerate() {
            if value.is_finite() {
                sums[col] += value;
                counts[col] += 1;
            }
        }
    }
    sums.iter()
        .zip(counts.iter())
        .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
        .collect()
}

/// Trained estimator produced by the final pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum TrainedEstimator {
    LogisticRegression(LogRegModel),
    GradientBoostedStumps(GbdtModel),
    LinearRegression(LinRegModel),
}

impl TrainedEstimator {
    pub fn name(&self) -> &'static str {
        match self {
            TrainedEstimator::LogisticRegression(_) => "logistic_regression",
            TrainedEstimator::GradientBoostedStumps(_) => "gradient_boosted_stumps",
            TrainedEstimator::LinearRegression(_) => "linear_regression",
        }
    }

    pub fn task(&self) -> Task {
        match self {
            TrainedEstimator::LinearRegression(_) => Task::Regression,
            _ => Task::Classification,
        }
    }

    pub fn validate(&self) -> Result<(), MlError> {
        match self {
            TrainedEstimator::LogisticRegression(model) => model.validate(),
            TrainedEstimator::GradientBoostedStumps(model) => model.validate(),
            TrainedEstimator::LinearRegression(model) => model.validate(),
        }
    }
}

/// Fitted pipeline: transform states in stage order plus the trained
/// estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineModel {
    pub transforms: Vec<FittedTransform>,
    pub estimator: TrainedEstimator,
}

impl PipelineModel {
    /// Stage count including the estimator.
    pub fn n_stages(&self) -> usize {
        self.transforms.len() + 1
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.transforms.iter().map(FittedTransform::name).collect();
        names.push(self.estimator.name());
        names
    }

    pub fn task(&self) -> Task {
        self.estimator.task()
    }

    pub fn validate(&self) -> Result<(), MlError> {
        self.estimator.validate()
    }

    /// Replay the transforms in order, then predict with the estimator.
    pub fn predict(&self, features: &[Vec<f64>]) -> Predictions {
        let mut working: Vec<Vec<f64>> = features.to_vec();
        for transform in &self.transforms {
            transform.apply(&mut working);
        }
        match &self.estimator {
            TrainedEstimator::LogisticRegression(model) => {
                Predictions::Classes(working.iter().map(|row| model.predict_class(row)).collect())
            }
            TrainedEstimator::GradientBoostedStumps(model) => {
                Predictions::Classes(working.iter().map(|row| model.predict_class(row)).collect())
            }
            TrainedEstimator::LinearRegression(model) => {
                Predictions::Values(working.iter().map(|row| model.predict(row)).collect())
            }
        }
    }
}
