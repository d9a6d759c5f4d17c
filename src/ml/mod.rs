//! Machine learning building blocks used by the pipeline.
//!
//! Estimators are small self-contained trainers over `Vec<f64>` feature rows;
//! the fitted models are serde-serializable for artifact persistence.

pub mod gbdt;
pub mod linreg;
pub mod logreg;
pub mod metrics;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Learning task an estimator or evaluator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Classification,
    Regression,
}

/// Errors from estimator training and model validation.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("empty training set")]
    EmptyDataset,
    #[error("training rows and labels differ in length ({rows} vs {labels})")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("inconsistent feature row length (expected {expected}, found {found})")]
    RaggedRow { expected: usize, found: usize },
    #[error("need at least 2 classes, found {0}")]
    TooFewClasses(usize),
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// Ground-truth labels for a training or evaluation set.
#[derive(Debug, Clone)]
pub enum Labels {
    /// Categorical target: ordered class list plus per-row class indices.
    Classes {
        classes: Vec<String>,
        indices: Vec<usize>,
    },
    /// Numeric regression target.
    Values(Vec<f64>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Labels::Classes { indices, .. } => indices.len(),
            Labels::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task(&self) -> Task {
        match self {
            Labels::Classes { .. } => Task::Classification,
            Labels::Values(_) => Task::Regression,
        }
    }

    /// Select the labels for a subset of row indices, preserving the class list.
    pub fn subset(&self, rows: &[usize]) -> Labels {
        match self {
            Labels::Classes { classes, indices } => Labels::Classes {
                classes: classes.clone(),
                indices: rows.iter().map(|&row| indices[row]).collect(),
            },
            Labels::Values(values) => {
                Labels::Values(rows.iter().map(|&row| values[row]).collect())
            }
        }
    }
}

/// Model output for a batch of rows.
#[derive(Debug, Clone)]
pub enum Predictions {
    Classes(Vec<usize>),
    Values(Vec<f64>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Predictions::Classes(indices) => indices.len(),
            Predictions::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Numerically-stable softmax over raw scores.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&score| (score - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    exps.into_iter().map(|exp| exp / sum).collect()
}

/// Index of the largest value; 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    let mut best_value = f64::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best = idx;
        }
    }
    best
}

/// Shared input checks for the estimator trainers.
pub(crate) fn check_training_inputs(x: &[Vec<f64>], n_labels: usize) -> Result<usize, MlError> {
    if x.is_empty() {
        return Err(MlError::EmptyDataset);
    }
    if x.len() != n_labels {
        return Err(MlError::LengthMismatch {
            rows: x.len(),
            labels: n_labels,
        });
    }
    let dim = x[0].len();
    for row in x {
        if row.len() != dim {
            return Err(MlError::RaggedRow {
                expected: dim,
                found: row.len(),
            });
        }
    }
    Ok(dim)
}
