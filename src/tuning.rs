//! K-fold cross-validation search over pipeline candidates.
//!
//! The candidate grid always holds exactly one empty [`ParamMap`]: the
//! "search" evaluates a single configuration, so cross-validation reduces to
//! repeated-fold evaluation without tuning. That behavior is deliberate and
//! observable through [`CrossValidatorModel::search_space_size`].

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::Labels;
use crate::ml::metrics::{EvaluatorKind, MetricError};
use crate::pipeline::{Pipeline, PipelineError, PipelineModel};

const FOLD_SHUFFLE_SEED: u64 = 42;

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("cross-validation needs between 2 and {rows} folds, got {folds}")]
    InvalidFolds { folds: usize, rows: usize },
    #[error("empty parameter grid")]
    EmptyGrid,
    #[error("rows and labels differ in length ({rows} vs {labels})")]
    LengthMismatch { rows: usize, labels: usize },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// One candidate's parameter overrides. In practice always empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap(BTreeMap<String, f64>);

impl ParamMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cross-validation search around a pipeline specification.
pub struct CrossValidator<'a> {
    pipeline: &'a Pipeline,
    evaluator: EvaluatorKind,
    num_folds: usize,
    param_grid: Vec<ParamMap>,
    seed: u64,
}

impl<'a> CrossValidator<'a> {
    /// Configure a cross-validator with the degenerate single-candidate grid.
    pub fn new(pipeline: &'a Pipeline, evaluator: EvaluatorKind, num_folds: usize) -> Self {
        Self {
            pipeline,
            evaluator,
            num_folds,
            param_grid: vec![ParamMap::empty()],
            seed: FOLD_SHUFFLE_SEED,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn num_folds(&self) -> usize {
        self.num_folds
    }

    /// Number of candidate configurations the search evaluates.
    pub fn search_space_size(&self) -> usize {
        self.param_grid.len()
    }

    /// Run the search: score every candidate across the folds, then refit
    /// the best candidate on the full dataset.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &Labels,
    ) -> Result<CrossValidatorModel, TuningError> {
        let rows = features.len();
        if labels.len() != rows {
            return Err(TuningError::LengthMismatch {
                rows,
                labels: labels.len(),
            });
        }
        if self.num_folds < 2 || self.num_folds > rows {
            return Err(TuningError::InvalidFolds {
                folds: self.num_folds,
                rows,
            });
        }
        if self.param_grid.is_empty() {
            return Err(TuningError::EmptyGrid);
        }

        let folds = partition_folds(rows, self.num_folds, self.seed);
        let mut best: Option<(f64, Vec<f64>)> = None;
        // Every candidate map is empty, so each one fits the stages exactly
        // as configured.
        for _params in &self.param_grid {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for holdout in 0..folds.len() {
                let mut train_rows = Vec::with_capacity(rows - folds[holdout].len());
                for (fold_idx, fold) in folds.iter().enumerate() {
                    if fold_idx != holdout {
                        train_rows.extend_from_slice(fold);
                    }
                }
                let train_features = gather(features, &train_rows);
                let train_labels = labels.subset(&train_rows);
                let model = self.pipeline.fit(&train_features, &train_labels)?;

                let holdout_features = gather(features, &folds[holdout]);
                let holdout_labels = labels.subset(&folds[holdout]);
                let predicted = model.predict(&holdout_features);
                fold_scores.push(self.evaluator.evaluate(&holdout_labels, &predicted)?);
            }
            let avg = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            let better = match &best {
                None => true,
                Some((best_avg, _)) => {
                    if self.evaluator.higher_is_better() {
                        avg > *best_avg
                    } else {
                        avg < *best_avg
                    }
                }
            };
            if better {
                best = Some((avg, fold_scores));
            }
        }

        let (avg_score, fold_scores) = best.ok_or(TuningError::EmptyGrid)?;
        let refit = self.pipeline.fit(features, labels)?;
        Ok(CrossValidatorModel {
            best: refit,
            evaluator: self.evaluator,
            fold_scores,
            avg_score,
            search_space_size: self.param_grid.len(),
        })
    }
}

/// Shuffle row indices with a seeded RNG and split them into `num_folds`
/// near-equal chunks. Every row lands in exactly one fold.
fn partition_folds(rows: usize, num_folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = rows / num_folds;
    let extra = rows % num_folds;
    let mut folds = Vec::with_capacity(num_folds);
    let mut start = 0usize;
    for fold_idx in 0..num_folds {
        let len = base + usize::from(fold_idx < extra);
        folds.push(order[start..start + len].to_vec());
        start += len;
    }
    folds
}

fn gather(features: &[Vec<f64>], rows: &[usize]) -> Vec<Vec<f64>> {
    rows.iter().map(|&row| features[row].clone()).collect()
}

/// Result of the cross-validation search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidatorModel {
    /// Best candidate refit on the full dataset.
    pub best: PipelineModel,
    /// Evaluator that produced the fold scores.
    pub evaluator: EvaluatorKind,
    /// Held-out score per fold for the selected candidate.
    pub fold_scores: Vec<f64>,
    /// Mean of the fold scores.
    pub avg_score: f64,
    /// Candidate configurations evaluated by the search.
    pub search_space_size: usize,
}

impl CrossValidatorModel {
    pub fn search_space_size(&self) -> usize {
        self.search_space_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnType, Field, Schema};
    use crate::ml::logreg::LogRegOptions;
    use crate::pipeline::StageConfig;

    fn separable_dataset() -> (Vec<Vec<f64>>, Labels) {
        let mut features = Vec::new();
        let mut indices = Vec::new();
        for idx in 0..25 {
            let jitter = idx as f64 * 0.01;
            features.push(vec![-1.0 - jitter]);
            indices.push(0);
            features.push(vec![1.0 + jitter]);
            indices.push(1);
        }
        (
            features,
            Labels::Classes {
                classes: vec!["neg".into(), "pos".into()],
                indices,
            },
        )
    }

    fn classification_pipeline() -> Pipeline {
        let stages = vec![
            StageConfig::StandardScaler,
            StageConfig::LogisticRegression(LogRegOptions::default()),
        ];
        let schema = Schema {
            fields: vec![
                Field {
                    name: "x".into(),
                    ty: ColumnType::Float,
                },
                Field {
                    name: "label".into(),
                    ty: ColumnType::Str,
                },
            ],
        };
        Pipeline::from_config(&stages, &schema, "label").unwrap()
    }

    #[test]
    fn folds_cover_every_row_exactly_once() {
        let folds = partition_folds(11, 3, 7);
        assert_eq!(folds.len(), 3);
        let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
        let mut seen: Vec<usize> = folds.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn fold_partition_is_deterministic_per_seed() {
        assert_eq!(partition_folds(20, 4, 1), partition_folds(20, 4, 1));
        assert_ne!(partition_folds(20, 4, 1), partition_folds(20, 4, 2));
    }

    #[test]
    fn search_space_is_degenerate() {
        let pipeline = classification_pipeline();
        let cv = CrossValidator::new(&pipeline, EvaluatorKind::Accuracy, 5);
        assert_eq!(cv.search_space_size(), 1);
        assert!(cv.param_grid.iter().all(ParamMap::is_empty));
    }

    #[test]
    fn rejects_invalid_fold_counts() {
        let pipeline = classification_pipeline();
        let (features, labels) = separable_dataset();

        let cv = CrossValidator::new(&pipeline, EvaluatorKind::Accuracy, 1);
        assert!(matches!(
            cv.fit(&features, &labels),
            Err(TuningError::InvalidFolds { folds: 1, .. })
        ));

        let cv = CrossValidator::new(&pipeline, EvaluatorKind::Accuracy, features.len() + 1);
        assert!(matches!(
            cv.fit(&features, &labels),
            Err(TuningError::InvalidFolds { .. })
        ));
    }

    #[test]
    fn fits_and_scores_each_fold() {
        let pipeline = classification_pipeline();
        let (features, labels) = separable_dataset();
        let cv = CrossValidator::new(&pipeline, EvaluatorKind::Accuracy, 5).with_seed(9);
        let model = cv.fit(&features, &labels).unwrap();

        assert_eq!(model.fold_scores.len(), 5);
        assert_eq!(model.search_space_size(), 1);
        assert!(model.avg_score > 0.9, "avg accuracy {}", model.avg_score);
        assert_eq!(model.best.n_stages(), 2);
    }
}
