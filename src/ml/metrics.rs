//! Evaluation metrics and the configurable evaluator descriptor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Labels, Predictions, Task};

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("evaluator {evaluator} expects a {expected:?} task")]
    TaskMismatch {
        evaluator: &'static str,
        expected: Task,
    },
    #[error("prediction count {predictions} does not match label count {labels}")]
    LengthMismatch { predictions: usize, labels: usize },
    #[error("nothing to evaluate")]
    Empty,
}

/// Evaluator selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Accuracy,
    MacroF1,
    Rmse,
    Mae,
}

impl EvaluatorKind {
    pub fn name(self) -> &'static str {
        match self {
            EvaluatorKind::Accuracy => "accuracy",
            EvaluatorKind::MacroF1 => "macro_f1",
            EvaluatorKind::Rmse => "rmse",
            EvaluatorKind::Mae => "mae",
        }
    }

    pub fn task(self) -> Task {
        match self {
            EvaluatorKind::Accuracy | EvaluatorKind::MacroF1 => Task::Classification,
            EvaluatorKind::Rmse | EvaluatorKind::Mae => Task::Regression,
        }
    }

    /// Whether larger metric values indicate a better model.
    pub fn higher_is_better(self) -> bool {
        matches!(self, EvaluatorKind::Accuracy | EvaluatorKind::MacroF1)
    }

    /// Score predictions against ground truth.
    pub fn evaluate(self, truth: &Labels, predicted: &Predictions) -> Result<f64, MetricError> {
        if truth.is_empty() {
            return Err(MetricError::Empty);
        }
        if truth.len() != predicted.len() {
            return Err(MetricError::LengthMismatch {
                predictions: predicted.len(),
                labels: truth.len(),
            });
        }
        let mismatch = MetricError::TaskMismatch {
            evaluator: self.name(),
            expected: self.task(),
        };
        match self {
            EvaluatorKind::Accuracy | EvaluatorKind::MacroF1 => {
                let (Labels::Classes { classes, indices }, Predictions::Classes(pred)) =
                    (truth, predicted)
                else {
                    return Err(mismatch);
                };
                let mut cm = ConfusionMatrix::new(classes.len());
                for (&truth_idx, &pred_idx) in indices.iter().zip(pred.iter()) {
                    cm.add(truth_idx, pred_idx);
                }
                Ok(match self {
                    EvaluatorKind::Accuracy => accuracy(&cm),
                    _ => macro_f1(&cm),
                })
            }
            EvaluatorKind::Rmse | EvaluatorKind::Mae => {
                let (Labels::Values(truth), Predictions::Values(pred)) = (truth, predicted) else {
                    return Err(mismatch);
                };
                Ok(match self {
                    EvaluatorKind::Rmse => rmse(truth, pred),
                    _ => mae(truth, pred),
                })
            }
        }
    }
}

/// Confusion matrix for a `K`-class classifier, row-major `truth * K + predicted`.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    pub n_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth < self.n_classes && predicted < self.n_classes {
            self.counts[truth * self.n_classes + predicted] += 1;
        }
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u64 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Precision/recall/F1 for a single class.
#[derive(Debug, Clone)]
pub struct ClassStats {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|idx| cm.get(idx, idx)).sum();
    correct as f64 / total as f64
}

pub fn per_class_stats(cm: &ConfusionMatrix) -> Vec<ClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut support = 0u64;
        let mut false_neg = 0.0;
        let mut false_pos = 0.0;
        for other in 0..k {
            support += cm.get(class_idx, other);
            if other != class_idx {
                false_neg += cm.get(class_idx, other) as f64;
                false_pos += cm.get(other, class_idx) as f64;
            }
        }
        let precision = safe_ratio(tp, tp + false_pos);
        let recall = safe_ratio(tp, tp + false_neg);
        let f1 = safe_ratio(2.0 * precision * recall, precision + recall);
        stats.push(ClassStats {
            precision,
            recall,
            f1,
            support,
        });
    }
    stats
}

/// Unweighted mean of per-class F1 scores.
pub fn macro_f1(cm: &ConfusionMatrix) -> f64 {
    let stats = per_class_stats(cm);
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(|class| class.f1).sum::<f64>() / stats.len() as f64
}

pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(&t, &p)| (t - p) * (t - p))
        .sum();
    (sum_sq / truth.len() as f64).sqrt()
}

pub fn mae(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let sum_abs: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(&t, &p)| (t - p).abs())
        .sum();
    sum_abs / truth.len() as f64
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_class_cm() -> ConfusionMatrix {
        let mut cm = ConfusionMatrix::new(2);
        // class 0: 3 right, 1 predicted as 1; class 1: 2 right.
        cm.add(0, 0);
        cm.add(0, 0);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        cm.add(1, 1);
        cm
    }

    #[test]
    fn accuracy_counts_diagonal() {
        let cm = two_class_cm();
        assert!((accuracy(&cm) - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn per_class_precision_recall() {
        let cm = two_class_cm();
        let stats = per_class_stats(&cm);
        assert!((stats[0].precision - 1.0).abs() < 1e-12);
        assert!((stats[0].recall - 0.75).abs() < 1e-12);
        assert!((stats[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats[1].recall - 1.0).abs() < 1e-12);
        assert_eq!(stats[0].support, 4);
    }

    #[test]
    fn rmse_and_mae_on_known_values() {
        let truth = [1.0, 2.0, 3.0];
        let predicted = [1.0, 4.0, 3.0];
        assert!((mae(&truth, &predicted) - 2.0 / 3.0).abs() < 1e-12);
        assert!((rmse(&truth, &predicted) - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn evaluator_rejects_task_mismatch() {
        let truth = Labels::Values(vec![1.0, 2.0]);
        let predicted = Predictions::Values(vec![1.0, 2.0]);
        let err = EvaluatorKind::Accuracy.evaluate(&truth, &predicted).unwrap_err();
        assert!(matches!(err, MetricError::TaskMismatch { .. }));
    }

    #[test]
    fn evaluator_scores_regression() {
        let truth = Labels::Values(vec![1.0, 2.0, 3.0]);
        let predicted = Predictions::Values(vec![1.0, 2.0, 3.0]);
        let score = EvaluatorKind::Rmse.evaluate(&truth, &predicted).unwrap();
        assert_eq!(score, 0.0);
    }
}
