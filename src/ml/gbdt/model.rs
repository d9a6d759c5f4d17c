use serde::{Deserialize, Serialize};

use crate::ml::{MlError, argmax, softmax};

/// Single-split decision tree used as a weak learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stump {
    /// Feature index used for the split.
    pub feature: usize,
    /// Threshold in feature units.
    pub threshold: f64,
    /// Contribution for `feature <= threshold`.
    pub left: f64,
    /// Contribution for `feature > threshold`.
    pub right: f64,
}

impl Stump {
    pub fn output(&self, features: &[f64]) -> f64 {
        let value = features.get(self.feature).copied().unwrap_or(0.0);
        if value <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// Fitted stump-boosting model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtModel {
    /// Ordered class identifiers.
    pub classes: Vec<String>,
    /// Feature row width expected by this model.
    pub n_features: usize,
    /// Learning rate applied to each stump contribution.
    pub learning_rate: f64,
    /// Initial per-class scores (log class priors).
    pub init_scores: Vec<f64>,
    /// Shape: `[n_rounds][n_classes]`.
    pub rounds: Vec<Vec<Stump>>,
}

impl GbdtModel {
    pub fn validate(&self) -> Result<(), MlError> {
        let classes = self.classes.len();
        if classes < 2 {
            return Err(MlError::TooFewClasses(classes));
        }
        if self.init_scores.len() != classes {
            return Err(MlError::InvalidModel(format!(
                "init_scores length {} does not match {classes} classes",
                self.init_scores.len()
            )));
        }
        for (round_idx, round) in self.rounds.iter().enumerate() {
            if round.len() != classes {
                return Err(MlError::InvalidModel(format!(
                    "round {round_idx} has {} stumps but expected {classes}",
                    round.len()
                )));
            }
        }
        if self.init_scores.iter().any(|score| !score.is_finite()) {
            return Err(MlError::InvalidModel("non-finite init score".to_string()));
        }
        // An infinite threshold is the constant-stump form; NaN never is.
        for round in &self.rounds {
            for stump in round {
                if stump.threshold.is_nan() || !stump.left.is_finite() || !stump.right.is_finite() {
                    return Err(MlError::InvalidModel(format!(
                        "non-finite stump on feature {}",
                        stump.feature
                    )));
                }
            }
        }
        Ok(())
    }

    /// Raw per-class scores for a feature row.
    pub fn scores(&self, features: &[f64]) -> Vec<f64> {
        let mut scores = self.init_scores.clone();
        for round in &self.rounds {
            for (class_idx, stump) in round.iter().enumerate() {
                scores[class_idx] += self.learning_rate * stump.output(features);
            }
        }
        scores
    }

    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        softmax(&self.scores(features))
    }

    pub fn predict_class(&self, features: &[f64]) -> usize {
        argmax(&self.scores(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stump_routes_on_threshold() {
        let stump = Stump {
            feature: 1,
            threshold: 0.5,
            left: -1.0,
            right: 3.0,
        };
        assert_eq!(stump.output(&[9.0, 0.5]), -1.0);
        assert_eq!(stump.output(&[9.0, 0.6]), 3.0);
    }

    #[test]
    fn model_scores_accumulate_rounds() {
        let model = GbdtModel {
            classes: vec!["a".into(), "b".into()],
            n_features: 1,
            learning_rate: 0.5,
            init_scores: vec![0.0, 0.0],
            rounds: vec![vec![
                Stump {
                    feature: 0,
                    threshold: 0.0,
                    left: 2.0,
                    right: -2.0,
                },
                Stump {
                    feature: 0,
                    threshold: 0.0,
                    left: -2.0,
                    right: 2.0,
                },
            ]],
        };
        model.validate().unwrap();
        assert_eq!(model.predict_class(&[-1.0]), 0);
        assert_eq!(model.predict_class(&[1.0]), 1);
    }

    #[test]
    fn validate_rejects_uneven_rounds() {
        let model = GbdtModel {
            classes: vec!["a".into(), "b".into()],
            n_features: 1,
            learning_rate: 0.1,
            init_scores: vec![0.0, 0.0],
            rounds: vec![vec![Stump {
                feature: 0,
                threshold: 0.0,
                left: 0.0,
                right: 0.0,
            }]],
        };
        assert!(matches!(model.validate(), Err(MlError::InvalidModel(_))));
    }

    #[test]
    fn validate_rejects_non_finite_stump_outputs() {
        let model = GbdtModel {
            classes: vec!["a".into(), "b".into()],
            n_features: 1,
            learning_rate: 0.1,
            init_scores: vec![0.0, 0.0],
            rounds: vec![vec![
                Stump {
                    feature: 0,
                    threshold: 0.0,
                    left: f64::NAN,
                    right: 0.0,
                },
                Stump {
                    feature: 0,
                    threshold: 0.0,
                    left: 0.0,
                    right: 0.0,
                },
            ]],
        };
        assert!(matches!(model.validate(), Err(MlError::InvalidModel(_))));
    }
}
