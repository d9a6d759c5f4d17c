//! Multinomial logistic regression over tabular feature rows.

use serde::{Deserialize, Serialize};

use super::{MlError, argmax, softmax};

mod train;
pub use train::{LogRegOptions, train_logreg};

/// Fitted logistic regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRegModel {
    /// Ordered class identifiers.
    pub classes: Vec<String>,
    /// Feature row width expected by this model.
    pub n_features: usize,
    /// Row-major `classes x n_features` weights.
    pub weights: Vec<f64>,
    /// Per-class bias terms.
    pub bias: Vec<f64>,
}

impl LogRegModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), MlError> {
        let classes = self.classes.len();
        if classes < 2 {
            return Err(MlError::TooFewClasses(classes));
        }
        if self.weights.len() != classes * self.n_features {
            return Err(MlError::InvalidModel(format!(
                "weights length {} does not match {classes} classes x {} features",
                self.weights.len(),
                self.n_features
            )));
        }
        if self.bias.len() != classes {
            return Err(MlError::InvalidModel(format!(
                "bias length {} does not match {classes} classes",
                self.bias.len()
            )));
        }
        if self
            .weights
            .iter()
            .chain(self.bias.iter())
            .any(|value| !value.is_finite())
        {
            return Err(MlError::InvalidModel(
                "non-finite weight or bias".to_string(),
            ));
        }
        Ok(())
    }

    /// Raw per-class scores for a feature row.
    pub fn logits(&self, features: &[f64]) -> Vec<f64> {
        let classes = self.classes.len();
        let mut logits = Vec::with_capacity(classes);
        for class_idx in 0..classes {
            let base = class_idx * self.n_features;
            let mut sum = self.bias[class_idx];
            for (offset, &value) in features.iter().take(self.n_features).enumerate() {
                sum += self.weights[base + offset] * value;
            }
            logits.push(sum);
        }
        logits
    }

    /// Class probabilities for a feature row.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        softmax(&self.logits(features))
    }

    /// Most likely class index for a feature row.
    pub fn predict_class(&self, features: &[f64]) -> usize {
        argmax(&self.logits(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_built_model_separates_on_one_feature() {
        let model = LogRegModel {
            classes: vec!["neg".into(), "pos".into()],
            n_features: 1,
            weights: vec![-2.0, 2.0],
            bias: vec![0.0, 0.0],
        };
        model.validate().unwrap();
        assert_eq!(model.predict_class(&[-1.0]), 0);
        assert_eq!(model.predict_class(&[1.0]), 1);
        let proba = model.predict_proba(&[1.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_shape_mismatch() {
        let model = LogRegModel {
            classes: vec!["a".into(), "b".into()],
            n_features: 2,
            weights: vec![0.0; 3],
            bias: vec![0.0; 2],
        };
        assert!(matches!(model.validate(), Err(MlError::InvalidModel(_))));
    }

    #[test]
    fn validate_rejects_non_finite_weights() {
        let model = LogRegModel {
            classes: vec!["a".into(), "b".into()],
            n_features: 1,
            weights: vec![f64::NAN, 1.0],
            bias: vec![0.0, 0.0],
        };
        assert!(matches!(model.validate(), Err(MlError::InvalidModel(_))));
    }
}
