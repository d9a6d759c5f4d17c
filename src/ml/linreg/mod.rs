//! Linear regression over tabular feature rows.

use serde::{Deserialize, Serialize};

use super::MlError;

mod train;
pub use train::{LinRegOptions, train_linreg};

/// Fitted linear regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinRegModel {
    /// Feature row width expected by this model.
    pub n_features: usize,
    /// One weight per feature.
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinRegModel {
    pub fn validate(&self) -> Result<(), MlError> {
        if self.weights.len() != self.n_features {
            return Err(MlError::InvalidModel(format!(
                "weights length {} does not match {} features",
                self.weights.len(),
                self.n_features
            )));
        }
        if self.weights.iter().any(|weight| !weight.is_finite()) || !self.bias.is_finite() {
            return Err(MlError::InvalidModel(
                "non-finite weight or bias".to_string(),
            ));
        }
        Ok(())
    }

    /// Predicted value for a feature row.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut sum = self.bias;
        for (weight, &value) in self.weights.iter().zip(features.iter()) {
            sum += weight * value;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_linear_combination() {
        let model = LinRegModel {
            n_features: 2,
            weights: vec![2.0, -1.0],
            bias: 0.5,
        };
        model.validate().unwrap();
        assert!((model.predict(&[1.0, 3.0]) - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_non_finite_weights() {
        let model = LinRegModel {
            n_features: 1,
            weights: vec![f64::NAN],
            bias: 0.0,
        };
        assert!(matches!(model.validate(), Err(MlError::InvalidModel(_))));
    }
}
