use rand::rngs::StdRng;
use rand::{SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::LinRegModel;
use crate::ml::{MlError, check_training_inputs};

/// Training hyperparameters for linear regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinRegOptions {
    /// Passes over the shuffled training set.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Step size for gradient updates.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// L2 penalty applied to weights.
    #[serde(default = "default_l2")]
    pub l2: f64,
    /// Minibatch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seed used for shuffling.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_epochs() -> usize {
    100
}

fn default_learning_rate() -> f64 {
    0.05
}

fn default_l2() -> f64 {
    1e-4
}

fn default_batch_size() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

impl Default for LinRegOptions {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            l2: default_l2(),
            batch_size: default_batch_size(),
            seed: default_seed(),
        }
    }
}

/// Train a least-squares linear model with minibatch SGD.
pub fn train_linreg(
    x: &[Vec<f64>],
    y: &[f64],
    options: &LinRegOptions,
) -> Result<LinRegModel, MlError> {
    let dim = check_training_inputs(x, y.len())?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut weights = vec![0.0f64; dim];
    let mut bias = 0.0f64;
    let batch_size = options.batch_size.max(1);
    let l2 = options.l2.max(0.0);
    let mut order: Vec<usize> = (0..x.len()).collect();

    for _epoch in 0..options.epochs {
        order.shuffle(&mut rng);
        for batch in order.chunks(batch_size) {
            let mut grad_w = vec![0.0f64; dim];
            let mut grad_b = 0.0f64;
            for &row_idx in batch {
                let row = &x[row_idx];
                let error = {
                    let mut sum = bias;
                    for (weight, &value) in weights.iter().zip(row.iter()) {
                        sum += weight * value;
                    }
                    sum - y[row_idx]
                };
                for (grad, &value) in grad_w.iter_mut().zip(row.iter()) {
                    *grad += error * value;
                }
                grad_b += error;
            }
            let scale = options.learning_rate / batch.len() as f64;
            for (weight, grad) in weights.iter_mut().zip(grad_w.iter()) {
                *weight -= scale * grad + options.learning_rate * l2 * *weight;
            }
            bias -= scale * grad_b;
        }
    }

    let model = LinRegModel {
        n_features: dim,
        weights,
        bias,
    };
    model.validate()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_linear_relationship() {
        // y = 3x + 1 over a small grid.
        let x: Vec<Vec<f64>> = (0..50).map(|idx| vec![idx as f64 / 25.0]).collect();
        let y: Vec<f64> = x.iter().map(|row| 3.0 * row[0] + 1.0).collect();
        let model = train_linreg(&x, &y, &LinRegOptions::default()).unwrap();
        assert!((model.weights[0] - 3.0).abs() < 0.2);
        assert!((model.bias - 1.0).abs() < 0.2);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = train_linreg(
            &[vec![1.0, 2.0], vec![1.0]],
            &[1.0, 2.0],
            &LinRegOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MlError::RaggedRow { .. }));
    }
}
