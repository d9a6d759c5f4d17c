use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::LogRegModel;
use crate::ml::{MlError, check_training_inputs, softmax};

/// Training hyperparameters for logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRegOptions {
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
    /// Seed for shuffling and weight init.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_epochs() -> usize {
    30
}

fn default_learning_rate() -> f64 {
    0.1
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

impl Default for LogRegOptions {
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

/// Train a multinomial logistic regression with minibatch SGD.
pub fn train_logreg(
    x: &[Vec<f64>],
    y: &[usize],
    classes: &[String],
    options: &LogRegOptions,
) -> Result<LogRegModel, MlError> {
    let dim = check_training_inputs(x, y.len())?;
    let n_classes = classes.len();
    if n_classes < 2 {
        return Err(MlError::TooFewClasses(n_classes));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut weights = vec![0.0f64; n_classes * dim];
    let mut bias = vec![0.0f64; n_classes];
    for weight in &mut weights {
        *weight = (rng.random::<f64>() - 0.5) * 0.01;
    }

    let batch_size = options.batch_size.max(1);
    let l2 = options.l2.max(0.0);
    let mut order: Vec<usize> = (0..x.len()).collect();

    for _epoch in 0..options.epochs {
        order.shuffle(&mut rng);
        for batch in order.chunks(batch_size) {
            let mut grad_w = vec![0.0f64; weights.len()];
            let mut grad_b = vec![0.0f64; bias.len()];
            let mut used = 0usize;
            for &row_idx in batch {
                let row = &x[row_idx];
                let truth = y[row_idx];
                if truth >= n_classes {
                    continue;
                }
                let mut logits = vec![0.0f64; n_classes];
                for class_idx in 0..n_classes {
                    let base = class_idx * dim;
                    let mut sum = bias[class_idx];
                    for offset in 0..dim {
                        sum += weights[base + offset] * row[offset];
                    }
                    logits[class_idx] = sum;
                }
                let probs = softmax(&logits);
                for class_idx in 0..n_classes {
                    let diff = probs[class_idx] - if class_idx == truth { 1.0 } else { 0.0 };
                    let base = class_idx * dim;
                    for offset in 0..dim {
                        grad_w[base + offset] += diff * row[offset];
                    }
                    grad_b[class_idx] += diff;
                }
                used += 1;
            }
            if used == 0 {
                continue;
            }
            let scale = options.learning_rate / used as f64;
            for (idx, weight) in weights.iter_mut().enumerate() {
                *weight -= scale * grad_w[idx] + options.learning_rate * l2 * *weight;
            }
            for (class_idx, b) in bias.iter_mut().enumerate() {
                *b -= scale * grad_b[class_idx];
            }
        }
    }

    let model = LogRegModel {
        classes: classes.to_vec(),
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
    fn learns_a_linearly_separable_split() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for idx in 0..40 {
            let offset = (idx % 10) as f64 * 0.01;
            x.push(vec![-1.0 - offset, 1.0]);
            y.push(0);
            x.push(vec![1.0 + offset, 1.0]);
            y.push(1);
        }
        let classes = vec!["neg".to_string(), "pos".to_string()];
        let model = train_logreg(&x, &y, &classes, &LogRegOptions::default()).unwrap();
        assert_eq!(model.predict_class(&[-2.0, 1.0]), 0);
        assert_eq!(model.predict_class(&[2.0, 1.0]), 1);
    }

    #[test]
    fn rejects_empty_and_mismatched_input() {
        let classes = vec!["a".to_string(), "b".to_string()];
        let err = train_logreg(&[], &[], &classes, &LogRegOptions::default()).unwrap_err();
        assert!(matches!(err, MlError::EmptyDataset));

        let err = train_logreg(
            &[vec![1.0]],
            &[0, 1],
            &classes,
            &LogRegOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MlError::LengthMismatch { .. }));
    }
}
