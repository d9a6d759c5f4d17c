use serde::{Deserialize, Serialize};

use super::model::{GbdtModel, Stump};
use crate::ml::{MlError, check_training_inputs, softmax};

/// Training hyperparameters for stump boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtOptions {
    /// Number of boosting rounds.
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Learning rate applied per round.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Histogram bins used for split search.
    #[serde(default = "default_bins")]
    pub bins: usize,
}

fn default_rounds() -> usize {
    50
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_bins() -> usize {
    16
}

impl Default for GbdtOptions {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            learning_rate: default_learning_rate(),
            bins: default_bins(),
        }
    }
}

/// Train a multi-class stump model with softmax gradient boosting.
pub fn train_gbdt(
    x: &[Vec<f64>],
    y: &[usize],
    classes: &[String],
    options: &GbdtOptions,
) -> Result<GbdtModel, MlError> {
    let dim = check_training_inputs(x, y.len())?;
    let n_classes = classes.len();
    if n_classes < 2 {
        return Err(MlError::TooFewClasses(n_classes));
    }

    let bins = options.bins.clamp(2, 256);
    let ranges = feature_ranges(x, dim);
    let binned = bin_rows(x, &ranges, bins);

    let init_scores = log_priors(y, n_classes);
    let mut scores = vec![init_scores.clone(); x.len()];
    let mut rounds = Vec::with_capacity(options.rounds);

    for _round in 0..options.rounds {
        let probs: Vec<Vec<f64>> = scores.iter().map(|row| softmax(row)).collect();
        let mut round_stumps = Vec::with_capacity(n_classes);
        for class_idx in 0..n_classes {
            let residuals: Vec<f64> = y
                .iter()
                .zip(probs.iter())
                .map(|(&truth, prob)| {
                    let target = if truth == class_idx { 1.0 } else { 0.0 };
                    target - prob[class_idx]
                })
                .collect();
            let stump = fit_stump(&binned, &ranges, bins, &residuals);
            for (row_scores, row) in scores.iter_mut().zip(x.iter()) {
                row_scores[class_idx] += options.learning_rate * stump.output(row);
            }
            round_stumps.push(stump);
        }
        rounds.push(round_stumps);
    }

    let model = GbdtModel {
        classes: classes.to_vec(),
        n_features: dim,
        learning_rate: options.learning_rate,
        init_scores,
        rounds,
    };
    model.validate()?;
    Ok(model)
}

fn log_priors(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &truth in y {
        if truth < n_classes {
            counts[truth] += 1;
        }
    }
    let total = y.len().max(1) as f64;
    counts
        .into_iter()
        .map(|count| (count as f64 / total).max(1e-6).ln())
        .collect()
}

/// Per-feature `(min, max)` over finite values, widened when degenerate.
fn feature_ranges(x: &[Vec<f64>], dim: usize) -> Vec<(f64, f64)> {
    let mut ranges = vec![(f64::INFINITY, f64::NEG_INFINITY); dim];
    for row in x {
        for (feature, &value) in row.iter().take(dim).enumerate() {
            if value.is_finite() {
                let (min, max) = &mut ranges[feature];
                *min = min.min(value);
                *max = max.max(value);
            }
        }
    }
    for (min, max) in &mut ranges {
        if !min.is_finite() || !max.is_finite() {
            *min = 0.0;
            *max = 0.0;
        }
        if min == max {
            *max = *min + 1.0;
        }
    }
    ranges
}

fn bin_value(value: f64, min: f64, max: f64, bins: usize) -> usize {
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    ((t * bins as f64) as usize).min(bins - 1)
}

fn bin_rows(x: &[Vec<f64>], ranges: &[(f64, f64)], bins: usize) -> Vec<Vec<u16>> {
    x.iter()
        .map(|row| {
            ranges
                .iter()
                .enumerate()
                .map(|(feature, &(min, max))| {
                    let value = row.get(feature).copied().unwrap_or(0.0);
                    bin_value(value, min, max, bins) as u16
                })
                .collect()
        })
        .collect()
}

/// Fit the stump minimizing squared residual error, using histogram sums.
///
/// The split score maximizes `sum_l^2/n_l + sum_r^2/n_r`, which is equivalent
/// to minimizing the two-sided SSE; leaf values are the residual means on
/// each side, read off the same histogram.
fn fit_stump(binned: &[Vec<u16>], ranges: &[(f64, f64)], bins: usize, residuals: &[f64]) -> Stump {
    let mut best: Option<(f64, Stump)> = None;

    for (feature, &(min, max)) in ranges.iter().enumerate() {
        let mut counts = vec![0u32; bins];
        let mut sums = vec![0.0f64; bins];
        for (row, &residual) in binned.iter().zip(residuals.iter()) {
            let bin = row[feature] as usize;
            counts[bin] += 1;
            sums[bin] += residual;
        }
        let total_count: u32 = counts.iter().sum();
        let total_sum: f64 = sums.iter().sum();

        let mut left_count = 0u32;
        let mut left_sum = 0.0f64;
        for split_bin in 0..bins - 1 {
            left_count += counts[split_bin];
            left_sum += sums[split_bin];
            let right_count = total_count - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let gain = left_sum * left_sum / left_count as f64
                + right_sum * right_sum / right_count as f64;
            if best.as_ref().is_none_or(|(best_gain, _)| gain > *best_gain) {
                let threshold = min + ((split_bin + 1) as f64 / bins as f64) * (max - min);
                best = Some((
                    gain,
                    Stump {
                        feature,
                        threshold,
                        left: left_sum / left_count as f64,
                        right: right_sum / right_count as f64,
                    },
                ));
            }
        }
    }

    // No usable split (e.g. all rows identical): emit a constant stump.
    best.map(|(_, stump)| stump).unwrap_or_else(|| {
        let n = residuals.len().max(1) as f64;
        Stump {
            feature: 0,
            threshold: f64::INFINITY,
            left: residuals.iter().sum::<f64>() / n,
            right: 0.0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_clusters() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for idx in 0..20 {
            let jitter = idx as f64 * 0.01;
            x.push(vec![-1.0 - jitter, 0.5]);
            y.push(0);
            x.push(vec![1.0 + jitter, 0.5]);
            y.push(1);
        }
        let classes = vec!["low".to_string(), "high".to_string()];
        let model = train_gbdt(&x, &y, &classes, &GbdtOptions::default()).unwrap();
        assert_eq!(model.predict_class(&[-1.5, 0.5]), 0);
        assert_eq!(model.predict_class(&[1.5, 0.5]), 1);
    }

    #[test]
    fn constant_features_fall_back_to_constant_stumps() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![0, 1, 0, 1];
        let classes = vec!["a".to_string(), "b".to_string()];
        let options = GbdtOptions {
            rounds: 3,
            ..GbdtOptions::default()
        };
        // Must terminate and validate even though no split has gain.
        let model = train_gbdt(&x, &y, &classes, &options).unwrap();
        assert_eq!(model.rounds.len(), 3);
    }

    #[test]
    fn bin_value_clamps_to_range() {
        assert_eq!(bin_value(-10.0, 0.0, 1.0, 8), 0);
        assert_eq!(bin_value(10.0, 0.0, 1.0, 8), 7);
        assert_eq!(bin_value(0.5, 0.0, 1.0, 8), 4);
    }
}
