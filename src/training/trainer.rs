//! Batch gradient descent for L2-regularized linear regression.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metrics::{evaluate, FitMetrics};
use super::model::LinearModel;
use super::scaler::Standardizer;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty strength.
    pub l2: f64,
    /// Epochs without an RMSE improvement larger than `min_delta` before stopping.
    pub patience: usize,
    pub min_delta: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 1500,
            learning_rate: 0.02,
            l2: 0.001,
            patience: 50,
            min_delta: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingOutcome {
    pub model: LinearModel,
    pub metrics: FitMetrics,
    pub epochs_run: usize,
    /// MSE plus the L2 term at the retained weights.
    pub loss: f64,
}

struct Snapshot {
    rmse: f64,
    loss: f64,
    weights: Array1<f64>,
    bias: f64,
}

/// Fits a linear model to `features`/`labels`.
///
/// Every row must have the same length. Metrics are computed on the
/// training rows themselves.
pub fn train_linear(
    features: &[Vec<f64>],
    labels: &[f64],
    config: &TrainerConfig,
) -> PipelineResult<TrainingOutcome> {
    if features.is_empty() || labels.is_empty() {
        return Err(PipelineError::Training("no training rows supplied".to_string()));
    }
    if features.len() != labels.len() {
        return Err(PipelineError::Training(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    let n_features = features[0].len();
    if let Some(bad) = features.iter().find(|row| row.len() != n_features) {
        return Err(PipelineError::DimensionMismatch {
            expected: n_features,
            actual: bad.len(),
        });
    }
    if labels.iter().any(|y| !y.is_finite()) {
        return Err(PipelineError::Training("labels must be finite".to_string()));
    }

    let n = features.len();
    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    let x = Array2::from_shape_vec((n, n_features), flat)
        .map_err(|e| PipelineError::Training(e.to_string()))?;
    let y = Array1::from(labels.to_vec());

    let scaler = Standardizer::fit(&x);
    let xs = scaler.transform(&x);

    let n_f = n as f64;
    let lr = config.learning_rate;
    let mut weights = Array1::<f64>::zeros(n_features);
    let mut bias = 0.0;
    let mut best = Snapshot {
        rmse: f64::INFINITY,
        loss: f64::INFINITY,
        weights: weights.clone(),
        bias,
    };
    let mut stale = 0usize;
    let mut epochs_run = 0usize;

    for epoch in 0..config.epochs {
        epochs_run = epoch + 1;

        let residual = xs.dot(&weights) + bias - &y;
        let mse = residual.mapv(|r| r * r).sum() / n_f;
        let rmse = mse.sqrt();
        if !rmse.is_finite() {
            warn!(epoch, "Gradient descent diverged, keeping best weights seen");
            break;
        }

        if rmse < best.rmse - config.min_delta {
            best = Snapshot {
                rmse,
                loss: mse + config.l2 * weights.mapv(|w| w * w).sum(),
                weights: weights.clone(),
                bias,
            };
            stale = 0;
        } else {
            stale += 1;
            if stale > config.patience {
                debug!(epoch, rmse = best.rmse, "Early stopping");
                break;
            }
        }

        let grad_w = xs.t().dot(&residual) * (2.0 / n_f) + &weights * (2.0 * config.l2 / n_f);
        let grad_b = 2.0 * residual.sum() / n_f;
        weights.scaled_add(-lr, &grad_w);
        bias -= lr * grad_b;
    }

    if !best.rmse.is_finite() {
        return Err(PipelineError::Training(
            "gradient descent produced no finite fit".to_string(),
        ));
    }

    let model = LinearModel {
        coefficients: best.weights.to_vec(),
        intercept: best.bias,
        feature_means: scaler.means,
        feature_std: scaler.stds,
    };
    let metrics = evaluate(&model, features, labels)?;
    info!(
        rows = n,
        epochs_run,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        loss = best.loss,
        "Linear model fitted"
    );

    Ok(TrainingOutcome {
        model,
        metrics,
        epochs_run,
        loss: best.loss,
    })
}
