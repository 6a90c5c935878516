//! Fit metrics.

use serde::{Deserialize, Serialize};

use super::model::LinearModel;
use crate::error::PipelineResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FitMetrics {
    pub rmse: f64,
    pub r2: f64,
}

pub fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    debug_assert_eq!(predicted.len(), actual.len());
    if actual.is_empty() {
        return 0.0;
    }
    let sse: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    (sse / actual.len() as f64).sqrt()
}

/// Coefficient of determination. Returns 0 when the labels have no variance.
pub fn r_squared(predicted: &[f64], actual: &[f64]) -> f64 {
    debug_assert_eq!(predicted.len(), actual.len());
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

/// Scores `model` against labelled rows.
pub fn evaluate(model: &LinearModel, features: &[Vec<f64>], labels: &[f64]) -> PipelineResult<FitMetrics> {
    let predicted = features
        .iter()
        .map(|row| model.predict(row))
        .collect::<PipelineResult<Vec<f64>>>()?;
    Ok(FitMetrics {
        rmse: rmse(&predicted, labels),
        r2: r_squared(&predicted, labels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&y, &y), 0.0);
        assert_eq!(r_squared(&y, &y), 1.0);
    }

    #[test]
    fn test_known_values() {
        let predicted = [2.5, 0.0, 2.0, 8.0];
        let actual = [3.0, -0.5, 2.0, 7.0];
        // sse = 0.25 + 0.25 + 0 + 1 = 1.5
        assert!((rmse(&predicted, &actual) - (1.5f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((r_squared(&predicted, &actual) - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        let actual = [1.0, 2.0, 3.0];
        assert!(r_squared(&[2.0, 2.0, 2.0], &actual).abs() < 1e-12);
    }
}
