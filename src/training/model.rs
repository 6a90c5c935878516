//! Linear model representation and prediction.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Coefficients fitted in standardized space, paired with the
/// standardization parameters they were fitted under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_means: Vec<f64>,
    pub feature_std: Vec<f64>,
}

impl LinearModel {
    pub fn dimension(&self) -> usize {
        self.coefficients.len()
    }

    /// Standardizes `x` with the model's own means/stds, then applies the coefficients.
    pub fn predict(&self, x: &[f64]) -> PipelineResult<f64> {
        let expected = self.dimension();
        if x.len() != expected
            || self.feature_means.len() != expected
            || self.feature_std.len() != expected
        {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: x.len(),
            });
        }

        let dot: f64 = x
            .iter()
            .zip(&self.feature_means)
            .zip(&self.feature_std)
            .zip(&self.coefficients)
            .map(|(((xi, mean), std), w)| w * (xi - mean) / std)
            .sum();
        Ok(dot + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LinearModel {
        LinearModel {
            coefficients: vec![2.0, -1.0],
            intercept: 10.0,
            feature_means: vec![1.0, 4.0],
            feature_std: vec![0.5, 2.0],
        }
    }

    #[test]
    fn test_predict_standardizes_input() {
        // z = [(2-1)/0.5, (8-4)/2] = [2, 2]; 2*2 - 1*2 + 10 = 12
        let y = model().predict(&[2.0, 8.0]).unwrap();
        assert!((y - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_rejects_wrong_length() {
        let err = model().predict(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch { expected: 2, actual: 3 }
        ));
        assert!(model().predict(&[1.0]).is_err());
        assert_eq!(model().dimension(), 2);
    }
}
