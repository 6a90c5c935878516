//! Per-column standardization.

use ndarray::{Array2, Axis};

/// Column means and population standard deviations fitted on a training matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub means: Vec<f64>,
    /// Zero deviations are stored as 1 so constant columns map to 0.
    pub stds: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n_cols = x.ncols();
        let means = x
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_else(|| vec![0.0; n_cols]);
        let stds = x
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|s| if *s > 0.0 && s.is_finite() { *s } else { 1.0 })
            .collect();
        Self { means, stds }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for ((v, m), s) in row.iter_mut().zip(&self.means).zip(&self.stds) {
                *v = (*v - m) / s;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 100.0], [2.0, 200.0], [3.0, 300.0], [4.0, 400.0]];
        let scaler = Standardizer::fit(&x);
        assert_eq!(scaler.means, vec![2.5, 250.0]);

        let z = scaler.transform(&x);
        for col in z.columns() {
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_std_floored() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = Standardizer::fit(&x);
        assert_eq!(scaler.stds[0], 1.0);
        let z = scaler.transform(&x);
        assert!(z.column(0).iter().all(|v| *v == 0.0));
    }
}
