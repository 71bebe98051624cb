//! Per-column standardization (zero mean, unit variance)

use serde::{Deserialize, Serialize};

use super::model::TrainingError;

/// Fitted column means and scales.
///
/// Scales are population standard deviations; a constant column gets a scale
/// of 1.0 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major matrix
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, TrainingError> {
        let Some(first) = rows.first() else {
            return Err(TrainingError::InsufficientData(0));
        };
        let n_features = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(TrainingError::ShapeMismatch {
                expected: n_features,
                found: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; n_features];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut variances = vec![0.0; n_features];
        for row in rows {
            for ((var, v), m) in variances.iter_mut().zip(row).zip(&means) {
                *var += (v - m).powi(2);
            }
        }

        let scales = variances
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON { std } else { 1.0 }
            })
            .collect();

        Ok(Self { means, scales })
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Standardize a single row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, TrainingError> {
        if row.len() != self.n_features() {
            return Err(TrainingError::ShapeMismatch {
                expected: self.n_features(),
                found: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, TrainingError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>), TrainingError> {
        let scaler = Self::fit(rows)?;
        let scaled = scaler.transform(rows)?;
        Ok((scaler, scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_means_and_population_std() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];

        let scaler = StandardScaler::fit(&rows).unwrap();

        assert_relative_eq!(scaler.means()[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.means()[1], 20.0, epsilon = 1e-12);
        // sqrt(2/3), not the sample std sqrt(1)
        assert_relative_eq!(scaler.scales()[0], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_transformed_columns_are_standardized() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64 * 3.0 + 7.0, (i as f64).sin() * 100.0])
            .collect();

        let (_, scaled) = StandardScaler::fit_transform(&rows).unwrap();

        for col in 0..2 {
            let values: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
            assert_relative_eq!(var, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0]];

        let (scaler, scaled) = StandardScaler::fit_transform(&rows).unwrap();

        assert_eq!(scaler.scales(), &[1.0]);
        assert!(scaled.iter().all(|r| r[0] == 0.0));
    }

    #[test]
    fn test_fit_empty() {
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(TrainingError::InsufficientData(0))
        ));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            StandardScaler::fit(&rows),
            Err(TrainingError::ShapeMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_transform_wrong_width() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
    }
}
