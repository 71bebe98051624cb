//! ML model wrapper for Random Forest regression

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use thiserror::Error;

use crate::config::ModelConfig;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Errors that can occur during model training
#[derive(Debug, Clone, Error)]
pub enum TrainingError {
    /// Not enough data to train
    #[error("Insufficient data for training: {0} samples")]
    InsufficientData(usize),

    /// Feature and target arrays have different lengths
    #[error("Feature and target lengths mismatch: {features} vs {targets}")]
    MismatchedLengths { features: usize, targets: usize },

    /// A row does not have the expected number of columns
    #[error("Expected {expected} features per row, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// Error fitting model
    #[error("Model fitting error: {0}")]
    FitError(String),

    /// Error predicting with a fitted model
    #[error("Model prediction error: {0}")]
    PredictError(String),
}

/// Forest hyper-parameters. Fixed per run so results are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
        }
    }
}

impl From<&ModelConfig> for ForestParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            seed: config.seed,
        }
    }
}

impl ForestParams {
    /// Fully grown trees that consider every feature at each split
    fn to_smartcore(self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: None,
            min_samples_leaf: 1,
            min_samples_split: 2,
            n_trees: self.n_trees,
            m: Some(n_features),
            keep_samples: false,
            seed: self.seed,
        }
    }
}

/// A fitted daily-yield regressor together with the input width it expects.
#[derive(Debug, Serialize, Deserialize)]
pub struct YieldModel {
    n_features: usize,
    forest: Forest,
}

fn to_matrix(rows: &[Vec<f64>], n_features: usize) -> Result<DenseMatrix<f64>, TrainingError> {
    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for row in rows {
        if row.len() != n_features {
            return Err(TrainingError::ShapeMismatch {
                expected: n_features,
                found: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }

    Ok(DenseMatrix::new(rows.len(), n_features, flat, false))
}

impl YieldModel {
    /// Train a forest on row-major features
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        params: ForestParams,
    ) -> Result<Self, TrainingError> {
        if features.is_empty() || targets.is_empty() {
            return Err(TrainingError::InsufficientData(0));
        }

        if features.len() != targets.len() {
            return Err(TrainingError::MismatchedLengths {
                features: features.len(),
                targets: targets.len(),
            });
        }

        let n_features = features[0].len();
        let x = to_matrix(features, n_features)?;
        let y = targets.to_vec();

        let forest = RandomForestRegressor::fit(&x, &y, params.to_smartcore(n_features))
            .map_err(|e| TrainingError::FitError(format!("{e:?}")))?;

        Ok(Self { n_features, forest })
    }

    /// Number of input columns
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Predict for multiple rows
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, TrainingError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(rows, self.n_features)?;
        self.forest
            .predict(&x)
            .map_err(|e| TrainingError::PredictError(format!("{e:?}")))
    }

    /// Predict for a single row
    pub fn predict(&self, row: &[f64]) -> Result<f64, TrainingError> {
        let predictions = self.predict_batch(&[row.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| TrainingError::PredictError("empty prediction".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let x = vec![t % 17.0, (t * 0.37).sin() * 10.0, (i % 24) as f64];
                let y = 3.0 * x[0] + x[1] - 0.5 * x[2];
                (x, y)
            })
            .unzip()
    }

    fn small() -> ForestParams {
        ForestParams { n_trees: 10, seed: 42 }
    }

    #[test]
    fn test_forest_params_default() {
        let params = ForestParams::default();
        assert_eq!(params.n_trees, 100);
        assert_eq!(params.seed, 42);
    }

    #[test]
    fn test_forest_params_use_all_features() {
        let params = small().to_smartcore(7);
        assert_eq!(params.m, Some(7));
        assert_eq!(params.n_trees, 10);
        assert_eq!(params.seed, 42);
        assert!(params.max_depth.is_none());
    }

    #[test]
    fn test_train_empty_data() {
        let result = YieldModel::fit(&[], &[], small());
        assert!(matches!(result, Err(TrainingError::InsufficientData(0))));
    }

    #[test]
    fn test_train_mismatched_lengths() {
        let (x, _) = synthetic(10);
        let result = YieldModel::fit(&x, &[1.0; 5], small());

        assert!(matches!(
            result,
            Err(TrainingError::MismatchedLengths {
                features: 10,
                targets: 5
            })
        ));
    }

    #[test]
    fn test_train_ragged_rows() {
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        let result = YieldModel::fit(&x, &[1.0, 2.0], small());

        assert!(matches!(result, Err(TrainingError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_train_and_predict() {
        let (x, y) = synthetic(200);
        let model = YieldModel::fit(&x, &y, small()).unwrap();

        assert_eq!(model.n_features(), 3);

        let predictions = model.predict_batch(&x[..5]).unwrap();
        assert_eq!(predictions.len(), 5);

        // Forest output is an average of training targets
        let (lo, hi) = y.iter().fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        assert!(predictions.iter().all(|p| *p >= lo - 1e-9 && *p <= hi + 1e-9));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = synthetic(120);
        let a = YieldModel::fit(&x, &y, small()).unwrap();
        let b = YieldModel::fit(&x, &y, small()).unwrap();

        assert_eq!(a.predict_batch(&x).unwrap(), b.predict_batch(&x).unwrap());
    }

    #[test]
    fn test_predict_wrong_width() {
        let (x, y) = synthetic(50);
        let model = YieldModel::fit(&x, &y, small()).unwrap();

        assert!(matches!(
            model.predict(&[1.0, 2.0]),
            Err(TrainingError::ShapeMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn test_predict_batch_empty() {
        let (x, y) = synthetic(50);
        let model = YieldModel::fit(&x, &y, small()).unwrap();
        assert!(model.predict_batch(&[]).unwrap().is_empty());
    }
}
