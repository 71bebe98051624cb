//! Training pipeline for the daily-yield model

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::dataset::{self, DataError, TelemetryRecord};

use super::features::{FeatureVector, to_training_matrix};
use super::metrics::{mean_squared_error, r2_score};
use super::model::{ForestParams, TrainingError, YieldModel};
use super::persistence::{ArtifactBundle, ArtifactPaths, PersistenceError, save_json};
use super::scaler::StandardScaler;
use super::split::{CV_FOLDS, TRAIN_FRACTION, chronological_split_index, forward_chaining_folds};

/// Any failure of the `train` step
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Scores and sizes of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_trees: usize,
    pub seed: u64,
    pub train_r2: f64,
    pub test_r2: f64,
    pub test_mse: f64,
    pub cv_r2_scores: Vec<f64>,
    pub cv_r2_mean: f64,
    pub feature_names: Vec<String>,
}

impl TrainingReport {
    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Train R²: {:.4}\nTest R²: {:.4}\nTest MSE: {:.2}\nAvg TimeSeries CV R²: {:.4}",
            self.train_r2, self.test_r2, self.test_mse, self.cv_r2_mean
        )
    }
}

/// Result of a training run
#[derive(Debug)]
pub struct TrainingResult {
    pub bundle: ArtifactBundle,
    pub report: TrainingReport,
}

/// R² of each forward-chaining fold, refitting a fresh forest per fold.
pub fn cross_validate(
    features: &[Vec<f64>],
    targets: &[f64],
    params: ForestParams,
    n_splits: usize,
) -> Result<Vec<f64>, TrainingError> {
    if features.len() != targets.len() {
        return Err(TrainingError::MismatchedLengths {
            features: features.len(),
            targets: targets.len(),
        });
    }

    forward_chaining_folds(features.len(), n_splits)?
        .into_iter()
        .enumerate()
        .map(|(i, fold)| {
            let model = YieldModel::fit(
                &features[fold.train.clone()],
                &targets[fold.train.clone()],
                params,
            )?;
            let predictions = model.predict_batch(&features[fold.test.clone()])?;
            let score = r2_score(&targets[fold.test.clone()], &predictions);
            tracing::debug!(fold = i, train = fold.train.len(), test = fold.test.len(), score, "CV fold");
            Ok(score)
        })
        .collect()
}

/// Train on already-loaded telemetry.
///
/// The scaler is fit on every row before the chronological split, so test-set
/// statistics reach the training features.
pub fn train_on_records(
    records: &[TelemetryRecord],
    params: ForestParams,
) -> Result<TrainingResult, TrainingError> {
    let n = records.len();
    let split = chronological_split_index(n, TRAIN_FRACTION);
    if split == 0 || split == n {
        return Err(TrainingError::InsufficientData(n));
    }

    let (features, targets) = to_training_matrix(records);
    let (scaler, scaled) = StandardScaler::fit_transform(&features)?;

    let (x_train, x_test) = scaled.split_at(split);
    let (y_train, y_test) = targets.split_at(split);

    tracing::info!("Training forest on {} rows ({} held out)", x_train.len(), x_test.len());
    let model = YieldModel::fit(x_train, y_train, params)?;

    let train_pred = model.predict_batch(x_train)?;
    let test_pred = model.predict_batch(x_test)?;

    let train_r2 = r2_score(y_train, &train_pred);
    let test_r2 = r2_score(y_test, &test_pred);
    let test_mse = mean_squared_error(y_test, &test_pred);

    let cv_r2_scores = cross_validate(&scaled, &targets, params, CV_FOLDS)?;
    let cv_r2_mean = cv_r2_scores.iter().sum::<f64>() / cv_r2_scores.len() as f64;

    let feature_names = FeatureVector::feature_names();

    let report = TrainingReport {
        trained_at: Utc::now(),
        n_samples: n,
        n_train: x_train.len(),
        n_test: x_test.len(),
        n_trees: params.n_trees,
        seed: params.seed,
        train_r2,
        test_r2,
        test_mse,
        cv_r2_scores,
        cv_r2_mean,
        feature_names: feature_names.clone(),
    };

    Ok(TrainingResult {
        bundle: ArtifactBundle {
            model,
            scaler,
            feature_names,
        },
        report,
    })
}

/// Load the prepared file, train, and persist the artifact bundle.
pub fn train_from_file(
    prepared_csv: &Path,
    artifact_dir: &Path,
    params: ForestParams,
) -> Result<TrainingReport, PipelineError> {
    tracing::info!("Loading dataset from {}", prepared_csv.display());
    let records = dataset::load_prepared(prepared_csv)?;
    tracing::info!("Loaded {} rows", records.len());

    let TrainingResult { bundle, report } = train_on_records(&records, params)?;

    tracing::info!(
        train_r2 = report.train_r2,
        test_r2 = report.test_r2,
        test_mse = report.test_mse,
        cv_r2 = report.cv_r2_mean,
        "Training finished"
    );

    let paths = bundle.save(artifact_dir)?;
    for (i, name) in bundle.feature_names.iter().enumerate() {
        tracing::debug!("feature {}: {}", i + 1, name);
    }
    save_json(&report, &ArtifactPaths::in_dir(artifact_dir).report)?;
    tracing::info!("Model and scaler saved in {}", paths.model.parent().unwrap_or(artifact_dir).display());

    Ok(report)
}
