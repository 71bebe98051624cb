//! Model persistence - save and load the trained artifact bundle
//!
//! The bundle is three independently serialized files (model, scaler and
//! feature-name list). They are only meaningful together, so loading checks
//! that all three agree on the number of features.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::model::YieldModel;
use super::scaler::StandardScaler;

pub const MODEL_FILE: &str = "model_daily_yield.bin";
pub const SCALER_FILE: &str = "scaler_daily_yield.bin";
pub const FEATURE_NAMES_FILE: &str = "feature_names.bin";
pub const REPORT_FILE: &str = "training_report.json";

/// Errors that can occur during model persistence
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Model file not found: {0}")]
    FileNotFound(String),

    #[error("IO error on {path}: {message}")]
    IoError { path: String, message: String },

    #[error("Serialization error: {0}")]
    SerializeError(String),

    #[error("Deserialization error in {path}: {message}")]
    DeserializeError { path: String, message: String },

    #[error(
        "Incompatible artifacts: {feature_names} feature names, scaler expects {scaler}, model expects {model}"
    )]
    Incompatible {
        feature_names: usize,
        scaler: usize,
        model: usize,
    },
}

/// File locations of a bundle inside one artifact directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub feature_names: PathBuf,
    pub report: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            feature_names: dir.join(FEATURE_NAMES_FILE),
            report: dir.join(REPORT_FILE),
        }
    }
}

/// The three objects produced by one training run
#[derive(Debug)]
pub struct ArtifactBundle {
    pub model: YieldModel,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
}

fn save_bin<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::IoError {
            path: parent.display().to_string(),
            message: e.to_string(),
        })?;
    }

    let bytes =
        bincode::serialize(value).map_err(|e| PersistenceError::SerializeError(e.to_string()))?;

    fs::write(path, bytes).map_err(|e| PersistenceError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    if !path.exists() {
        return Err(PersistenceError::FileNotFound(path.display().to_string()));
    }

    let bytes = fs::read(path).map_err(|e| PersistenceError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    bincode::deserialize(&bytes).map_err(|e| PersistenceError::DeserializeError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

impl ArtifactBundle {
    /// Reject bundles whose parts disagree on dimensionality
    pub fn check_compatible(&self) -> Result<(), PersistenceError> {
        let names = self.feature_names.len();
        if self.scaler.n_features() != names || self.model.n_features() != names {
            return Err(PersistenceError::Incompatible {
                feature_names: names,
                scaler: self.scaler.n_features(),
                model: self.model.n_features(),
            });
        }
        Ok(())
    }

    /// Write all three artifacts into `dir`
    pub fn save(&self, dir: &Path) -> Result<ArtifactPaths, PersistenceError> {
        let paths = ArtifactPaths::in_dir(dir);

        save_bin(&self.feature_names, &paths.feature_names)?;
        save_bin(&self.model, &paths.model)?;
        save_bin(&self.scaler, &paths.scaler)?;

        Ok(paths)
    }

    /// Load all three artifacts from `dir` and verify they belong together
    pub fn load(dir: &Path) -> Result<Self, PersistenceError> {
        let paths = ArtifactPaths::in_dir(dir);

        let bundle = Self {
            model: load_bin(&paths.model)?,
            scaler: load_bin(&paths.scaler)?,
            feature_names: load_bin(&paths.feature_names)?,
        };
        bundle.check_compatible()?;

        Ok(bundle)
    }
}

/// Write a JSON document next to the artifacts
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PersistenceError::SerializeError(e.to_string()))?;

    fs::write(path, json).map_err(|e| PersistenceError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
