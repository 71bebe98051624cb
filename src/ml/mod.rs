//! Machine Learning module for daily-yield prediction
//!
//! This module trains a Random Forest on merged telemetry and serves
//! predictions from the persisted model, scaler and feature-name list.

pub mod features;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod predictor;
pub mod scaler;
pub mod split;
pub mod training;

pub use features::{FeatureInputs, FeatureVector, PredictionRequest, calendar_features};
pub use model::{ForestParams, TrainingError, YieldModel};
pub use persistence::{ArtifactBundle, ArtifactPaths, PersistenceError};
pub use predictor::{PredictionError, Predictor};
pub use scaler::StandardScaler;
pub use training::{PipelineError, TrainingReport, TrainingResult, train_from_file};
