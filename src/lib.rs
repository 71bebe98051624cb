//! Solar Yield Library
//!
//! This module exposes the data preparation, training and prediction
//! components of the solar yield pipeline for testing and reuse.

pub mod config;
pub mod dataset;
pub mod ml;
pub mod traits;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use dataset::{DataError, PrepareSummary, TelemetryRecord, prepare};
pub use ml::{
    ArtifactBundle, FeatureInputs, FeatureVector, ForestParams, PredictionError, PredictionRequest,
    Predictor, TrainingReport, train_from_file,
};
pub use traits::{Clock, MockClock, SystemClock};
pub use web::{AppState, FormError, ModelState, router};
