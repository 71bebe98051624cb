//! Inference over a loaded artifact bundle

use std::path::Path;

use thiserror::Error;

use super::features::{FeatureInputs, PredictionRequest};
use super::model::TrainingError;
use super::persistence::{ArtifactBundle, PersistenceError};

/// Errors raised while turning inputs into a prediction
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    /// An input required by the persisted feature list was not supplied
    #[error("Missing feature '{0}' in prediction input")]
    MissingFeature(String),

    #[error(transparent)]
    Model(#[from] TrainingError),
}

/// Loaded artifact bundle, ready to predict.
///
/// Immutable after load; share it behind an `Arc`.
#[derive(Debug)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    /// Load and validate the artifacts in `dir`
    pub fn load(dir: &Path) -> Result<Self, PersistenceError> {
        let bundle = ArtifactBundle::load(dir)?;
        tracing::info!(
            "Loaded model from {} ({} features)",
            dir.display(),
            bundle.feature_names.len()
        );
        Ok(Self { bundle })
    }

    /// Wrap an in-memory bundle after the same compatibility check `load` does
    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self, PersistenceError> {
        bundle.check_compatible()?;
        Ok(Self { bundle })
    }

    /// Feature names in the order the model expects
    pub fn feature_names(&self) -> &[String] {
        &self.bundle.feature_names
    }

    /// Predict from named inputs.
    ///
    /// Values are taken in persisted feature order; a missing name fails
    /// rather than shifting columns.
    pub fn predict(&self, inputs: &FeatureInputs) -> Result<f64, PredictionError> {
        let row = self.feature_row(inputs)?;

        let scaled = self.bundle.scaler.transform_row(&row)?;
        let prediction = self.bundle.model.predict(&scaled)?;

        tracing::debug!(?row, prediction, "predicted daily yield");
        Ok(prediction)
    }

    /// Unscaled model input row assembled in persisted feature order
    pub fn feature_row(&self, inputs: &FeatureInputs) -> Result<Vec<f64>, PredictionError> {
        inputs
            .ordered(&self.bundle.feature_names)
            .map_err(PredictionError::MissingFeature)
    }

    pub fn predict_request(&self, request: &PredictionRequest) -> Result<f64, PredictionError> {
        self.predict(&request.to_inputs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::FeatureVector;
    use crate::ml::model::{ForestParams, YieldModel};
    use crate::ml::scaler::StandardScaler;
    use chrono::NaiveDate;

    fn create_test_bundle() -> ArtifactBundle {
        let x: Vec<Vec<f64>> = (0..120)
            .map(|i| {
                let t = i as f64;
                vec![
                    1000.0 + (t * 37.0) % 5000.0,
                    900.0 + (t * 31.0) % 4800.0,
                    20.0 + t % 15.0,
                    25.0 + t % 30.0,
                    (t * 0.13).sin().abs(),
                    (i % 24) as f64,
                    130.0 + (i / 24) as f64,
                ]
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] * 0.5 + r[5] * 100.0).collect();

        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();
        let model = YieldModel::fit(&scaled, &y, ForestParams { n_trees: 10, seed: 42 }).unwrap();

        ArtifactBundle {
            model,
            scaler,
            feature_names: FeatureVector::feature_names(),
        }
    }

    fn reference_request() -> PredictionRequest {
        PredictionRequest {
            dc_power: 4700.0,
            ac_power: 4500.0,
            ambient_temperature: 32.0,
            module_temperature: 38.0,
            irradiation: 800.0,
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 26)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let predictor = Predictor::from_bundle(create_test_bundle()).unwrap();
        let request = reference_request();

        let first = predictor.predict_request(&request).unwrap();
        for _ in 0..10 {
            let again = predictor.predict_request(&request).unwrap();
            assert_eq!(first.to_bits(), again.to_bits());
        }
    }

    #[test]
    fn test_missing_feature_fails() {
        let predictor = Predictor::from_bundle(create_test_bundle()).unwrap();
        let mut inputs = reference_request().to_inputs();
        inputs.remove("IRRADIATION");

        let result = predictor.predict(&inputs);

        assert!(matches!(
            result,
            Err(PredictionError::MissingFeature(name)) if name == "IRRADIATION"
        ));
    }

    #[test]
    fn test_extra_inputs_are_ignored() {
        let predictor = Predictor::from_bundle(create_test_bundle()).unwrap();
        let inputs = reference_request().to_inputs();
        let mut with_extra = inputs.clone();
        with_extra.set("FEELS_LIKE", 35.0);

        assert_eq!(
            predictor.predict(&inputs).unwrap(),
            predictor.predict(&with_extra).unwrap()
        );
    }

    #[test]
    fn test_feature_order_follows_persisted_list() {
        let mut bundle = create_test_bundle();
        bundle.feature_names.reverse();
        let reversed = Predictor::from_bundle(bundle).unwrap();
        let normal = Predictor::from_bundle(create_test_bundle()).unwrap();
        let inputs = reference_request().to_inputs();

        let normal_row = normal.feature_row(&inputs).unwrap();
        let reversed_row = reversed.feature_row(&inputs).unwrap();

        assert_eq!(
            normal_row,
            vec![4700.0, 4500.0, 32.0, 38.0, 800.0, 14.0, 177.0]
        );
        let mut expected = normal_row.clone();
        expected.reverse();
        assert_eq!(reversed_row, expected);
    }

    #[test]
    fn test_feature_row_missing_feature() {
        let predictor = Predictor::from_bundle(create_test_bundle()).unwrap();
        let mut inputs = reference_request().to_inputs();
        inputs.remove("HOUR");

        assert!(matches!(
            predictor.feature_row(&inputs),
            Err(PredictionError::MissingFeature(name)) if name == "HOUR"
        ));
    }

    #[test]
    fn test_incompatible_bundle_rejected() {
        let mut bundle = create_test_bundle();
        bundle.feature_names.pop();

        assert!(matches!(
            Predictor::from_bundle(bundle),
            Err(PersistenceError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_load_roundtrip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = create_test_bundle();
        bundle.save(dir.path()).unwrap();
        let in_memory = Predictor::from_bundle(bundle).unwrap();

        let loaded = Predictor::load(dir.path()).unwrap();
        let request = reference_request();

        assert_eq!(
            loaded.predict_request(&request).unwrap(),
            in_memory.predict_request(&request).unwrap()
        );
    }

    #[test]
    fn test_load_missing_dir() {
        let result = Predictor::load(Path::new("/nonexistent/model"));
        assert!(matches!(result, Err(PersistenceError::FileNotFound(_))));
    }
}
