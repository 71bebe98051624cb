//! Feature extraction for yield predictions
//!
//! Turns merged telemetry rows (and ad-hoc prediction requests) into the
//! fixed-order feature vectors the scaler and forest are trained on.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::dataset::TelemetryRecord;

/// Hour of day and day of year derived from a timestamp.
pub fn calendar_features(ts: &NaiveDateTime) -> (u32, u32) {
    (ts.hour(), ts.ordinal())
}

/// Model inputs for a single observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub dc_power: f64,
    pub ac_power: f64,
    pub ambient_temperature: f64,
    pub module_temperature: f64,
    pub irradiation: f64,
    pub hour: f64,
    pub day: f64,
}

impl FeatureVector {
    /// Number of features
    pub const NUM_FEATURES: usize = 7;

    /// Column names in model order
    pub const NAMES: [&'static str; Self::NUM_FEATURES] = [
        "DC_POWER",
        "AC_POWER",
        "AMBIENT_TEMPERATURE",
        "MODULE_TEMPERATURE",
        "IRRADIATION",
        "HOUR",
        "DAY",
    ];

    /// Feature names as owned strings, the form that gets persisted
    pub fn feature_names() -> Vec<String> {
        Self::NAMES.iter().map(|s| s.to_string()).collect()
    }

    /// Convert features to a vector for the ML model
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.dc_power,
            self.ac_power,
            self.ambient_temperature,
            self.module_temperature,
            self.irradiation,
            self.hour,
            self.day,
        ]
    }

    /// Same values keyed by column name
    pub fn to_inputs(&self) -> FeatureInputs {
        FeatureInputs::from_pairs(Self::NAMES.iter().copied().zip(self.to_vec()))
    }
}

impl From<&TelemetryRecord> for FeatureVector {
    fn from(record: &TelemetryRecord) -> Self {
        let (hour, day) = calendar_features(&record.timestamp);
        Self {
            dc_power: record.dc_power,
            ac_power: record.ac_power,
            ambient_temperature: record.ambient_temperature,
            module_temperature: record.module_temperature,
            irradiation: record.irradiation,
            hour: f64::from(hour),
            day: f64::from(day),
        }
    }
}

/// Split merged telemetry into a feature matrix and the `DAILY_YIELD` target.
///
/// `PLANT_ID` and `TOTAL_YIELD` never reach the matrix; the latter is
/// cumulative and would leak the target.
pub fn to_training_matrix(records: &[TelemetryRecord]) -> (Vec<Vec<f64>>, Vec<f64>) {
    records
        .iter()
        .map(|r| (FeatureVector::from(r).to_vec(), r.daily_yield))
        .unzip()
}

/// Named feature values supplied for a prediction.
///
/// The model only sees them after they are ordered by the persisted
/// feature-name list, so extra keys are harmless and missing keys are errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureInputs {
    values: HashMap<String, f64>,
}

impl FeatureInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Values ordered by `names`; returns the first missing name on failure.
    pub fn ordered(&self, names: &[String]) -> Result<Vec<f64>, String> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| name.clone()))
            .collect()
    }
}

/// A manually entered observation, as taken by the form and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub dc_power: f64,
    pub ac_power: f64,
    pub ambient_temperature: f64,
    pub module_temperature: f64,
    pub irradiation: f64,
    pub timestamp: NaiveDateTime,
}

impl PredictionRequest {
    pub fn features(&self) -> FeatureVector {
        let (hour, day) = calendar_features(&self.timestamp);
        FeatureVector {
            dc_power: self.dc_power,
            ac_power: self.ac_power,
            ambient_temperature: self.ambient_temperature,
            module_temperature: self.module_temperature,
            irradiation: self.irradiation,
            hour: f64::from(hour),
            day: f64::from(day),
        }
    }

    pub fn to_inputs(&self) -> FeatureInputs {
        self.features().to_inputs()
    }
}
