//! Telemetry loading, merging and filtering
//!
//! Reads the inverter generation file and the weather sensor file, joins them
//! on `(DATE_TIME, PLANT_ID)`, keeps only rows that actually produced power and
//! writes the merged table that the training step consumes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DataConfig;

/// Format used for `DATE_TIME` in the prepared file.
pub const PREPARED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while reading or writing telemetry tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Serde adapter for `DATE_TIME` in the prepared file.
mod prepared_timestamp {
    use chrono::NaiveDateTime;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::PREPARED_TIMESTAMP_FORMAT;

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(PREPARED_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), PREPARED_TIMESTAMP_FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid DATE_TIME '{raw}': {e}")))
    }
}

/// Row of the generation file as it appears on disk.
///
/// `SOURCE_KEY` identifies the inverter and cannot be joined against the
/// weather file, so it is not read at all.
#[derive(Debug, Clone, Deserialize)]
struct RawGeneration {
    #[serde(rename = "DATE_TIME")]
    date_time: String,
    #[serde(rename = "PLANT_ID")]
    plant_id: u64,
    #[serde(rename = "DC_POWER")]
    dc_power: f64,
    #[serde(rename = "AC_POWER")]
    ac_power: f64,
    #[serde(rename = "DAILY_YIELD")]
    daily_yield: f64,
    #[serde(rename = "TOTAL_YIELD")]
    total_yield: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawWeather {
    #[serde(rename = "DATE_TIME")]
    date_time: String,
    #[serde(rename = "PLANT_ID")]
    plant_id: u64,
    #[serde(rename = "AMBIENT_TEMPERATURE")]
    ambient_temperature: f64,
    #[serde(rename = "MODULE_TEMPERATURE")]
    module_temperature: f64,
    #[serde(rename = "IRRADIATION")]
    irradiation: f64,
}

/// One inverter reading. `timestamp` is `None` when `DATE_TIME` did not
/// match the file's format.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub plant_id: u64,
    pub dc_power: f64,
    pub ac_power: f64,
    pub daily_yield: f64,
    pub total_yield: f64,
}

/// One weather sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub plant_id: u64,
    pub ambient_temperature: f64,
    pub module_temperature: f64,
    pub irradiation: f64,
}

/// A merged generation + weather row, the unit of the prepared file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "DATE_TIME", with = "prepared_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "PLANT_ID")]
    pub plant_id: u64,
    #[serde(rename = "DC_POWER")]
    pub dc_power: f64,
    #[serde(rename = "AC_POWER")]
    pub ac_power: f64,
    #[serde(rename = "DAILY_YIELD")]
    pub daily_yield: f64,
    #[serde(rename = "TOTAL_YIELD")]
    pub total_yield: f64,
    #[serde(rename = "AMBIENT_TEMPERATURE")]
    pub ambient_temperature: f64,
    #[serde(rename = "MODULE_TEMPERATURE")]
    pub module_temperature: f64,
    #[serde(rename = "IRRADIATION")]
    pub irradiation: f64,
}

/// Counts reported by a preparation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrepareSummary {
    pub generation_rows: usize,
    pub weather_rows: usize,
    pub invalid_timestamps: usize,
    pub joined_rows: usize,
    pub kept_rows: usize,
}

/// Parse a timestamp with the file's own format. Anything that does not match
/// becomes `None` instead of an error.
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), format).ok()
}

fn read_rows<T, R>(reader: R, label: &str) -> Result<Vec<T>, DataError>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    rdr.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| DataError::Csv {
            path: label.to_string(),
            source,
        })
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read generation rows from any reader.
pub fn read_generation<R: Read>(
    reader: R,
    format: &str,
    label: &str,
) -> Result<Vec<GenerationRecord>, DataError> {
    let rows: Vec<RawGeneration> = read_rows(reader, label)?;

    Ok(rows
        .into_iter()
        .map(|r| GenerationRecord {
            timestamp: parse_timestamp(&r.date_time, format),
            plant_id: r.plant_id,
            dc_power: r.dc_power,
            ac_power: r.ac_power,
            daily_yield: r.daily_yield,
            total_yield: r.total_yield,
        })
        .collect())
}

/// Read weather rows from any reader.
pub fn read_weather<R: Read>(
    reader: R,
    format: &str,
    label: &str,
) -> Result<Vec<WeatherRecord>, DataError> {
    let rows: Vec<RawWeather> = read_rows(reader, label)?;

    Ok(rows
        .into_iter()
        .map(|r| WeatherRecord {
            timestamp: parse_timestamp(&r.date_time, format),
            plant_id: r.plant_id,
            ambient_temperature: r.ambient_temperature,
            module_temperature: r.module_temperature,
            irradiation: r.irradiation,
        })
        .collect())
}

/// Inner join on `(timestamp, plant_id)`.
///
/// Output follows generation order; a generation row matching several weather
/// rows yields one output row per match, in weather order. Rows without a
/// valid timestamp never match.
pub fn merge_inner(
    generation: &[GenerationRecord],
    weather: &[WeatherRecord],
) -> Vec<TelemetryRecord> {
    let mut index: HashMap<(NaiveDateTime, u64), Vec<&WeatherRecord>> = HashMap::new();
    for w in weather {
        if let Some(ts) = w.timestamp {
            index.entry((ts, w.plant_id)).or_default().push(w);
        }
    }

    let mut merged = Vec::with_capacity(generation.len());
    for g in generation {
        let Some(ts) = g.timestamp else {
            continue;
        };
        let Some(matches) = index.get(&(ts, g.plant_id)) else {
            continue;
        };

        for w in matches {
            merged.push(TelemetryRecord {
                timestamp: ts,
                plant_id: g.plant_id,
                dc_power: g.dc_power,
                ac_power: g.ac_power,
                daily_yield: g.daily_yield,
                total_yield: g.total_yield,
                ambient_temperature: w.ambient_temperature,
                module_temperature: w.module_temperature,
                irradiation: w.irradiation,
            });
        }
    }

    merged
}

/// Drop night-time and sensor-noise rows (`DC_POWER <= 0`, or NaN).
pub fn filter_producing(records: Vec<TelemetryRecord>) -> Vec<TelemetryRecord> {
    records.into_iter().filter(|r| r.dc_power > 0.0).collect()
}

/// Write records in the prepared layout.
pub fn write_prepared<W: Write>(writer: W, records: &[TelemetryRecord]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a prepared file back. A missing column is fatal.
pub fn read_prepared<R: Read>(reader: R, label: &str) -> Result<Vec<TelemetryRecord>, DataError> {
    read_rows(reader, label)
}

/// Load the prepared file from disk.
pub fn load_prepared(path: &Path) -> Result<Vec<TelemetryRecord>, DataError> {
    read_prepared(open(path)?, &path.display().to_string())
}

/// Run the full preparation step described by `config`.
pub fn prepare(config: &DataConfig) -> Result<PrepareSummary, DataError> {
    tracing::info!("Loading generation and weather data...");

    let generation = read_generation(
        open(&config.generation_csv)?,
        &config.generation_timestamp_format,
        &config.generation_csv.display().to_string(),
    )?;
    let weather = read_weather(
        open(&config.weather_csv)?,
        &config.weather_timestamp_format,
        &config.weather_csv.display().to_string(),
    )?;

    let invalid_timestamps = generation.iter().filter(|g| g.timestamp.is_none()).count()
        + weather.iter().filter(|w| w.timestamp.is_none()).count();
    if invalid_timestamps > 0 {
        tracing::warn!("{} rows have unparseable DATE_TIME and will not join", invalid_timestamps);
    }

    let merged = merge_inner(&generation, &weather);
    let joined_rows = merged.len();
    tracing::info!("Merged rows: {}", joined_rows);

    let kept = filter_producing(merged);

    let out_path = &config.prepared_csv;
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DataError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let file = File::create(out_path).map_err(|source| DataError::Io {
        path: out_path.display().to_string(),
        source,
    })?;
    write_prepared(file, &kept).map_err(|source| DataError::Csv {
        path: out_path.display().to_string(),
        source,
    })?;

    tracing::info!(
        "Preprocessed data saved to {} ({} rows)",
        out_path.display(),
        kept.len()
    );
    for record in kept.iter().take(5) {
        tracing::debug!(?record, "sample row");
    }

    Ok(PrepareSummary {
        generation_rows: generation.len(),
        weather_rows: weather.len(),
        invalid_timestamps,
        joined_rows,
        kept_rows: kept.len(),
    })
}
