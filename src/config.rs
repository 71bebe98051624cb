use std::path::{Path, PathBuf};

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub server: ServerConfig,
    pub ui: UiConfig,
}

/// Source and output files for the preparation step.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub generation_csv: PathBuf,
    pub weather_csv: PathBuf,
    pub prepared_csv: PathBuf,
    /// chrono format of `DATE_TIME` in the generation file
    pub generation_timestamp_format: String,
    /// chrono format of `DATE_TIME` in the weather file
    pub weather_timestamp_format: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            generation_csv: PathBuf::from("datasets/Plant_1_Generation_Data.csv"),
            weather_csv: PathBuf::from("datasets/Plant_1_Weather_Sensor_Data.csv"),
            prepared_csv: PathBuf::from("preprocessed_plant1.csv"),
            generation_timestamp_format: "%d-%m-%Y %H:%M".to_string(),
            weather_timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub artifact_dir: PathBuf,
    pub n_trees: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("model"),
            n_trees: 100,
            seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub title: String,
    pub default_city: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Solar Energy Yield Predictor".to_string(),
            default_city: "Jaipur".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally layering an explicit file on top of the
    /// discovered ones.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("solar-yield");

        let data = DataConfig::default();
        let model = ModelConfig::default();
        let server = ServerConfig::default();
        let ui = UiConfig::default();

        let mut builder = Config::builder()
            // 1. Defaults
            // Data
            .set_default("data.generation_csv", data.generation_csv.to_string_lossy().as_ref())?
            .set_default("data.weather_csv", data.weather_csv.to_string_lossy().as_ref())?
            .set_default("data.prepared_csv", data.prepared_csv.to_string_lossy().as_ref())?
            .set_default("data.generation_timestamp_format", data.generation_timestamp_format)?
            .set_default("data.weather_timestamp_format", data.weather_timestamp_format)?
            // Model
            .set_default("model.artifact_dir", model.artifact_dir.to_string_lossy().as_ref())?
            .set_default("model.n_trees", model.n_trees as i64)?
            .set_default("model.seed", model.seed as i64)?
            // Server
            .set_default("server.bind_address", server.bind_address)?
            .set_default("server.port", i64::from(server.port))?
            // UI
            .set_default("ui.title", ui.title)?
            .set_default("ui.default_city", ui.default_city)?

            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false));

        // 4. Explicit --config file (must exist when given)
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // 5. Environment variables (SOLAR__MODEL__N_TREES=...)
        let builder = builder.add_source(Environment::with_prefix("SOLAR").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_data_config_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.generation_timestamp_format, "%d-%m-%Y %H:%M");
        assert_eq!(config.weather_timestamp_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(config.prepared_csv, PathBuf::from("preprocessed_plant1.csv"));
    }

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.seed, 42);
        assert_eq!(config.artifact_dir, PathBuf::from("model"));
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8501);
    }

    #[test]
    fn test_ui_config_defaults() {
        let config = UiConfig::default();
        assert_eq!(config.default_city, "Jaipur");
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        let config = AppConfig::load().expect("Config should load");
        assert!(config.model.n_trees > 0);
        assert!(!config.data.generation_timestamp_format.is_empty());
        assert!(config.server.port > 0);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[model]\nn_trees = 7\n\n[server]\nport = 9100\n\n[ui]\ndefault_city = \"Pune\""
        )
        .unwrap();

        let config = AppConfig::load_from(Some(file.path())).expect("Config should load");

        assert_eq!(config.model.n_trees, 7);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.ui.default_city, "Pune");
        // Untouched sections keep their defaults
        assert_eq!(config.model.seed, 42);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load_from(Some(Path::new("/nonexistent/solar.toml")));
        assert!(result.is_err());
    }
}
