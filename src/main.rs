use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use solar_yield::{
    config::AppConfig,
    dataset,
    ml::{self, ForestParams, PredictionRequest, Predictor},
    web,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Parser, Debug)]
#[command(name = "solar-yield")]
#[command(about = "Solar plant daily-yield pipeline - prepare, train, predict and serve")]
struct Args {
    /// Extra configuration file, applied over config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge generation and weather CSVs into the prepared dataset
    Prepare,
    /// Train the forest on the prepared dataset and save the artifacts
    Train,
    /// Predict one daily yield from the command line
    Predict {
        #[arg(long, default_value_t = 4700.0)]
        dc_power: f64,
        #[arg(long, default_value_t = 4500.0)]
        ac_power: f64,
        #[arg(long, default_value_t = 32.0)]
        ambient_temperature: f64,
        #[arg(long, default_value_t = 38.0)]
        module_temperature: f64,
        #[arg(long, default_value_t = 800.0)]
        irradiation: f64,
        /// Observation time as "YYYY-MM-DD HH:MM"
        #[arg(long, default_value = "2025-06-26 14:30", value_parser = parse_datetime)]
        datetime: NaiveDateTime,
    },
    /// Serve the prediction form over HTTP
    Serve,
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| format!("expected YYYY-MM-DD HH:MM: {e}"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("solar_yield=debug");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config =
        AppConfig::load_from(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Prepare => run_prepare(&config),
        Command::Train => run_train(&config),
        Command::Predict {
            dc_power,
            ac_power,
            ambient_temperature,
            module_temperature,
            irradiation,
            datetime,
        } => run_predict(
            &config,
            PredictionRequest {
                dc_power,
                ac_power,
                ambient_temperature,
                module_temperature,
                irradiation,
                timestamp: datetime,
            },
        ),
        Command::Serve => {
            let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
            rt.block_on(web::serve(&config))
        }
    }
}

fn run_prepare(config: &AppConfig) -> Result<()> {
    let summary = dataset::prepare(&config.data).context("Data preparation failed")?;
    println!(
        "Prepared {} rows ({} joined, {} invalid timestamps) -> {}",
        summary.kept_rows,
        summary.joined_rows,
        summary.invalid_timestamps,
        config.data.prepared_csv.display()
    );
    Ok(())
}

fn run_train(config: &AppConfig) -> Result<()> {
    let report = ml::train_from_file(
        &config.data.prepared_csv,
        &config.model.artifact_dir,
        ForestParams::from(&config.model),
    )
    .context("Training failed")?;

    println!("{}", report.summary());
    println!("Model and scaler saved in {}", config.model.artifact_dir.display());
    Ok(())
}

fn run_predict(config: &AppConfig, request: PredictionRequest) -> Result<()> {
    let predictor = Predictor::load(&config.model.artifact_dir)
        .context("Failed to load model or scaler")?;

    println!("Input features:");
    let inputs = request.to_inputs();
    for name in predictor.feature_names() {
        if let Some(value) = inputs.get(name) {
            println!("  {name}: {value}");
        }
    }

    let prediction = predictor
        .predict(&inputs)
        .context("Prediction failed")?;
    println!("Predicted DAILY_YIELD: {prediction:.2} kWh");
    Ok(())
}
