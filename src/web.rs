//! HTML form front-end for the daily-yield model
//!
//! A single page takes manual inputs as query parameters, predicts with the
//! shared [`Predictor`] and renders the result. Artifacts are loaded once at
//! startup; if that fails every page shows the load error instead of a form.

use std::sync::Arc;

use anyhow::{Context, Result};
use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AppConfig, UiConfig};
use crate::ml::{FeatureVector, PredictionRequest, Predictor};
use crate::traits::{Clock, SystemClock};

pub const DEFAULT_DC_POWER: f64 = 4700.0;
pub const DEFAULT_AC_POWER: f64 = 4500.0;
pub const DEFAULT_AMBIENT_TEMP: f64 = 32.0;
pub const DEFAULT_FEELS_LIKE: f64 = 35.0;
pub const DEFAULT_IRRADIATION: f64 = 800.0;
pub const DEFAULT_MODULE_TEMP: f64 = 38.0;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Invalid form input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Result of loading artifacts at startup
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<Predictor>),
    Unavailable(String),
}

impl ModelState {
    pub fn from_load(result: Result<Predictor, impl std::fmt::Display>) -> Self {
        match result {
            Ok(predictor) => Self::Ready(Arc::new(predictor)),
            Err(e) => Self::Unavailable(format!("Failed to load model or scaler: {e}")),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub model: ModelState,
    pub clock: Arc<dyn Clock>,
    pub ui: UiConfig,
}

/// Raw query parameters; anything missing or blank falls back to a default.
///
/// Numbers stay text here so a malformed value reaches validation and is
/// reported on the page instead of rejecting the whole request.
#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub city: Option<String>,
    pub dc_power: Option<String>,
    pub ac_power: Option<String>,
    pub ambient_temp: Option<String>,
    pub feels_like: Option<String>,
    pub irradiation: Option<String>,
    pub module_temp: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Form values after defaults are applied, as they are shown back in the form
#[derive(Debug, Clone, PartialEq)]
pub struct FormInput {
    pub city: String,
    pub dc_power: String,
    pub ac_power: String,
    pub ambient_temp: String,
    pub feels_like: String,
    pub irradiation: String,
    pub module_temp: String,
    pub date: String,
    pub time: String,
}

fn or_default(raw: Option<String>, default: impl FnOnce() -> String) -> String {
    raw.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(default)
}

impl FormInput {
    pub fn resolve(query: FormQuery, default_city: &str, now: NaiveDateTime) -> Self {
        let number = |raw: Option<String>, default: f64| or_default(raw, || format_number(default));

        Self {
            city: or_default(query.city, || default_city.to_string()),
            dc_power: number(query.dc_power, DEFAULT_DC_POWER),
            ac_power: number(query.ac_power, DEFAULT_AC_POWER),
            ambient_temp: number(query.ambient_temp, DEFAULT_AMBIENT_TEMP),
            feels_like: number(query.feels_like, DEFAULT_FEELS_LIKE),
            irradiation: number(query.irradiation, DEFAULT_IRRADIATION),
            module_temp: number(query.module_temp, DEFAULT_MODULE_TEMP),
            date: or_default(query.date, || now.format(DATE_FORMAT).to_string()),
            time: or_default(query.time, || now.format(TIME_FORMAT).to_string()),
        }
    }

    /// Parse numbers, check ranges and combine date and time into a request
    pub fn validate(&self) -> Result<PredictionRequest, FormError> {
        let dc_power = parse_number("DC Power", &self.dc_power)?;
        let ac_power = parse_number("AC Power", &self.ac_power)?;
        let ambient_temp = parse_number("Ambient Temp", &self.ambient_temp)?;
        let feels_like = parse_number("Feels Like Temp", &self.feels_like)?;
        let irradiation = parse_number("Irradiation", &self.irradiation)?;
        let module_temp = parse_number("Module Temp", &self.module_temp)?;

        non_negative("DC Power", dc_power)?;
        non_negative("AC Power", ac_power)?;
        in_range("Ambient Temp", ambient_temp, 0.0, 60.0)?;
        in_range("Feels Like Temp", feels_like, 0.0, 60.0)?;
        in_range("Irradiation", irradiation, 0.0, 1200.0)?;
        in_range("Module Temp", module_temp, 0.0, 100.0)?;

        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|_| FormError::InvalidDate(self.date.clone()))?;
        let time = parse_time(self.time.trim())
            .ok_or_else(|| FormError::InvalidTime(self.time.clone()))?;

        Ok(PredictionRequest {
            dc_power,
            ac_power,
            ambient_temperature: ambient_temp,
            module_temperature: module_temp,
            irradiation,
            timestamp: date.and_time(time),
        })
    }
}

// `inf` and `NaN` parse as f64 but are never valid readings
fn parse_number(field: &'static str, value: &str) -> Result<f64, FormError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FormError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), FormError> {
    if !(min..=max).contains(&value) {
        return Err(FormError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), FormError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FormError::Negative { field, value });
    }
    Ok(())
}

// Browsers send HH:MM, but some include seconds
fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Format with two decimals and comma thousands separators
pub fn format_yield(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

struct FormView {
    city: String,
    dc_power: String,
    ac_power: String,
    ambient_temp: String,
    feels_like: String,
    irradiation: String,
    module_temp: String,
    date: String,
    time: String,
}

impl From<&FormInput> for FormView {
    fn from(input: &FormInput) -> Self {
        Self {
            city: input.city.clone(),
            dc_power: input.dc_power.clone(),
            ac_power: input.ac_power.clone(),
            ambient_temp: input.ambient_temp.clone(),
            feels_like: input.feels_like.clone(),
            irradiation: input.irradiation.clone(),
            module_temp: input.module_temp.clone(),
            date: input.date.clone(),
            time: input.time.clone(),
        }
    }
}

struct InputRow {
    name: &'static str,
    value: String,
}

struct ResultView {
    prediction: String,
    city: String,
    ambient_temp: String,
    feels_like: String,
    irradiation: String,
    rows: Vec<InputRow>,
}

impl ResultView {
    fn new(input: &FormInput, request: &PredictionRequest, prediction: f64) -> Self {
        let rows = FeatureVector::NAMES
            .iter()
            .zip(request.features().to_vec())
            .map(|(name, value)| InputRow {
                name: *name,
                value: format_number(value),
            })
            .collect();

        Self {
            prediction: format_yield(prediction),
            city: input.city.clone(),
            ambient_temp: format_number(request.ambient_temperature),
            feels_like: input.feels_like.clone(),
            irradiation: format_number(request.irradiation),
            rows,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    title: String,
    fatal_error: Option<String>,
    form: Option<FormView>,
    error: Option<String>,
    result: Option<ResultView>,
}

impl IndexTemplate {
    fn empty(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fatal_error: None,
            form: None,
            error: None,
            result: None,
        }
    }

    fn respond(self, status: StatusCode) -> Response {
        let html = self
            .render()
            .unwrap_or_else(|e| format!("<h1>Template error</h1><p>{e}</p>"));
        (status, Html(html)).into_response()
    }
}

async fn index_handler(State(state): State<AppState>, Query(query): Query<FormQuery>) -> Response {
    let mut page = IndexTemplate::empty(&state.ui.title);

    let predictor = match &state.model {
        ModelState::Ready(predictor) => predictor,
        ModelState::Unavailable(message) => {
            page.fatal_error = Some(message.clone());
            return page.respond(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    let input = FormInput::resolve(query, &state.ui.default_city, state.clock.now_naive_local());
    page.form = Some(FormView::from(&input));

    let request = match input.validate() {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected form input: {e}");
            page.error = Some(e.to_string());
            return page.respond(StatusCode::BAD_REQUEST);
        }
    };

    match predictor.predict_request(&request) {
        Ok(prediction) => {
            info!(city = %input.city, prediction, "Predicted daily yield");
            page.result = Some(ResultView::new(&input, &request, prediction));
            page.respond(StatusCode::OK)
        }
        Err(e) => {
            error!("Prediction failed: {e}");
            page.error = Some(format!("Prediction failed: {e}"));
            page.respond(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.model {
        ModelState::Ready(_) => (StatusCode::OK, "ok"),
        ModelState::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "model unavailable"),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Load artifacts and serve the form until the process is stopped
pub async fn serve(config: &AppConfig) -> Result<()> {
    let model = ModelState::from_load(Predictor::load(&config.model.artifact_dir));
    if let ModelState::Unavailable(message) = &model {
        error!("{message}");
    }

    let state = AppState {
        model,
        clock: Arc::new(SystemClock),
        ui: config.ui.clone(),
    };

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    info!("Starting web server on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router(state))
        .await
        .context("Web server failed")?;

    Ok(())
}
