use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Timelike};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{StoreError, WeatherError};
use crate::store::WeatherStore;
use crate::types::{Precipitation, WeatherRecord, WindDirection};

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const HPA_TO_MMHG: f64 = 0.750062;

/// Anything that can produce one current weather sample.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_current(&self) -> Result<WeatherRecord, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    city: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, city: impl Into<String>) -> Result<Self, WeatherError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or(WeatherError::MissingApiKey)?;
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            api_key,
            city: city.into(),
            http,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_current(&self) -> Result<WeatherRecord, WeatherError> {
        info!(city = %self.city, "requesting current weather");

        let res = self
            .http
            .get(OPENWEATHER_URL)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", "ru"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        check_status(status, &body, &self.city)?;

        let observed_at = Local::now().naive_local();
        parse_response(&body, observed_at)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: i32,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    id: i64,
}

#[derive(Debug, Deserialize, Default)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: Option<OwMain>,
    weather: Option<Vec<OwCondition>>,
    wind: Option<OwWind>,
}

/// Turns a current-weather JSON body into a record observed at
/// `observed_at`, truncated to whole seconds.
pub fn parse_response(body: &str, observed_at: NaiveDateTime) -> Result<WeatherRecord, WeatherError> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Malformed(e.to_string()))?;

    let main = parsed
        .main
        .ok_or_else(|| WeatherError::Malformed("missing 'main' section".to_string()))?;
    let condition = parsed
        .weather
        .and_then(|w| w.into_iter().next())
        .ok_or_else(|| WeatherError::Malformed("missing 'weather' section".to_string()))?;
    let wind = parsed
        .wind
        .ok_or_else(|| WeatherError::Malformed("missing 'wind' section".to_string()))?;

    Ok(WeatherRecord {
        observation_time: observed_at.with_nanosecond(0).unwrap_or(observed_at),
        temperature: round_to(main.temp, 1),
        humidity: main.humidity,
        pressure: hpa_to_mmhg(main.pressure),
        wind_speed: round_to(wind.speed, 2),
        wind_direction: WindDirection::from_degrees(wind.deg),
        precipitation: Precipitation::from_condition_id(condition.id),
    })
}

pub fn hpa_to_mmhg(hpa: f64) -> i32 {
    (hpa * HPA_TO_MMHG).round() as i32
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Maps a non-200 answer to the matching error.
fn check_status(status: StatusCode, body: &str, city: &str) -> Result<(), WeatherError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED => Err(WeatherError::Unauthorized),
        StatusCode::NOT_FOUND => Err(WeatherError::UnknownCity(city.to_string())),
        status => Err(WeatherError::Status {
            status,
            body: truncate_body(body),
        }),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    AlreadyPresent,
}

/// Stores one sample. A duplicate observation time is not an error for the
/// ingest job.
pub fn ingest_weather<S: WeatherStore>(
    store: &S,
    record: &WeatherRecord,
) -> Result<IngestOutcome, StoreError> {
    match store.insert_weather(record) {
        Ok(()) => {
            info!(
                observed_at = %record.observation_time,
                temperature = record.temperature,
                precipitation = %record.precipitation,
                "weather sample stored"
            );
            Ok(IngestOutcome::Inserted)
        }
        Err(e) if e.is_constraint_violation() => {
            warn!(observed_at = %record.observation_time, "already have this sample");
            Ok(IngestOutcome::AlreadyPresent)
        }
        Err(e) => Err(e),
    }
}
