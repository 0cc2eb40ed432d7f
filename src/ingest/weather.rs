//! OpenWeather historical data client.
//!
//! A city is geocoded once, then one "time machine" request is issued per
//! day, strictly sequentially. Each day's value is the mean of the hourly
//! temperatures returned for it.

use crate::config::WeatherSettings;
use crate::core::DailySeries;
use crate::error::{DashboardError, Result};
use crate::utils::mean;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

pub const CITY_NOT_FOUND_MESSAGE: &str = "City not found.";

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyReading {
    temp: f64,
}

/// Client for the geocoding and historical weather endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    geocoding_url: String,
    history_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Build a client; fails when no API key is configured.
    pub fn new(settings: &WeatherSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                DashboardError::Config(format!(
                    "no OpenWeather API key; set {} or weather.api_key",
                    crate::config::API_KEY_ENV
                ))
            })?
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            geocoding_url: settings.geocoding_url.clone(),
            history_url: settings.history_url.clone(),
            api_key,
        })
    }

    /// Resolve `city` to coordinates; `None` when the service knows no match.
    pub async fn geocode(&self, city: &str) -> Result<Option<Location>> {
        let body = self
            .client
            .get(&self.geocoding_url)
            .query(&[("q", city), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await?
            .text()
            .await?;
        parse_geocoding(&body)
    }

    /// Mean temperature of the day containing the unix instant `dt`.
    ///
    /// `None` when the response carries no hourly readings.
    pub async fn daily_mean(&self, location: &Location, dt: i64) -> Result<Option<(NaiveDate, f64)>> {
        let lat = location.lat.to_string();
        let lon = location.lon.to_string();
        let dt_text = dt.to_string();
        let body = self
            .client
            .get(&self.history_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("dt", dt_text.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?
            .text()
            .await?;
        parse_history_day(&body, dt)
    }

    /// Fetch `days` days of history before `now`.
    ///
    /// Returns `Ok(None)` when the city cannot be geocoded. Days without
    /// hourly readings are skipped; the remaining records are reindexed to
    /// daily frequency.
    pub async fn fetch_history(
        &self,
        city: &str,
        days: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<DailySeries>> {
        let Some(location) = self.geocode(city).await? else {
            info!(city, "city not found");
            return Ok(None);
        };
        debug!(city, lat = location.lat, lon = location.lon, "geocoded");

        let mut records = Vec::with_capacity(days);
        for dt in history_timestamps(now, days) {
            match self.daily_mean(&location, dt).await? {
                Some(record) => records.push(record),
                None => debug!(dt, "no hourly readings, day skipped"),
            }
        }
        info!(city, requested = days, received = records.len(), "fetched history");

        Ok(Some(DailySeries::from_records(records)?.as_daily()))
    }
}

/// Unix instants `now - 1 day`, `now - 2 days`, ... `now - days days`.
pub fn history_timestamps(now: DateTime<Utc>, days: usize) -> Vec<i64> {
    (1..=days as i64)
        .map(|i| (now - Duration::days(i)).timestamp())
        .collect()
}

/// Decode a geocoding response: the first match, or `None` for an empty list.
pub fn parse_geocoding(body: &str) -> Result<Option<Location>> {
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::Array(_) => {
            let locations: Vec<Location> = serde_json::from_value(value)?;
            Ok(locations.into_iter().next())
        }
        other => Err(service_error(&other)),
    }
}

/// Decode one historical response requested for the instant `dt`.
///
/// An empty `hourly` array yields a missing value for the day.
pub fn parse_history_day(body: &str, dt: i64) -> Result<Option<(NaiveDate, f64)>> {
    let value: Value = serde_json::from_str(body)?;
    let Some(hourly) = value.get("hourly") else {
        return Ok(None);
    };
    let readings: Vec<HourlyReading> = serde_json::from_value(hourly.clone())?;
    let temps: Vec<f64> = readings.iter().map(|r| r.temp).collect();
    let date = DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| DashboardError::InvalidParameter(format!("timestamp {dt} out of range")))?
        .date_naive();
    Ok(Some((date, mean(&temps))))
}

fn service_error(value: &Value) -> DashboardError {
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unexpected response");
    DashboardError::Http(format!("weather service: {message}"))
}
