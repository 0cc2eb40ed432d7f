//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. Secrets are never read from source: the OpenWeather key
//! comes from the file or from the `OPENWEATHER_API_KEY` environment variable,
//! which wins when both are set.

use crate::error::{DashboardError, Result};
use crate::ingest::DEFAULT_MAX_SERIES_DAYS;
use crate::models::ARIMASpec;
use crate::pipeline::PipelineSettings;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable holding the OpenWeather API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct General {
    /// Default tracing filter directive, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    /// Largest accepted multipart body.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub geocoding_url: String,
    pub history_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            geocoding_url: "http://api.openweathermap.org/geo/1.0/direct".to_string(),
            history_url: "http://api.openweathermap.org/data/2.5/onecall/timemachine".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Sidebar defaults and limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub default_city: String,
    pub default_days: usize,
    pub min_days: usize,
    pub max_days: usize,
    /// Longest first-to-last date span a CSV may cover once reindexed.
    pub max_series_days: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            default_city: "Delhi".to_string(),
            default_days: 14,
            min_days: 7,
            max_days: 30,
            max_series_days: DEFAULT_MAX_SERIES_DAYS,
        }
    }
}

impl DashboardSettings {
    /// Clamp a requested day count into the slider range.
    pub fn clamp_days(&self, days: usize) -> usize {
        days.clamp(self.min_days, self.max_days)
    }
}

/// Partial pipeline settings layered over a preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineOverrides {
    pub decomposition_period: Option<usize>,
    pub horizon: Option<usize>,
    pub arima_order: Option<ARIMASpec>,
    pub min_arima_observations: Option<usize>,
    pub significance: Option<f64>,
}

impl PipelineOverrides {
    pub fn apply(&self, base: PipelineSettings) -> PipelineSettings {
        PipelineSettings {
            decomposition_period: self.decomposition_period.unwrap_or(base.decomposition_period),
            horizon: self.horizon.unwrap_or(base.horizon),
            arima_order: self.arima_order.unwrap_or(base.arima_order),
            min_arima_observations: self
                .min_arima_observations
                .unwrap_or(base.min_arima_observations),
            significance: self.significance.unwrap_or(base.significance),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundledSettings {
    pub csv_path: PathBuf,
    #[serde(flatten)]
    pub overrides: PipelineOverrides,
}

impl Default for BundledSettings {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/DailyDelhiClimateTrain.csv"),
            overrides: PipelineOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub server: ServerSettings,
    pub weather: WeatherSettings,
    pub dashboard: DashboardSettings,
    /// Overrides of the pipeline used for uploads and live weather.
    pub live: PipelineOverrides,
    pub bundled: BundledSettings,
}

impl Config {
    /// Pipeline settings for uploads and live weather.
    pub fn live_pipeline(&self) -> PipelineSettings {
        self.live.apply(PipelineSettings::live())
    }

    /// Pipeline settings for the bundled dataset.
    pub fn bundled_pipeline(&self) -> PipelineSettings {
        self.bundled.overrides.apply(PipelineSettings::bundled())
    }

    /// Parse a TOML document and apply environment overrides.
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.weather.api_key = Some(key.trim().to_string());
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let d = &self.dashboard;
        if d.min_days == 0 || d.min_days > d.max_days {
            return Err(DashboardError::Config(format!(
                "dashboard day range {}..={} is empty",
                d.min_days, d.max_days
            )));
        }
        if d.max_series_days < d.max_days {
            return Err(DashboardError::Config(format!(
                "max_series_days ({}) must cover max_days ({})",
                d.max_series_days, d.max_days
            )));
        }
        self.live_pipeline().validate()?;
        self.bundled_pipeline().validate()?;
        Ok(())
    }
}

/// Loads the configuration file and returns a struct with all configuration items.
///
/// # Arguments
///
/// * 'config_path' - path to the configuration file; `None` yields defaults
///   (still honouring environment overrides)
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let text = match config_path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read {}: {e}", path.display()))
        })?,
        None => String::new(),
    };
    Config::from_toml(&text)
}
