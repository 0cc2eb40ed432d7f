//! The per-request analysis pipeline.
//!
//! A series goes through gap filling, an optional date-range filter, STL
//! decomposition, the ADF/KPSS pair and (on demand) a forecast. The result is
//! a [`PageOutcome`] ready to be rendered; nothing is kept between requests.

use crate::analysis::{decompose, Decomposition, StationarityReport, StationarityVerdict};
use crate::core::{DailySeries, Forecast};
use crate::error::{DashboardError, Result};
use crate::models::{ARIMASpec, AdditiveModel, Forecaster, ModelChoice, ARIMA};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const NO_DATA_MESSAGE: &str = "No data loaded yet. Check your input.";
pub const STATIONARY_MESSAGE: &str =
    "The series appears to be stationary based on ADF and KPSS tests.";
pub const NON_STATIONARY_MESSAGE: &str =
    "The series may be non-stationary. Consider differencing or detrending.";
pub const ARIMA_TOO_SHORT_MESSAGE: &str =
    "Not enough data points for ARIMA. Try uploading a longer time series.";

/// Coverage of the shaded band around every forecast.
pub const FORECAST_INTERVAL_LEVEL: f64 = 0.95;

/// Tunables of one dashboard flavour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// STL period in days.
    pub decomposition_period: usize,
    /// Forecast horizon in days.
    pub horizon: usize,
    pub arima_order: ARIMASpec,
    /// Fewer cleaned observations than this skip ARIMA with a banner.
    pub min_arima_observations: usize,
    /// Significance level of the stationarity verdict.
    pub significance: f64,
}

impl PipelineSettings {
    /// Uploads and live weather: weekly cycle, one week ahead.
    pub fn live() -> Self {
        Self {
            decomposition_period: 7,
            horizon: 7,
            arima_order: ARIMASpec::default(),
            min_arima_observations: 10,
            significance: crate::analysis::DEFAULT_SIGNIFICANCE,
        }
    }

    /// Bundled climate file: monthly cycle, one month ahead.
    pub fn bundled() -> Self {
        Self {
            decomposition_period: 30,
            horizon: 30,
            ..Self::live()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.decomposition_period < 2 {
            return Err(DashboardError::Config(format!(
                "decomposition_period must be at least 2, got {}",
                self.decomposition_period
            )));
        }
        if self.horizon == 0 {
            return Err(DashboardError::Config(
                "horizon must be positive".to_string(),
            ));
        }
        if self.significance.is_nan() || self.significance <= 0.0 || self.significance >= 1.0 {
            return Err(DashboardError::Config(format!(
                "significance must be in (0, 1), got {}",
                self.significance
            )));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::live()
    }
}

/// What the user asked for on this request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub model: ModelChoice,
    /// Whether the "Run Forecast" button was pressed.
    pub run_forecast: bool,
    /// Inclusive date range to analyse.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A one-line status message shown in the main panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
}

impl Banner {
    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(BannerLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_level(BannerLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(BannerLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(BannerLevel::Error, message)
    }

    fn with_level(level: BannerLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Forecast chart data and its caption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPanel {
    pub model: ModelChoice,
    pub horizon: usize,
    /// Observed series drawn under the forecast.
    pub history: DailySeries,
    /// For the additive model this also covers the fitted history.
    pub forecast: Forecast,
    pub caption: String,
}

impl ForecastPanel {
    pub fn title(&self) -> String {
        format!("{}-Day Forecast", self.horizon)
    }
}

/// Everything the main panel shows for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub source_label: String,
    /// The gap-filled (and range-filtered) series.
    pub series: DailySeries,
    pub decomposition: Decomposition,
    pub stationarity: StationarityReport,
    pub forecast: Option<ForecastPanel>,
    /// In page order.
    pub banners: Vec<Banner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Nothing to analyse; the banners say why.
    NoData { banners: Vec<Banner> },
    Report(Box<DashboardReport>),
}

impl PageOutcome {
    /// The generic "nothing loaded" outcome.
    pub fn no_data() -> Self {
        Self::halted(Banner::warning(NO_DATA_MESSAGE))
    }

    /// Stop before analysis with a single banner.
    pub fn halted(banner: Banner) -> Self {
        PageOutcome::NoData {
            banners: vec![banner],
        }
    }

    pub fn report(&self) -> Option<&DashboardReport> {
        match self {
            PageOutcome::Report(report) => Some(report),
            PageOutcome::NoData { .. } => None,
        }
    }
}

/// Runs the analysis for one dashboard flavour.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Condition `series`, analyse it and optionally forecast.
    ///
    /// Decomposition, stationarity and additive-model failures propagate.
    /// ARIMA failures are reported as banners with no forecast panel.
    pub fn run(
        &self,
        series: &DailySeries,
        source_label: &str,
        request: &AnalysisRequest,
    ) -> Result<PageOutcome> {
        let mut filled = series.as_daily().gap_filled();
        if let Some((start, end)) = request.date_range {
            filled = filled.between(start, end)?;
        }
        if filled.is_empty() || filled.is_all_missing() {
            info!(source = source_label, "no data to analyse");
            return Ok(PageOutcome::no_data());
        }
        info!(
            source = source_label,
            days = filled.len(),
            first = ?filled.first_date(),
            last = ?filled.last_date(),
            "analysing series"
        );

        let decomposition = decompose(&filled, self.settings.decomposition_period)?;
        let stationarity = StationarityReport::from_values(filled.values(), self.settings.significance)?;
        debug!(
            adf = stationarity.adf.p_value,
            kpss = stationarity.kpss.p_value,
            verdict = ?stationarity.verdict,
            "stationarity tests"
        );

        let mut banners = stationarity_banners(&stationarity);
        let forecast = if request.run_forecast {
            let (panel, extra) = self.forecast(&filled, request.model)?;
            banners.extend(extra);
            panel
        } else {
            None
        };

        Ok(PageOutcome::Report(Box::new(DashboardReport {
            source_label: source_label.to_string(),
            series: filled,
            decomposition,
            stationarity,
            forecast,
            banners,
        })))
    }

    fn forecast(
        &self,
        series: &DailySeries,
        model: ModelChoice,
    ) -> Result<(Option<ForecastPanel>, Vec<Banner>)> {
        let horizon = self.settings.horizon;
        let forecast = match model {
            ModelChoice::Arima => match self.arima_forecast(series) {
                Ok(forecast) => forecast,
                Err(banner) => return Ok((None, vec![banner])),
            },
            ModelChoice::Prophet => {
                let mut additive = AdditiveModel::new();
                additive.fit(series)?;
                debug!(seasonalities = ?additive.seasonality_names(), "additive model fitted");
                additive.predict_with_history(horizon, FORECAST_INTERVAL_LEVEL)?
            }
        };
        info!(model = %model, horizon, "forecast ready");
        let panel = ForecastPanel {
            model,
            horizon,
            history: series.clone(),
            forecast,
            caption: forecast_caption(model),
        };
        Ok((Some(panel), Vec::new()))
    }

    /// Fit the configured ARIMA order and predict the horizon with
    /// [`FORECAST_INTERVAL_LEVEL`] bounds.
    ///
    /// Every failure, including a series that is too short, comes back as an
    /// error banner.
    pub fn arima_forecast(&self, series: &DailySeries) -> std::result::Result<Forecast, Banner> {
        let clean = series.as_daily().gap_filled().drop_missing();
        if clean.len() < self.settings.min_arima_observations {
            warn!(
                got = clean.len(),
                needed = self.settings.min_arima_observations,
                "series too short for ARIMA"
            );
            return Err(Banner::error(ARIMA_TOO_SHORT_MESSAGE));
        }
        let mut model = ARIMA::from_spec(self.settings.arima_order);
        model
            .fit(&clean)
            .and_then(|_| {
                model.predict_with_intervals(self.settings.horizon, FORECAST_INTERVAL_LEVEL)
            })
            .map_err(|e| {
                warn!(error = %e, order = %self.settings.arima_order, "ARIMA failed");
                Banner::error(format!("ARIMA model failed: {e}"))
            })
    }
}

fn stationarity_banners(report: &StationarityReport) -> Vec<Banner> {
    let summary = Banner::info(format!(
        "ADF p-value: {:.4} | KPSS p-value: {:.4}",
        report.adf.p_value, report.kpss.p_value
    ));
    let verdict = match report.verdict {
        StationarityVerdict::Stationary => Banner::success(STATIONARY_MESSAGE),
        StationarityVerdict::NonStationary => Banner::warning(NON_STATIONARY_MESSAGE),
    };
    vec![summary, verdict]
}

fn forecast_caption(model: ModelChoice) -> String {
    format!(
        "This forecast uses {model} model to predict temperature trends. It helps identify \
         whether the city is entering a warming, cooling, or stable phase."
    )
}
