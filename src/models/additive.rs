//! Additive trend + seasonality regression (the Prophet formulation).
//!
//! `y(t) = g(t) + s(t) + e`, where `g` is a piecewise-linear trend with
//! changepoints spread over the first 80% of the history and `s` is a sum of
//! Fourier series for weekly and yearly cycles. The coefficients are the MAP
//! estimate under Gaussian priors, which reduces to a ridge regression with
//! one penalty per coefficient group.

use crate::core::{DailySeries, Forecast};
use crate::error::{DashboardError, Result};
use crate::models::Forecaster;
use crate::utils::ols::{predict, ridge_fit};
use crate::utils::stats::{quantile_normal, variance};
use chrono::{Duration, NaiveDate};
use std::f64::consts::PI;

/// A Fourier seasonality term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    /// Period in days.
    pub period: f64,
    /// Number of sine/cosine pairs.
    pub order: usize,
}

impl Seasonality {
    pub const WEEKLY: Seasonality = Seasonality {
        name: "weekly",
        period: 7.0,
        order: 3,
    };

    pub const YEARLY: Seasonality = Seasonality {
        name: "yearly",
        period: 365.25,
        order: 10,
    };

    fn features(&self, days_since_epoch: f64, row: &mut Vec<f64>) {
        for i in 1..=self.order {
            let x = 2.0 * PI * i as f64 * days_since_epoch / self.period;
            row.push(x.sin());
            row.push(x.cos());
        }
    }
}

/// Prior scales and structural settings of the additive model.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveConfig {
    /// Maximum number of trend changepoints.
    pub n_changepoints: usize,
    /// Share of the history in which changepoints are placed.
    pub changepoint_range: f64,
    /// Prior scale of the changepoint rate adjustments.
    pub changepoint_prior_scale: f64,
    /// Prior scale of the Fourier coefficients.
    pub seasonality_prior_scale: f64,
    /// Prior scale of the base growth rate and offset.
    pub trend_prior_scale: f64,
    /// Minimum history span (days) that enables weekly seasonality.
    pub weekly_min_span_days: i64,
    /// Minimum history span (days) that enables yearly seasonality.
    pub yearly_min_span_days: i64,
    /// Noise-variance refinement passes of the MAP fit.
    pub refinements: usize,
}

impl Default for AdditiveConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            trend_prior_scale: 5.0,
            weekly_min_span_days: 14,
            yearly_min_span_days: 730,
            refinements: 3,
        }
    }
}

/// Parameters learned by [`AdditiveModel::fit`].
#[derive(Debug, Clone)]
struct FittedState {
    start: NaiveDate,
    t_scale: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    coefficients: Vec<f64>,
    sigma: f64,
    dates: Vec<NaiveDate>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

/// Piecewise-linear trend plus Fourier seasonality, shown as "Prophet" in the UI.
#[derive(Debug, Clone, Default)]
pub struct AdditiveModel {
    config: AdditiveConfig,
    state: Option<FittedState>,
}

impl AdditiveModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the enabled seasonalities (empty before fitting).
    pub fn seasonality_names(&self) -> Vec<&'static str> {
        self.state
            .as_ref()
            .map(|s| s.seasonalities.iter().map(|x| x.name).collect())
            .unwrap_or_default()
    }

    /// Predictions over the training dates followed by `horizon` future days,
    /// with noise-only bounds at coverage `level`.
    pub fn predict_with_history(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(DashboardError::FitRequired)?;
        let mut dates = state.dates.clone();
        if let Some(&last) = state.dates.last() {
            dates.extend((1..=horizon as i64).map(|i| last + Duration::days(i)));
        }
        let values = self.evaluate(state, &dates);
        with_noise_band(state, dates, values, level)
    }

    fn evaluate(&self, state: &FittedState, dates: &[NaiveDate]) -> Vec<f64> {
        let design: Vec<Vec<f64>> = dates
            .iter()
            .map(|d| design_row(*d, state.start, state.t_scale, &state.changepoints, &state.seasonalities))
            .collect();
        predict(&design, &state.coefficients)
            .into_iter()
            .map(|v| v * state.y_scale)
            .collect()
    }

    /// Penalty per design column: `[k, m, deltas.., fourier..]`.
    fn penalties(&self, n_changepoints: usize, n_fourier: usize, sigma_sq: f64) -> Vec<f64> {
        let c = &self.config;
        let trend = sigma_sq / c.trend_prior_scale.powi(2);
        let mut out = vec![trend, trend];
        out.extend(std::iter::repeat(sigma_sq / c.changepoint_prior_scale.powi(2)).take(n_changepoints));
        out.extend(std::iter::repeat(sigma_sq / c.seasonality_prior_scale.powi(2)).take(n_fourier));
        out
    }
}

/// Changepoints in scaled time: `n_cp` of them at evenly spaced indices of the
/// first `changepoint_range` share of the history, excluding the first point.
fn place_changepoints(t: &[f64], max_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let n_cp = max_changepoints.min(hist_size.saturating_sub(1));
    if n_cp == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    (1..=n_cp)
        .map(|i| {
            let idx = (last * i as f64 / n_cp as f64).round() as usize;
            t[idx]
        })
        .collect()
}

fn design_row(
    date: NaiveDate,
    start: NaiveDate,
    t_scale: f64,
    changepoints: &[f64],
    seasonalities: &[Seasonality],
) -> Vec<f64> {
    let t = (date - start).num_days() as f64 / t_scale;
    let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * seasonalities.len());
    row.push(t);
    row.push(1.0);
    row.extend(changepoints.iter().map(|&s| (t - s).max(0.0)));
    let days = days_since_epoch(date);
    for s in seasonalities {
        s.features(days, &mut row);
    }
    row
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

/// Attach `point ± z * sigma` bounds for a two-sided `level`.
fn with_noise_band(
    state: &FittedState,
    dates: Vec<NaiveDate>,
    point: Vec<f64>,
    level: f64,
) -> Result<Forecast> {
    if !(level > 0.0 && level < 1.0) {
        return Err(DashboardError::InvalidParameter(format!(
            "interval level must be in (0, 1), got {level}"
        )));
    }
    let half = quantile_normal((1.0 + level) / 2.0) * state.sigma;
    let lower = point.iter().map(|v| v - half).collect();
    let upper = point.iter().map(|v| v + half).collect();
    Forecast::with_intervals(dates, point, lower, upper)
}

impl Forecaster for AdditiveModel {
    fn fit(&mut self, series: &DailySeries) -> Result<()> {
        let clean = series.drop_missing();
        let (Some(start), Some(end)) = (clean.first_date(), clean.last_date()) else {
            return Err(DashboardError::EmptyData);
        };
        if clean.len() < 2 {
            return Err(DashboardError::InsufficientData {
                needed: 2,
                got: clean.len(),
            });
        }

        let span_days = (end - start).num_days();
        let t_scale = span_days as f64;
        let y_scale = clean
            .values()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y: Vec<f64> = clean.values().iter().map(|v| v / y_scale).collect();

        let t: Vec<f64> = clean
            .dates()
            .iter()
            .map(|d| (*d - start).num_days() as f64 / t_scale)
            .collect();
        let changepoints =
            place_changepoints(&t, self.config.n_changepoints, self.config.changepoint_range);

        let mut seasonalities = Vec::new();
        if span_days >= self.config.weekly_min_span_days {
            seasonalities.push(Seasonality::WEEKLY);
        }
        if span_days >= self.config.yearly_min_span_days {
            seasonalities.push(Seasonality::YEARLY);
        }
        let n_fourier: usize = seasonalities.iter().map(|s| 2 * s.order).sum();

        let design: Vec<Vec<f64>> = clean
            .dates()
            .iter()
            .map(|d| design_row(*d, start, t_scale, &changepoints, &seasonalities))
            .collect();

        let mut sigma_sq = variance(&y);
        if !(sigma_sq.is_finite() && sigma_sq > 0.0) {
            sigma_sq = 1e-2;
        }
        let mut coefficients = Vec::new();
        for _ in 0..self.config.refinements.max(1) {
            let penalties = self.penalties(changepoints.len(), n_fourier, sigma_sq);
            coefficients = ridge_fit(&y, &design, &penalties)?;
            let ssr: f64 = predict(&design, &coefficients)
                .iter()
                .zip(y.iter())
                .map(|(f, o)| (o - f).powi(2))
                .sum();
            sigma_sq = (ssr / y.len() as f64).max(1e-8);
        }

        let fitted: Vec<f64> = predict(&design, &coefficients)
            .into_iter()
            .map(|v| v * y_scale)
            .collect();
        let residuals = clean
            .values()
            .iter()
            .zip(fitted.iter())
            .map(|(o, f)| o - f)
            .collect();

        tracing::debug!(
            changepoints = changepoints.len(),
            seasonalities = seasonalities.len(),
            "fitted additive model"
        );

        self.state = Some(FittedState {
            start,
            t_scale,
            y_scale,
            changepoints,
            seasonalities,
            coefficients,
            sigma: sigma_sq.sqrt() * y_scale,
            dates: clean.dates().to_vec(),
            fitted,
            residuals,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(DashboardError::FitRequired)?;
        let Some(&last) = state.dates.last() else {
            return Ok(Forecast::empty());
        };
        let dates: Vec<NaiveDate> = (1..=horizon as i64).map(|i| last + Duration::days(i)).collect();
        let values = self.evaluate(state, &dates);
        Forecast::new(dates, values)
    }

    /// Intervals reflect observation noise only.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(DashboardError::FitRequired)?;
        let forecast = self.predict(horizon)?;
        with_noise_band(state, forecast.dates().to_vec(), forecast.point().to_vec(), level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "Prophet"
    }
}
