//! ARIMA (Autoregressive Integrated Moving Average) model.

use crate::core::{DailySeries, Forecast};
use crate::error::{DashboardError, Result};
use crate::models::arima::diff::{difference, differencing_polynomial, integrate};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::{mean, quantile_normal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ARIMA model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARIMASpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ARIMASpec {
    /// Create a new ARIMA specification.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Only undifferenced models carry a mean term.
    pub fn has_intercept(&self) -> bool {
        self.d == 0
    }

    /// Number of estimated mean-equation parameters.
    pub fn num_params(&self) -> usize {
        self.p + self.q + usize::from(self.has_intercept())
    }
}

impl Default for ARIMASpec {
    fn default() -> Self {
        Self::new(2, 1, 2)
    }
}

impl fmt::Display for ARIMASpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// ARIMA forecasting model estimated by conditional sum of squares.
///
/// AR and MA polynomials are restricted to the stationary and invertible
/// regions during estimation.
#[derive(Debug, Clone)]
pub struct ARIMA {
    spec: ARIMASpec,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    intercept: f64,
    original: Option<Vec<f64>>,
    differenced: Option<Vec<f64>>,
    /// Fitted values on the differenced scale.
    fitted_diff: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    residual_variance: Option<f64>,
    aic: Option<f64>,
    bic: Option<f64>,
    last_date: Option<NaiveDate>,
}

impl ARIMA {
    /// Create a new ARIMA model.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::from_spec(ARIMASpec::new(p, d, q))
    }

    pub fn from_spec(spec: ARIMASpec) -> Self {
        Self {
            spec,
            ar_coefficients: vec![],
            ma_coefficients: vec![],
            intercept: 0.0,
            original: None,
            differenced: None,
            fitted_diff: None,
            residuals: None,
            residual_variance: None,
            aic: None,
            bic: None,
            last_date: None,
        }
    }

    pub fn spec(&self) -> ARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.residual_variance
    }

    pub fn aic(&self) -> Option<f64> {
        self.aic
    }

    pub fn bic(&self) -> Option<f64> {
        self.bic
    }

    /// Smallest series length the model accepts.
    pub fn min_observations(&self) -> usize {
        self.spec.d + self.spec.p.max(self.spec.q) + self.spec.num_params() + 2
    }

    /// One-step predictions and residuals on the differenced scale.
    fn filter(&self, w: &[f64], ar: &[f64], ma: &[f64], mu: f64) -> (Vec<f64>, Vec<f64>) {
        let n = w.len();
        let start = ar.len().max(ma.len());
        let mut fitted = vec![f64::NAN; n];
        let mut residuals = vec![0.0; n];

        for t in start..n {
            let mut pred = mu;
            for (i, phi) in ar.iter().enumerate() {
                pred += phi * (w[t - 1 - i] - mu);
            }
            for (j, theta) in ma.iter().enumerate() {
                pred += theta * residuals[t - 1 - j];
            }
            fitted[t] = pred;
            residuals[t] = w[t] - pred;
        }
        (fitted, residuals)
    }

    fn conditional_sum_of_squares(&self, w: &[f64], ar: &[f64], ma: &[f64], mu: f64) -> f64 {
        let neg_ma: Vec<f64> = ma.iter().map(|t| -t).collect();
        if !is_stationary_polynomial(ar) || !is_stationary_polynomial(&neg_ma) {
            return f64::MAX;
        }
        let start = ar.len().max(ma.len());
        let (_, residuals) = self.filter(w, ar, ma, mu);
        let css: f64 = residuals[start..].iter().map(|e| e * e).sum();
        if css.is_finite() {
            css
        } else {
            f64::MAX
        }
    }

    /// Split an optimizer point into `(intercept, ar, ma)`.
    fn unpack<'a>(&self, params: &'a [f64]) -> (f64, &'a [f64], &'a [f64]) {
        let offset = usize::from(self.spec.has_intercept());
        let mu = if offset == 1 { params[0] } else { 0.0 };
        let ar = &params[offset..offset + self.spec.p];
        let ma = &params[offset + self.spec.p..];
        (mu, ar, ma)
    }

    fn estimate_parameters(&mut self, w: &[f64]) -> Result<()> {
        let p = self.spec.p;
        let q = self.spec.q;
        let w_mean = mean(w);

        let mut initial = Vec::with_capacity(self.spec.num_params());
        if self.spec.has_intercept() {
            initial.push(w_mean);
        }
        initial.extend((0..p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend((0..q).map(|i| 0.1 / (i + 1) as f64));

        if initial.is_empty() {
            self.intercept = 0.0;
            self.ar_coefficients.clear();
            self.ma_coefficients.clear();
            return Ok(());
        }

        let config = NelderMeadConfig {
            max_iter: 2000,
            tolerance: 1e-10,
            ..Default::default()
        };
        let result = nelder_mead(
            |params| {
                let (mu, ar, ma) = self.unpack(params);
                self.conditional_sum_of_squares(w, ar, ma, mu)
            },
            &initial,
            config,
        );

        if result.optimal_value.is_nan() || result.optimal_value >= f64::MAX {
            return Err(DashboardError::ComputationError(format!(
                "{} estimation did not reach a stationary, invertible solution",
                self.spec
            )));
        }

        let (mu, ar, ma) = self.unpack(&result.optimal_point);
        self.intercept = mu;
        self.ar_coefficients = ar.to_vec();
        self.ma_coefficients = ma.to_vec();
        Ok(())
    }

    /// MA(infinity) weights of the integrated model, `psi[0] = 1`.
    fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let full_ar = combine_ar(&self.ar_coefficients, &differencing_polynomial(self.spec.d));
        let mut psi = vec![0.0; horizon.max(1)];
        psi[0] = 1.0;
        for j in 1..psi.len() {
            let mut value = self.ma_coefficients.get(j - 1).copied().unwrap_or(0.0);
            for (i, phi) in full_ar.iter().enumerate().take(j) {
                value += phi * psi[j - 1 - i];
            }
            psi[j] = value;
        }
        psi
    }
}

impl Default for ARIMA {
    fn default() -> Self {
        Self::from_spec(ARIMASpec::default())
    }
}

impl Forecaster for ARIMA {
    fn fit(&mut self, series: &DailySeries) -> Result<()> {
        let values = series.values();
        if values.is_empty() {
            return Err(DashboardError::EmptyData);
        }
        if series.has_missing_values() {
            return Err(DashboardError::MissingValues);
        }
        let min_len = self.min_observations();
        if values.len() < min_len {
            return Err(DashboardError::InsufficientData {
                needed: min_len,
                got: values.len(),
            });
        }

        let w = difference(values, self.spec.d);
        self.estimate_parameters(&w)?;

        let start = self.spec.p.max(self.spec.q);
        let (fitted, residuals) =
            self.filter(&w, &self.ar_coefficients, &self.ma_coefficients, self.intercept);

        let n_eff = (w.len() - start) as f64;
        let variance = residuals[start..].iter().map(|r| r * r).sum::<f64>() / n_eff;
        let k = self.spec.num_params() as f64;
        let ll = -0.5 * n_eff * (1.0 + variance.ln() + (2.0 * std::f64::consts::PI).ln());

        self.residual_variance = Some(variance);
        self.aic = Some(-2.0 * ll + 2.0 * k);
        self.bic = Some(-2.0 * ll + k * n_eff.ln());
        self.fitted_diff = Some(fitted);
        self.residuals = Some(residuals);
        self.differenced = Some(w);
        self.original = Some(values.to_vec());
        self.last_date = series.last_date();
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let original = self.original.as_ref().ok_or(DashboardError::FitRequired)?;
        let w = self.differenced.as_ref().ok_or(DashboardError::FitRequired)?;
        let residuals = self.residuals.as_ref().ok_or(DashboardError::FitRequired)?;
        let last = self.last_date.ok_or(DashboardError::FitRequired)?;

        if horizon == 0 {
            return Ok(Forecast::empty());
        }

        let mu = self.intercept;
        let mut extended = w.clone();
        let mut shocks = residuals.clone();
        for _ in 0..horizon {
            let t = extended.len();
            let mut pred = mu;
            for (i, phi) in self.ar_coefficients.iter().enumerate() {
                if t > i {
                    pred += phi * (extended[t - 1 - i] - mu);
                }
            }
            for (j, theta) in self.ma_coefficients.iter().enumerate() {
                if t > j {
                    pred += theta * shocks[t - 1 - j];
                }
            }
            extended.push(pred);
            shocks.push(0.0);
        }

        let predictions = integrate(&extended[w.len()..], original, self.spec.d);
        let dates = (1..=horizon as i64)
            .map(|i| last + chrono::Duration::days(i))
            .collect();
        Forecast::new(dates, predictions)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        if !(level > 0.0 && level < 1.0) {
            return Err(DashboardError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {level}"
            )));
        }
        let forecast = self.predict(horizon)?;
        if horizon == 0 {
            return Ok(forecast);
        }
        let variance = self.residual_variance.ok_or(DashboardError::FitRequired)?;
        let z = quantile_normal((1.0 + level) / 2.0);

        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, point) in forecast.point().iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let se = (variance * cumulative).sqrt();
            lower.push(point - z * se);
            upper.push(point + z * se);
        }

        Forecast::with_intervals(
            forecast.dates().to_vec(),
            forecast.point().to_vec(),
            lower,
            upper,
        )
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted_diff.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}

/// Whether `1 - c[0] z - ... - c[k-1] z^k` has all roots outside the unit circle,
/// checked by stepping the coefficients down to partial autocorrelations.
fn is_stationary_polynomial(coefs: &[f64]) -> bool {
    let mut a = coefs.to_vec();
    while let Some(&kappa) = a.last() {
        if kappa.is_nan() || kappa.abs() >= 1.0 {
            return false;
        }
        let m = a.len();
        let denom = 1.0 - kappa * kappa;
        a = (0..m - 1).map(|j| (a[j] + kappa * a[m - 2 - j]) / denom).collect();
    }
    true
}

/// AR-form product of `(1 - sum a_i B^i)` and `(1 - sum b_i B^i)`.
fn combine_ar(a: &[f64], b: &[f64]) -> Vec<f64> {
    let full = |c: &[f64]| -> Vec<f64> {
        std::iter::once(1.0).chain(c.iter().map(|v| -v)).collect()
    };
    let (fa, fb) = (full(a), full(b));
    let mut product = vec![0.0; fa.len() + fb.len() - 1];
    for (i, x) in fa.iter().enumerate() {
        for (j, y) in fb.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product.iter().skip(1).map(|v| -v).collect()
}
