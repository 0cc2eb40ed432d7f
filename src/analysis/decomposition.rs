//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! Follows Cleveland et al. (1990): an inner loop alternating cycle-subseries
//! smoothing, low-pass filtering and trend smoothing. All smoothers are local-linear LOESS with tricube
//! weights evaluated at every point.

use crate::core::DailySeries;
use crate::error::{DashboardError, Result};
use crate::utils::stats::variance;
use chrono::NaiveDate;
use serde::Serialize;

/// Components of an STL decomposition on a bare slice.
#[derive(Debug, Clone)]
pub struct STLResult {
    /// Trend component.
    pub trend: Vec<f64>,
    /// Seasonal component.
    pub seasonal: Vec<f64>,
    /// Remainder component.
    pub remainder: Vec<f64>,
}

impl STLResult {
    /// Seasonal strength in `[0, 1]`; values close to 1 indicate strong seasonality.
    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.remainder)
    }

    /// Trend strength in `[0, 1]`; values close to 1 indicate a strong trend.
    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }
}

/// `max(0, 1 - Var(R) / Var(C + R))`.
fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let combined: Vec<f64> = component
        .iter()
        .zip(remainder.iter())
        .map(|(c, r)| c + r)
        .collect();
    let var_combined = variance(&combined);
    if var_combined.is_nan() || var_combined <= 1e-10 {
        return 0.0;
    }
    (1.0 - variance(remainder) / var_combined).max(0.0)
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone)]
pub struct STL {
    period: usize,
    /// Seasonal LOESS window (ns).
    seasonal_smoothness: usize,
    /// Trend LOESS window (nt).
    trend_smoothness: usize,
    /// Low-pass LOESS window (nl).
    low_pass_smoothness: usize,
    inner_iterations: usize,
}

impl STL {
    /// Create a decomposer for `period` with the customary defaults:
    /// seasonal window 7, trend window the smallest odd integer not below
    /// `1.5 p / (1 - 1.5 / ns)`, low-pass window the smallest odd integer above `p`.
    pub fn new(period: usize) -> Self {
        let seasonal_smoothness = 7;
        Self {
            period,
            seasonal_smoothness,
            trend_smoothness: default_trend_window(period, seasonal_smoothness),
            low_pass_smoothness: make_odd(period + 1),
            inner_iterations: 2,
        }
    }

    /// Decompose `series`, which must not contain missing values.
    pub fn decompose(&self, series: &[f64]) -> Result<STLResult> {
        let n = series.len();
        let p = self.period;
        if p < 2 {
            return Err(DashboardError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {p}"
            )));
        }
        if self.seasonal_smoothness < 3 {
            return Err(DashboardError::InvalidParameter(
                "seasonal window must be an odd integer >= 3".to_string(),
            ));
        }
        if n < 2 * p {
            return Err(DashboardError::InsufficientData {
                needed: 2 * p,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(DashboardError::MissingValues);
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        for _ in 0..self.inner_iterations {
            self.inner_step(series, &mut trend, &mut seasonal);
        }

        let remainder = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();
        Ok(STLResult {
            trend,
            seasonal,
            remainder,
        })
    }

    fn inner_step(&self, y: &[f64], trend: &mut Vec<f64>, seasonal: &mut [f64]) {
        let n = y.len();
        let p = self.period;

        let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(v, t)| v - t).collect();
        let cycle = self.smooth_cycle_subseries(&detrended);

        let filtered = moving_average(&moving_average(&moving_average(&cycle, p), p), 3);
        let low_pass = loess(&filtered, self.low_pass_smoothness);

        for i in 0..n {
            seasonal[i] = cycle[p + i] - low_pass[i];
        }

        let deseasonalized: Vec<f64> = y.iter().zip(seasonal.iter()).map(|(v, s)| v - s).collect();
        *trend = loess(&deseasonalized, self.trend_smoothness);
    }

    /// Smooth each cycle-subseries and extend it by one period at both ends,
    /// giving a series of length `n + 2p`.
    fn smooth_cycle_subseries(&self, detrended: &[f64]) -> Vec<f64> {
        let n = detrended.len();
        let p = self.period;
        let ns = self.seasonal_smoothness;
        let mut out = vec![0.0; n + 2 * p];
        let mut scratch = Vec::new();

        for j in 0..p {
            let sub: Vec<f64> = detrended.iter().skip(j).step_by(p).copied().collect();
            let k = sub.len();

            let smoothed = loess(&sub, ns);

            scratch.resize(k, 0.0);
            let before = loess_point(&sub, ns, -1.0, 0, ns.min(k) - 1, &mut scratch).unwrap_or(smoothed[0]);
            let after = loess_point(&sub, ns, k as f64, k.saturating_sub(ns), k - 1, &mut scratch)
                .unwrap_or(smoothed[k - 1]);

            out[j] = before;
            for (m, v) in smoothed.iter().enumerate() {
                out[(m + 1) * p + j] = *v;
            }
            out[(k + 1) * p + j] = after;
        }
        out
    }
}

impl Default for STL {
    fn default() -> Self {
        Self::new(7)
    }
}

fn make_odd(v: usize) -> usize {
    if v % 2 == 0 {
        v + 1
    } else {
        v
    }
}

fn default_trend_window(period: usize, ns: usize) -> usize {
    make_odd((1.5 * period as f64 / (1.0 - 1.5 / ns as f64)).ceil() as usize)
}

/// Trailing moving average of width `window`; the output is `window - 1` shorter.
fn moving_average(x: &[f64], window: usize) -> Vec<f64> {
    if x.len() < window {
        return Vec::new();
    }
    let mut sum: f64 = x[..window].iter().sum();
    let mut out = Vec::with_capacity(x.len() - window + 1);
    out.push(sum / window as f64);
    for i in window..x.len() {
        sum += x[i] - x[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Local-linear LOESS with a `q`-nearest-neighbour window, evaluated at each index.
fn loess(y: &[f64], q: usize) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return y.to_vec();
    }
    let mut scratch = vec![0.0; n];
    let mut out = Vec::with_capacity(n);
    if q >= n {
        for i in 0..n {
            out.push(loess_point(y, q, i as f64, 0, n - 1, &mut scratch).unwrap_or(y[i]));
        }
        return out;
    }

    let half = (q + 1) / 2;
    let (mut left, mut right) = (0, q - 1);
    for i in 0..n {
        if i + 1 > half && right != n - 1 {
            left += 1;
            right += 1;
        }
        out.push(loess_point(y, q, i as f64, left, right, &mut scratch).unwrap_or(y[i]));
    }
    out
}

/// Fit at position `x` from the points `left..=right`. `None` when every
/// neighbour carries zero weight.
fn loess_point(
    y: &[f64],
    q: usize,
    x: f64,
    left: usize,
    right: usize,
    w: &mut [f64],
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;
    let mut h = (x - left as f64).max(right as f64 - x);
    if q > n {
        h += ((q - n) / 2) as f64;
    }
    let h_hi = 0.999 * h;
    let h_lo = 0.001 * h;

    let mut total = 0.0;
    for j in left..=right {
        let r = (j as f64 - x).abs();
        w[j] = if r <= h_lo {
            1.0
        } else if r <= h_hi {
            (1.0 - (r / h).powi(3)).powi(3)
        } else {
            0.0
        };
        total += w[j];
    }
    if total <= 0.0 {
        return None;
    }
    for wj in &mut w[left..=right] {
        *wj /= total;
    }

    if h > 0.0 {
        let centre: f64 = (left..=right).map(|j| w[j] * j as f64).sum();
        let spread: f64 = (left..=right).map(|j| w[j] * (j as f64 - centre).powi(2)).sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (x - centre) / spread;
            for j in left..=right {
                w[j] *= slope * (j as f64 - centre) + 1.0;
            }
        }
    }

    Some((left..=right).map(|j| w[j] * y[j]).sum())
}

/// Dated trend, seasonal and residual components of a daily series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub dates: Vec<NaiveDate>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub period: usize,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.residual)
    }

    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.residual)
    }
}

/// Decompose a gap-free daily series with the default STL settings for `period`.
///
/// The output shares the input's date index exactly.
pub fn decompose(series: &DailySeries, period: usize) -> Result<Decomposition> {
    let result = STL::new(period).decompose(series.values())?;
    Ok(Decomposition {
        dates: series.dates().to_vec(),
        trend: result.trend,
        seasonal: result.seasonal,
        residual: result.remainder,
        period,
    })
}
