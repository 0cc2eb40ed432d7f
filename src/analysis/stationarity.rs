//! Stationarity tests for daily series.
//!
//! The Augmented Dickey-Fuller test has a unit root as its null hypothesis, so
//! a small p-value is evidence for stationarity. KPSS has level stationarity as
//! its null, so a small p-value is evidence against it. The dashboard calls a
//! series stationary only when both tests agree.

use crate::error::{DashboardError, Result};
use crate::utils::ols::ols_fit;
use crate::utils::stats::{dot, mean, normal_cdf};
use serde::Serialize;

/// Default significance level for the combined verdict.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Result of a stationarity test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationarityResult {
    /// Test statistic
    pub statistic: f64,
    /// P-value (approximate)
    pub p_value: f64,
    /// Number of lags used
    pub lags: usize,
    /// Observations used in the test regression
    pub nobs: usize,
    /// Critical values at common significance levels
    pub critical_values: CriticalValues,
}

/// Critical values for stationarity tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriticalValues {
    /// Critical value at 1% significance
    pub cv_1pct: f64,
    /// Critical value at 5% significance
    pub cv_5pct: f64,
    /// Critical value at 10% significance
    pub cv_10pct: f64,
}

/// Combined reading of the ADF and KPSS p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StationarityVerdict {
    Stationary,
    NonStationary,
}

impl StationarityVerdict {
    /// `Stationary` iff ADF rejects a unit root and KPSS does not reject
    /// stationarity at `alpha`. NaN p-values never count as evidence.
    pub fn from_p_values(p_adf: f64, p_kpss: f64, alpha: f64) -> Self {
        if p_adf < alpha && p_kpss > alpha {
            StationarityVerdict::Stationary
        } else {
            StationarityVerdict::NonStationary
        }
    }

    pub fn is_stationary(self) -> bool {
        self == StationarityVerdict::Stationary
    }
}

/// Both test results and the verdict derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationarityReport {
    pub adf: StationarityResult,
    pub kpss: StationarityResult,
    pub alpha: f64,
    pub verdict: StationarityVerdict,
}

impl StationarityReport {
    /// Run both tests on `values` (missing values are dropped first).
    pub fn from_values(values: &[f64], alpha: f64) -> Result<Self> {
        let (adf, kpss) = stationarity_tests(values)?;
        let verdict = StationarityVerdict::from_p_values(adf.p_value, kpss.p_value, alpha);
        Ok(Self {
            adf,
            kpss,
            alpha,
            verdict,
        })
    }
}

/// Run ADF and KPSS on the non-missing values of `values`.
pub fn stationarity_tests(values: &[f64]) -> Result<(StationarityResult, StationarityResult)> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    Ok((adf_test(&clean)?, kpss_test(&clean)?))
}

/// Augmented Dickey-Fuller test with a constant term.
///
/// Regresses `Δy_t` on `y_{t-1}`, `Δy_{t-1..t-p}` and a constant. The lag
/// order `p` is chosen by AIC over `0..=maxlag` on a common sample, with
/// `maxlag = ceil(12 (n/100)^{1/4})` capped at `n/2 - 2`. The statistic is
/// the t-value of the lagged level.
pub fn adf_test(series: &[f64]) -> Result<StationarityResult> {
    let n = series.len();
    if n == 0 {
        return Err(DashboardError::EmptyData);
    }
    if n < 4 {
        return Err(DashboardError::InsufficientData { needed: 4, got: n });
    }
    let maxlag = ((12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize).min(n / 2 - 2);
    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    // lag search: every candidate is fitted on the sample of the largest lag
    let (y, full) = adf_design(series, &diff, maxlag);
    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=maxlag {
        let design: Vec<Vec<f64>> = full.iter().map(|row| row[..lag + 2].to_vec()).collect();
        let aic = match ols_fit(&y, &design) {
            Ok(fit) => fit.aic(),
            // collinear lagged differences add nothing over a shorter lag
            Err(DashboardError::ComputationError(_)) => continue,
            Err(e) => return Err(e),
        };
        if best.map_or(true, |(b, _)| aic < b) {
            best = Some((aic, lag));
        }
    }
    let Some((_, lag)) = best else {
        return Err(DashboardError::ComputationError(
            "ADF regression is degenerate (constant series?)".to_string(),
        ));
    };

    let (y, design) = adf_design(series, &diff, lag);
    let fit = ols_fit(&y, &design)?;
    let statistic = fit.t_value(1);
    if !statistic.is_finite() {
        return Err(DashboardError::ComputationError(
            "ADF regression is degenerate (constant series?)".to_string(),
        ));
    }

    Ok(StationarityResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        lags: lag,
        nobs: fit.nobs,
        critical_values: adf_critical_values(fit.nobs),
    })
}

/// Rows `[1, y_{t}, Δy_{t-1}, .., Δy_{t-lag}]` with response `Δy_{t}` (levels
/// indexed so that `Δy_t = y_{t+1} - y_t`).
fn adf_design(series: &[f64], diff: &[f64], lag: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let rows = lag..diff.len();
    let y = diff[rows.clone()].to_vec();
    let design = rows
        .map(|t| {
            let mut row = Vec::with_capacity(lag + 2);
            row.push(1.0);
            row.push(series[t]);
            row.extend((1..=lag).map(|j| diff[t - j]));
            row
        })
        .collect();
    (y, design)
}

/// MacKinnon (1994) approximate p-value for the constant-only, single-series case.
fn mackinnon_p_value(stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if stat.is_nan() {
        return f64::NAN;
    }
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coefs: &[f64] = if stat <= TAU_STAR { &SMALL_P } else { &LARGE_P };
    normal_cdf(polyval(coefs, stat))
}

/// MacKinnon (2010) finite-sample critical values, constant-only.
fn adf_critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        cv_1pct: polyval(&[-3.43035, -6.5393, -16.786, -79.433], inv),
        cv_5pct: polyval(&[-2.86154, -2.8903, -4.234, -40.040], inv),
        cv_10pct: polyval(&[-2.56677, -1.5384, -2.809, 0.0], inv),
    }
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`.
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

const KPSS_CRITICAL: [f64; 4] = [0.347, 0.463, 0.574, 0.739];
const KPSS_P_VALUES: [f64; 4] = [0.10, 0.05, 0.025, 0.01];

/// KPSS test for level stationarity.
///
/// The bandwidth is chosen automatically (Hobijn et al. 1998) and capped at
/// `n - 1`; the long-run variance uses Bartlett weights. The p-value is
/// interpolated in the published table and therefore lies in `[0.01, 0.10]`.
pub fn kpss_test(series: &[f64]) -> Result<StationarityResult> {
    let n = series.len();
    if n == 0 {
        return Err(DashboardError::EmptyData);
    }
    if n < 3 {
        return Err(DashboardError::InsufficientData { needed: 3, got: n });
    }

    let m = mean(series);
    let resid: Vec<f64> = series.iter().map(|x| x - m).collect();
    let ssr = dot(&resid, &resid);
    if ssr <= f64::EPSILON * n as f64 * m.abs().max(1.0) {
        return Err(DashboardError::ComputationError(
            "KPSS is undefined for a constant series".to_string(),
        ));
    }

    let lags = kpss_auto_lags(&resid).min(n - 1);

    let mut cumsum = 0.0;
    let eta = resid
        .iter()
        .map(|r| {
            cumsum += r;
            cumsum * cumsum
        })
        .sum::<f64>()
        / (n * n) as f64;

    let mut long_run = ssr;
    for i in 1..=lags {
        let weight = 1.0 - i as f64 / (lags as f64 + 1.0);
        long_run += 2.0 * weight * dot(&resid[i..], &resid[..n - i]);
    }
    long_run /= n as f64;

    let statistic = eta / long_run;
    Ok(StationarityResult {
        statistic,
        p_value: interpolate_clamped(statistic, &KPSS_CRITICAL, &KPSS_P_VALUES),
        lags,
        nobs: n,
        critical_values: CriticalValues {
            cv_1pct: KPSS_CRITICAL[3],
            cv_5pct: KPSS_CRITICAL[1],
            cv_10pct: KPSS_CRITICAL[0],
        },
    })
}

/// Data-dependent Bartlett bandwidth.
fn kpss_auto_lags(resid: &[f64]) -> usize {
    let n = resid.len();
    let nf = n as f64;
    let cov_lags = nf.powf(2.0 / 9.0) as usize;

    let mut s0 = dot(resid, resid) / nf;
    let mut s1 = 0.0;
    for i in 1..=cov_lags.min(n - 1) {
        let prod = dot(&resid[i..], &resid[..n - i]) / (nf / 2.0);
        s0 += prod;
        s1 += i as f64 * prod;
    }
    let s_hat = s1 / s0;
    let gamma = 1.1447 * (s_hat * s_hat).powf(1.0 / 3.0);
    let lags = gamma * nf.powf(1.0 / 3.0);
    if lags.is_finite() && lags > 0.0 {
        lags as usize
    } else {
        0
    }
}

/// Piecewise-linear interpolation on increasing `xs`, clamped at both ends.
fn interpolate_clamped(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&v| v <= x);
    let t = (x - xs[i - 1]) / (xs[i] - xs[i - 1]);
    ys[i - 1] + t * (ys[i] - ys[i - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn noise(n: usize) -> Vec<f64> {
        // deterministic LCG, uniform on (-1, 1)
        let mut state: u64 = 42;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    /// Over-differenced noise: strongly mean reverting, bounded partial sums.
    fn mean_reverting(n: usize) -> Vec<f64> {
        noise(n + 1).windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn random_walk(n: usize) -> Vec<f64> {
        let mut level = 0.0;
        noise(n)
            .into_iter()
            .map(|e| {
                level += 0.3 + e;
                level
            })
            .collect()
    }

    // ==================== verdict ====================

    #[test]
    fn verdict_requires_both_tests() {
        assert_eq!(
            StationarityVerdict::from_p_values(0.03, 0.10, 0.05),
            StationarityVerdict::Stationary
        );
        assert_eq!(
            StationarityVerdict::from_p_values(0.20, 0.10, 0.05),
            StationarityVerdict::NonStationary
        );
        assert_eq!(
            StationarityVerdict::from_p_values(0.01, 0.01, 0.05),
            StationarityVerdict::NonStationary
        );
        assert_eq!(
            StationarityVerdict::from_p_values(f64::NAN, 0.10, 0.05),
            StationarityVerdict::NonStationary
        );
    }

    // ==================== adf_test ====================

    #[test]
    fn adf_white_noise_rejects_unit_root() {
        let result = adf_test(&noise(300)).unwrap();
        assert!(result.statistic < result.critical_values.cv_1pct);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn adf_random_walk_keeps_unit_root() {
        let result = adf_test(&random_walk(300)).unwrap();
        assert!(result.p_value > 0.05);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn adf_lag_within_bounds() {
        let series = noise(100);
        let result = adf_test(&series).unwrap();
        // maxlag = ceil(12 * 1^0.25) = 12
        assert!(result.lags <= 12);
        assert_eq!(result.nobs, 99 - result.lags);
    }

    #[test]
    fn adf_exact_linear_trend_is_not_stationary() {
        let series: Vec<f64> = (0..30).map(|i| 10.0 + 0.5 * i as f64).collect();
        let result = adf_test(&series).unwrap();
        // every lagged difference equals the constant, so only lag 0 is identified
        assert_eq!(result.lags, 0);
        assert!(result.statistic.is_finite());
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn adf_smooth_periodic_series_has_a_result() {
        let series: Vec<f64> = (0..60)
            .map(|i| 20.0 + (0.9 * i as f64).sin() + 0.05 * i as f64)
            .collect();
        let result = adf_test(&series).unwrap();
        assert!(result.statistic.is_finite());
        assert!((0.0..=1.0).contains(&result.p_value));
        assert!(StationarityReport::from_values(&series, DEFAULT_SIGNIFICANCE).is_ok());
    }

    #[test]
    fn adf_short_and_constant_inputs() {
        assert!(matches!(adf_test(&[]), Err(DashboardError::EmptyData)));
        assert!(matches!(
            adf_test(&[1.0, 2.0, 3.0]),
            Err(DashboardError::InsufficientData { needed: 4, got: 3 })
        ));
        assert!(adf_test(&[5.0; 40]).is_err());
    }

    #[test]
    fn mackinnon_p_value_bounds_and_continuity() {
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
        // published 5% critical value for large samples
        assert_relative_eq!(mackinnon_p_value(-2.86), 0.05, epsilon = 5e-3);
        let below = mackinnon_p_value(-1.61 - 1e-9);
        let above = mackinnon_p_value(-1.61 + 1e-9);
        assert!((below - above).abs() < 1e-2);
    }

    #[test]
    fn adf_critical_values_approach_asymptotic() {
        let cv = adf_critical_values(1_000_000);
        assert_relative_eq!(cv.cv_5pct, -2.86154, epsilon = 1e-4);
        let small = adf_critical_values(50);
        assert!(small.cv_1pct < small.cv_5pct && small.cv_5pct < small.cv_10pct);
    }

    // ==================== kpss_test ====================

    #[test]
    fn kpss_mean_reverting_is_level_stationary() {
        let result = kpss_test(&mean_reverting(300)).unwrap();
        assert_relative_eq!(result.p_value, 0.10, epsilon = 1e-12);
    }

    #[test]
    fn kpss_trend_rejects_stationarity() {
        let series: Vec<f64> = (0..200).map(|i| i as f64 * 0.3).zip(noise(200)).map(|(a, b)| a + b).collect();
        let result = kpss_test(&series).unwrap();
        assert_relative_eq!(result.p_value, 0.01, epsilon = 1e-12);
        assert!(result.statistic > 0.739);
    }

    #[test]
    fn kpss_lags_capped_by_length() {
        let result = kpss_test(&[1.0, 2.0, 1.5, 2.5]).unwrap();
        assert!(result.lags <= 3);
    }

    #[test]
    fn kpss_rejects_constant() {
        assert!(matches!(
            kpss_test(&[2.0; 20]),
            Err(DashboardError::ComputationError(_))
        ));
    }

    #[test]
    fn kpss_interpolation_table() {
        assert_relative_eq!(interpolate_clamped(0.1, &KPSS_CRITICAL, &KPSS_P_VALUES), 0.10);
        assert_relative_eq!(interpolate_clamped(2.0, &KPSS_CRITICAL, &KPSS_P_VALUES), 0.01);
        assert_relative_eq!(
            interpolate_clamped(0.405, &KPSS_CRITICAL, &KPSS_P_VALUES),
            0.075,
            epsilon = 1e-12
        );
    }

    // ==================== combined ====================

    #[test]
    fn report_on_mean_reverting_is_stationary() {
        let mut values = mean_reverting(250);
        values[10] = f64::NAN;
        let report = StationarityReport::from_values(&values, DEFAULT_SIGNIFICANCE).unwrap();
        assert_eq!(report.verdict, StationarityVerdict::Stationary);
        assert_eq!(report.kpss.nobs, 249);
    }

    #[test]
    fn report_on_random_walk_is_not() {
        let report = StationarityReport::from_values(&random_walk(250), DEFAULT_SIGNIFICANCE).unwrap();
        assert!(!report.verdict.is_stationary());
    }
}
