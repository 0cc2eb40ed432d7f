//! Property-based tests for series conditioning, analysis and forecasting.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated daily series.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use weather_ts_dashboard::analysis::{decompose, kpss_test, StationarityVerdict};
use weather_ts_dashboard::core::DailySeries;
use weather_ts_dashboard::ingest::{read_uploaded_csv, DEFAULT_MAX_SERIES_DAYS};
use weather_ts_dashboard::models::{AdditiveModel, Forecaster, ARIMA};
use weather_ts_dashboard::render::escape_html;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
}

/// Strategy for temperature-like values with a small drift so the series is
/// never constant.
fn temperature_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(-10.0..40.0_f64, len).prop_map(|mut v| {
            for (i, val) in v.iter_mut().enumerate() {
                *val += (i as f64) * 0.001;
            }
            v
        })
    })
}

/// Strategy for observations with holes; at least one value is present.
fn sparse_strategy(max_len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.6, -10.0..40.0_f64), 1..max_len)
        .prop_filter("needs one observation", |v| v.iter().any(Option::is_some))
}

/// Strategy for seasonal series of a given period.
fn seasonal_strategy(min_len: usize, max_len: usize, period: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(move |len| {
        (5.0..30.0_f64, 1.0..8.0_f64, -0.1..0.1_f64).prop_map(move |(base, amplitude, slope)| {
            (0..len)
                .map(|i| {
                    base + slope * i as f64
                        + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period as f64).sin()
                })
                .collect()
        })
    })
}

fn sparse_series(values: &[Option<f64>]) -> DailySeries {
    let records = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (start() + Duration::days(i as i64), v)))
        .collect();
    DailySeries::from_records(records).unwrap()
}

// =============================================================================
// Property: gap filling leaves no missing values
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn gap_filled_series_is_complete(values in sparse_strategy(60)) {
        let filled = sparse_series(&values).as_daily().gap_filled();
        prop_assert!(filled.is_contiguous());
        prop_assert!(!filled.has_missing_values());
        prop_assert_eq!(filled.missing_count(), 0);
    }

    #[test]
    fn gap_filling_keeps_observations(values in sparse_strategy(60)) {
        let series = sparse_series(&values);
        let filled = series.as_daily().gap_filled();
        for (date, value) in series.iter() {
            let idx = (date - filled.first_date().unwrap()).num_days() as usize;
            prop_assert_eq!(filled.values()[idx], value);
        }
    }

    #[test]
    fn filled_values_stay_within_observed_range(values in sparse_strategy(60)) {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        let lo = observed.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let filled = sparse_series(&values).as_daily().gap_filled();
        for v in filled.values() {
            prop_assert!(*v >= lo - 1e-9 && *v <= hi + 1e-9);
        }
    }
}

// =============================================================================
// Property: stationarity verdict rule
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn verdict_requires_both_tests(p_adf in 0.0..1.0_f64, p_kpss in 0.0..1.0_f64) {
        let verdict = StationarityVerdict::from_p_values(p_adf, p_kpss, 0.05);
        prop_assert_eq!(verdict.is_stationary(), p_adf < 0.05 && p_kpss > 0.05);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn kpss_p_value_is_clamped(values in temperature_strategy(20, 120)) {
        let result = kpss_test(&values).unwrap();
        prop_assert!(result.p_value >= 0.01 && result.p_value <= 0.10);
    }
}

// =============================================================================
// Property: decomposition is additive and keeps the index
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn decomposition_reconstructs_series(values in seasonal_strategy(14, 90, 7)) {
        let series = DailySeries::contiguous(start(), values.clone());
        let d = decompose(&series, 7).unwrap();
        prop_assert_eq!(d.dates.as_slice(), series.dates());
        for i in 0..values.len() {
            let sum = d.trend[i] + d.seasonal[i] + d.residual[i];
            prop_assert!((sum - values[i]).abs() < 1e-8, "index {}: {} vs {}", i, sum, values[i]);
        }
    }
}

// =============================================================================
// Property: forecasts cover the requested days after the last date
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn arima_forecast_dates_follow_history(
        values in temperature_strategy(20, 80),
        horizon in 1usize..31
    ) {
        let series = DailySeries::contiguous(start(), values);
        let mut model = ARIMA::default();
        model.fit(&series).unwrap();
        let forecast = model.predict(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);
        let expected_dates = series.next_dates(horizon);
        prop_assert_eq!(forecast.dates(), expected_dates.as_slice());
        for val in forecast.point() {
            prop_assert!(val.is_finite(), "Forecast contains non-finite value: {}", val);
        }
    }

    #[test]
    fn additive_forecast_spans_history_and_horizon(
        values in seasonal_strategy(10, 80, 7),
        horizon in 1usize..31
    ) {
        let series = DailySeries::contiguous(start(), values);
        let mut model = AdditiveModel::new();
        model.fit(&series).unwrap();
        let full = model.predict_with_history(horizon, 0.95).unwrap();
        prop_assert_eq!(full.horizon(), series.len() + horizon);
        let future = model.predict(horizon).unwrap();
        let expected_dates = series.next_dates(horizon);
        prop_assert_eq!(future.dates(), expected_dates.as_slice());
    }
}

// =============================================================================
// Property: ingestion and escaping
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn dateless_csv_ends_today(values in prop::collection::vec(-10.0..40.0_f64, 1..60)) {
        let mut csv = String::from("meantemp\n");
        for v in &values {
            csv.push_str(&format!("{v}\n"));
        }
        let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let series = read_uploaded_csv(csv.as_bytes(), today, DEFAULT_MAX_SERIES_DAYS).unwrap();
        prop_assert_eq!(series.len(), values.len());
        prop_assert_eq!(series.last_date(), Some(today));
        prop_assert!(series.is_contiguous());
    }

    #[test]
    fn escaped_text_has_no_markup(text in ".*") {
        let escaped = escape_html(&text);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('>'));
        prop_assert!(!escaped.contains('"'));
    }
}
