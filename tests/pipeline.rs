//! End-to-end runs of the analysis pipeline on file-backed data.

use chrono::{Duration, NaiveDate};
use std::f64::consts::PI;
use std::io::Write;
use weather_ts_dashboard::ingest::{read_bundled_csv, read_uploaded_csv, DEFAULT_MAX_SERIES_DAYS};
use weather_ts_dashboard::models::ModelChoice;
use weather_ts_dashboard::pipeline::{
    AnalysisRequest, Banner, BannerLevel, PageOutcome, Pipeline, PipelineSettings,
    ARIMA_TOO_SHORT_MESSAGE,
};
use weather_ts_dashboard::render::{render_page, Controls};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 1, 1).unwrap()
}

/// Climate-like daily temperatures: yearly cycle, weekly wobble and noise.
fn climate_values(n: usize) -> Vec<f64> {
    let mut state = 42u64;
    (0..n)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            let t = i as f64;
            25.0 - 10.0 * (2.0 * PI * t / 365.25).cos() + 0.8 * (2.0 * PI * t / 7.0).sin() + 2.0 * noise
        })
        .collect()
}

fn climate_csv(n: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,meantemp,humidity,wind_speed,meanpressure").unwrap();
    for (i, v) in climate_values(n).iter().enumerate() {
        let date = start() + Duration::days(i as i64);
        writeln!(file, "{date},{v:.4},80.0,3.2,1015.0").unwrap();
    }
    file.flush().unwrap();
    file
}

fn forecast(model: ModelChoice) -> AnalysisRequest {
    AnalysisRequest {
        model,
        run_forecast: true,
        date_range: None,
    }
}

#[test]
fn bundled_arima_forecasts_thirty_days() {
    let file = climate_csv(180);
    let series = read_bundled_csv(file.path(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    assert_eq!(series.len(), 180);

    let outcome = Pipeline::new(PipelineSettings::bundled())
        .run(&series, "Bundled Dataset", &forecast(ModelChoice::Arima))
        .unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.decomposition.period, 30);
    assert_eq!(report.decomposition.dates, series.dates());
    let panel = report.forecast.as_ref().unwrap();
    assert_eq!(panel.title(), "30-Day Forecast");
    assert_eq!(panel.forecast.dates(), series.next_dates(30).as_slice());
    assert!(panel.forecast.point().iter().all(|v| v.is_finite()));
}

#[test]
fn bundled_prophet_includes_fitted_history() {
    let file = climate_csv(120);
    let series = read_bundled_csv(file.path(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    let outcome = Pipeline::new(PipelineSettings::bundled())
        .run(&series, "Bundled Dataset", &forecast(ModelChoice::Prophet))
        .unwrap();
    let panel = outcome.report().unwrap().forecast.clone().unwrap();

    assert_eq!(panel.forecast.horizon(), 120 + 30);
    assert_eq!(panel.forecast.dates().first(), series.dates().first());
    assert_eq!(
        panel.forecast.dates().last().copied(),
        series.next_dates(30).last().copied()
    );
}

#[test]
fn upload_with_gaps_is_filled_before_analysis() {
    let mut csv = String::from("date,meantemp\n");
    for (i, v) in climate_values(40).iter().enumerate() {
        let date = start() + Duration::days(i as i64);
        let cell = if i % 9 == 4 { "NA".to_string() } else { format!("{v:.3}") };
        csv.push_str(&format!("{date},{cell}\n"));
    }
    let series = read_uploaded_csv(csv.as_bytes(), start(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    assert!(series.has_missing_values());

    let outcome = Pipeline::new(PipelineSettings::live())
        .run(&series, "Uploaded CSV", &forecast(ModelChoice::Arima))
        .unwrap();
    let report = outcome.report().unwrap();
    assert!(!report.series.has_missing_values());
    assert_eq!(report.series.len(), 40);
    assert_eq!(report.forecast.as_ref().unwrap().forecast.horizon(), 7);
}

#[test]
fn short_upload_gets_arima_banner() {
    let mut settings = PipelineSettings::live();
    settings.decomposition_period = 2;
    let csv = "meantemp\n20.1\n21.4\n19.8\n22.0\n20.5\n21.9\n";
    let series = read_uploaded_csv(csv.as_bytes(), start(), DEFAULT_MAX_SERIES_DAYS).unwrap();

    let outcome = Pipeline::new(settings)
        .run(&series, "Uploaded CSV", &forecast(ModelChoice::Arima))
        .unwrap();
    let report = outcome.report().unwrap();
    assert!(report.forecast.is_none());
    assert_eq!(report.banners.last(), Some(&Banner::error(ARIMA_TOO_SHORT_MESSAGE)));
}

#[test]
fn date_range_selects_a_window() {
    let file = climate_csv(200);
    let series = read_bundled_csv(file.path(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    let from = start() + Duration::days(50);
    let to = start() + Duration::days(149);
    let request = AnalysisRequest {
        date_range: Some((from, to)),
        ..AnalysisRequest::default()
    };
    let outcome = Pipeline::new(PipelineSettings::bundled())
        .run(&series, "Bundled Dataset", &request)
        .unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.series.len(), 100);
    assert_eq!(report.decomposition.dates.first(), Some(&from));
    assert_eq!(report.decomposition.dates.last(), Some(&to));
}

#[test]
fn report_renders_and_serializes() {
    let file = climate_csv(90);
    let series = read_bundled_csv(file.path(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    let outcome = Pipeline::new(PipelineSettings::bundled())
        .run(&series, "Bundled Dataset", &forecast(ModelChoice::Prophet))
        .unwrap();

    let html = render_page(&Controls::bundled(), &outcome).unwrap();
    assert!(html.contains("30-Day Forecast"));
    assert!(html.contains("Stationarity Test Results"));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "report");
    assert_eq!(json["decomposition"]["period"], 30);
    assert_eq!(json["forecast"]["model"], "prophet");
    let levels: Vec<_> = json["banners"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["level"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(levels[0], "info");
    assert!(levels[1] == "success" || levels[1] == "warning");
}

#[test]
fn empty_upload_is_no_data() {
    let series = read_uploaded_csv("date,meantemp\n".as_bytes(), start(), DEFAULT_MAX_SERIES_DAYS).unwrap();
    let outcome = Pipeline::new(PipelineSettings::live())
        .run(&series, "Uploaded CSV", &AnalysisRequest::default())
        .unwrap();
    match outcome {
        PageOutcome::NoData { banners } => assert_eq!(banners[0].level, BannerLevel::Warning),
        PageOutcome::Report(_) => panic!("expected no data"),
    }
}
