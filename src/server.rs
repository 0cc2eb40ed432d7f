//! HTTP surface: the live/upload dashboard, the bundled dashboard and health.

use crate::config::Config;
use crate::core::DailySeries;
use crate::error::{DashboardError, Result};
use crate::ingest::{parse_date, read_bundled_csv, read_uploaded_csv, OpenWeatherClient, CITY_NOT_FOUND_MESSAGE};
use crate::models::ModelChoice;
use crate::pipeline::{AnalysisRequest, Banner, PageOutcome, Pipeline, NO_DATA_MESSAGE};
use crate::render::{render_error_page, render_page, Controls};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const NO_SOURCE_MESSAGE: &str = "Please either upload a CSV file or enable live weather data.";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

struct Shared {
    config: Config,
    live: Pipeline,
    bundled: Pipeline,
    weather: Result<OpenWeatherClient>,
    bundled_series: OnceLock<Arc<DailySeries>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let weather = OpenWeatherClient::new(&config.weather);
        if let Err(e) = &weather {
            warn!(error = %e, "live weather disabled");
        }
        Self {
            inner: Arc::new(Shared {
                live: Pipeline::new(config.live_pipeline()),
                bundled: Pipeline::new(config.bundled_pipeline()),
                weather,
                bundled_series: OnceLock::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The bundled dataset, read on first success and kept for the process lifetime.
    pub fn bundled_series(&self) -> Result<Arc<DailySeries>> {
        if let Some(series) = self.inner.bundled_series.get() {
            return Ok(Arc::clone(series));
        }
        let config = &self.inner.config;
        let path = &config.bundled.csv_path;
        let series = read_bundled_csv(path, config.dashboard.max_series_days)?;
        info!(path = %path.display(), days = series.len(), "loaded bundled dataset");
        Ok(Arc::clone(self.inner.bundled_series.get_or_init(|| Arc::new(series))))
    }
}

/// Build the router with tracing middleware.
pub fn router(state: AppState) -> Router {
    let limit = state.config().server.max_upload_bytes;
    Router::new()
        .route("/", get(live_get).post(live_post))
        .route("/bundled", get(bundled_get).post(bundled_post))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.server.bind;
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("weather-dashboard v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Query string of a GET request; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FormParams {
    pub city: Option<String>,
    pub use_live: Option<String>,
    pub days: Option<usize>,
    pub model: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub action: Option<String>,
}

/// Decoded sidebar submission.
#[derive(Debug, Clone, Default)]
struct FormInput {
    city: Option<String>,
    use_live: bool,
    days: Option<usize>,
    model: ModelChoice,
    date_range: Option<(NaiveDate, NaiveDate)>,
    run_forecast: bool,
    upload: Option<String>,
}

impl FormInput {
    fn from_params(params: FormParams) -> Result<Self> {
        // A first visit has no query; live data is then on by default.
        let use_live = params.use_live.is_some() || params.city.is_none();
        RawForm {
            city: params.city,
            use_live,
            days: params.days.map(|d| d.to_string()),
            model: params.model,
            start: params.start,
            end: params.end,
            action: params.action,
            ..RawForm::default()
        }
        .finish()
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut raw = RawForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| DashboardError::InvalidParameter(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| DashboardError::InvalidParameter(e.to_string()))?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| DashboardError::Csv(format!("field '{name}' is not valid UTF-8")))?;
            match name.as_str() {
                "city" => raw.city = Some(text),
                "use_live" => raw.use_live = true,
                "days" => raw.days = Some(text),
                "model" => raw.model = Some(text),
                "start" => raw.start = Some(text),
                "end" => raw.end = Some(text),
                "action" => raw.action = Some(text),
                "file" if !text.trim().is_empty() => raw.file = Some(text),
                "upload_cache" if !text.trim().is_empty() => raw.upload_cache = Some(text),
                _ => {}
            }
        }
        raw.finish()
    }
}

#[derive(Debug, Default)]
struct RawForm {
    city: Option<String>,
    use_live: bool,
    days: Option<String>,
    model: Option<String>,
    start: Option<String>,
    end: Option<String>,
    action: Option<String>,
    file: Option<String>,
    upload_cache: Option<String>,
}

impl RawForm {
    fn finish(self) -> Result<FormInput> {
        let days = match self.days.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => Some(d.parse::<usize>().map_err(|_| {
                DashboardError::InvalidParameter(format!("days must be a whole number, got '{d}'"))
            })?),
            _ => None,
        };
        let model = match self.model.as_deref() {
            Some(m) => m.parse()?,
            None => ModelChoice::default(),
        };
        let start = non_empty(self.start.as_deref()).map(parse_date).transpose()?;
        let end = non_empty(self.end.as_deref()).map(parse_date).transpose()?;
        let city = non_empty(self.city.as_deref()).map(str::to_string);
        Ok(FormInput {
            city,
            use_live: self.use_live,
            days,
            model,
            date_range: start.zip(end),
            run_forecast: self.action.as_deref() == Some("forecast"),
            upload: self.file.or(self.upload_cache),
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// An error rendered as a full page.
pub struct PageError {
    status: StatusCode,
    body: String,
}

impl PageError {
    fn new(controls: &Controls, err: DashboardError) -> Self {
        let status = if err.is_user_error() {
            warn!(error = %err, "request rejected");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            body: render_error_page(controls, &err.to_string()),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, Html(self.body)).into_response()
    }
}

type PageResult = std::result::Result<Html<String>, PageError>;

async fn live_get(State(state): State<AppState>, Query(params): Query<FormParams>) -> PageResult {
    let controls = live_controls(&state, &FormInput::default());
    let input = FormInput::from_params(params).map_err(|e| PageError::new(&controls, e))?;
    live_page(&state, input).await
}

async fn live_post(State(state): State<AppState>, multipart: Multipart) -> PageResult {
    let controls = live_controls(&state, &FormInput::default());
    let input = FormInput::from_multipart(multipart)
        .await
        .map_err(|e| PageError::new(&controls, e))?;
    live_page(&state, input).await
}

async fn bundled_get(State(state): State<AppState>, Query(params): Query<FormParams>) -> PageResult {
    let controls = bundled_controls(&FormInput::default());
    let input = FormInput::from_params(params).map_err(|e| PageError::new(&controls, e))?;
    bundled_page(&state, input).await
}

async fn bundled_post(State(state): State<AppState>, multipart: Multipart) -> PageResult {
    let controls = bundled_controls(&FormInput::default());
    let input = FormInput::from_multipart(multipart)
        .await
        .map_err(|e| PageError::new(&controls, e))?;
    bundled_page(&state, input).await
}

fn live_controls(state: &AppState, input: &FormInput) -> Controls {
    let d = &state.config().dashboard;
    let mut controls = Controls::live(
        input.city.as_deref().unwrap_or(&d.default_city),
        d.clamp_days(input.days.unwrap_or(d.default_days)),
        d.min_days,
        d.max_days,
    );
    controls.use_live = input.use_live;
    controls.model = input.model;
    controls.date_range = input.date_range;
    controls.upload_cache = input.upload.clone();
    controls
}

fn bundled_controls(input: &FormInput) -> Controls {
    let mut controls = Controls::bundled();
    controls.model = input.model;
    controls.date_range = input.date_range;
    controls
}

fn request_of(input: &FormInput) -> AnalysisRequest {
    AnalysisRequest {
        model: input.model,
        run_forecast: input.run_forecast,
        date_range: input.date_range,
    }
}

async fn live_page(state: &AppState, input: FormInput) -> PageResult {
    let controls = live_controls(state, &input);
    let outcome = live_outcome(state, &input, &controls)
        .await
        .map_err(|e| PageError::new(&controls, e))?;
    render(&controls, &outcome)
}

/// Pick the data source (upload, then live data) and run the live pipeline.
async fn live_outcome(state: &AppState, input: &FormInput, controls: &Controls) -> Result<PageOutcome> {
    let request = request_of(input);
    if let Some(text) = &input.upload {
        let today = Local::now().date_naive();
        let max_days = state.config().dashboard.max_series_days;
        let series = read_uploaded_csv(text.as_bytes(), today, max_days)?;
        return run_blocking(&state.inner.live, Arc::new(series), "Uploaded CSV".to_string(), request).await;
    }
    if !input.use_live {
        return Ok(PageOutcome::halted(Banner::warning(NO_SOURCE_MESSAGE)));
    }

    let client = match &state.inner.weather {
        Ok(client) => client,
        Err(e) => return Ok(PageOutcome::halted(Banner::error(e.to_string()))),
    };
    let city = controls.city.as_str();
    match client.fetch_history(city, controls.days, Utc::now()).await? {
        Some(series) => {
            let label = format!("Live Data for {city}");
            run_blocking(&state.inner.live, Arc::new(series), label, request).await
        }
        None => Ok(PageOutcome::NoData {
            banners: vec![
                Banner::error(CITY_NOT_FOUND_MESSAGE),
                Banner::warning(NO_DATA_MESSAGE),
            ],
        }),
    }
}

async fn bundled_page(state: &AppState, input: FormInput) -> PageResult {
    let controls = bundled_controls(&input);
    let series = state.bundled_series().map_err(|e| PageError::new(&controls, e))?;
    let label = format!("Bundled Dataset: {}", state.config().bundled.csv_path.display());
    let outcome = run_blocking(&state.inner.bundled, series, label, request_of(&input))
        .await
        .map_err(|e| PageError::new(&controls, e))?;
    render(&controls, &outcome)
}

/// Run `pipeline` on the blocking thread pool; model fitting is CPU-bound.
async fn run_blocking(
    pipeline: &Pipeline,
    series: Arc<DailySeries>,
    label: String,
    request: AnalysisRequest,
) -> Result<PageOutcome> {
    let pipeline = pipeline.clone();
    tokio::task::spawn_blocking(move || pipeline.run(&series, &label, &request))
        .await
        .map_err(|e| DashboardError::ComputationError(format!("analysis task failed: {e}")))?
}

fn render(controls: &Controls, outcome: &PageOutcome) -> PageResult {
    render_page(controls, outcome)
        .map(Html)
        .map_err(|e| PageError::new(controls, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_visit_enables_live_data() {
        let input = FormInput::from_params(FormParams::default()).unwrap();
        assert!(input.use_live);
        assert!(!input.run_forecast);
        assert_eq!(input.model, ModelChoice::Arima);
    }

    #[test]
    fn query_form_is_decoded() {
        let params = FormParams {
            city: Some("Oslo".into()),
            days: Some(21),
            model: Some("prophet".into()),
            start: Some("2024-01-01".into()),
            end: Some("2024-01-31".into()),
            action: Some("forecast".into()),
            ..FormParams::default()
        };
        let input = FormInput::from_params(params).unwrap();
        assert!(!input.use_live);
        assert_eq!(input.city.as_deref(), Some("Oslo"));
        assert_eq!(input.days, Some(21));
        assert_eq!(input.model, ModelChoice::Prophet);
        assert!(input.run_forecast);
        let (s, e) = input.date_range.unwrap();
        assert_eq!((e - s).num_days(), 30);
    }

    #[test]
    fn bad_fields_are_user_errors() {
        let params = FormParams {
            model: Some("lstm".into()),
            ..FormParams::default()
        };
        let err = FormInput::from_params(params).unwrap_err();
        assert!(err.is_user_error());

        let params = FormParams {
            start: Some("someday".into()),
            end: Some("2024-01-01".into()),
            ..FormParams::default()
        };
        assert!(matches!(
            FormInput::from_params(params),
            Err(DashboardError::InvalidDate(_))
        ));
    }

    #[test]
    fn half_open_range_is_ignored() {
        let params = FormParams {
            start: Some("2024-01-01".into()),
            end: Some(" ".into()),
            ..FormParams::default()
        };
        assert_eq!(FormInput::from_params(params).unwrap().date_range, None);
    }

    #[test]
    fn days_are_clamped_into_slider_range() {
        let state = AppState::new(Config::default());
        let input = FormInput {
            days: Some(365),
            ..FormInput::default()
        };
        assert_eq!(live_controls(&state, &input).days, 30);
        assert_eq!(live_controls(&state, &FormInput::default()).city, "Delhi");
    }

    #[tokio::test]
    async fn blocking_run_matches_direct_run() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values = (0..30).map(|i| 20.0 + (i % 7) as f64 + 0.1 * i as f64).collect();
        let series = DailySeries::contiguous(start, values);
        let pipeline = Pipeline::new(crate::pipeline::PipelineSettings::live());
        let request = AnalysisRequest::default();

        let direct = pipeline.run(&series, "upload", &request).unwrap();
        let pooled = run_blocking(&pipeline, Arc::new(series), "upload".to_string(), request)
            .await
            .unwrap();
        assert_eq!(pooled, direct);
    }

    #[test]
    fn bundled_load_errors_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("climate.csv");
        let mut config = Config::default();
        config.bundled.csv_path = path.clone();
        let state = AppState::new(config);

        assert!(state.bundled_series().is_err());
        std::fs::write(&path, "date,meantemp\n2024-01-01,10\n2024-01-02,11\n").unwrap();
        assert_eq!(state.bundled_series().unwrap().len(), 2);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(state.bundled_series().unwrap().len(), 2);
    }
}
