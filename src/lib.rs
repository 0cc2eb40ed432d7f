//! # weather-ts-dashboard
//!
//! Daily temperature time series dashboard.
//!
//! Series come from an uploaded CSV, a bundled climate dataset or the
//! OpenWeather historical API. Each request gap-fills the series, runs the
//! ADF and KPSS stationarity tests, decomposes it with STL and optionally
//! forecasts it with ARIMA or an additive (Prophet-style) model. Results are
//! rendered as an HTML page with SVG charts.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::needless_range_loop)]

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod utils;

pub use error::{DashboardError, Result};

pub mod prelude {
    pub use crate::analysis::{decompose, stationarity_tests, StationarityVerdict};
    pub use crate::core::{DailySeries, Forecast};
    pub use crate::error::{DashboardError, Result};
    pub use crate::models::{Forecaster, ModelChoice};
    pub use crate::pipeline::{AnalysisRequest, PageOutcome, Pipeline, PipelineSettings};
}
