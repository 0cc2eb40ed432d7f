//! Core data structures: the daily series and dated forecasts.

mod daily_series;
mod forecast;

pub use daily_series::{DailySeries, MEAN_TEMP};
pub use forecast::Forecast;
