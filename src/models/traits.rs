//! Forecaster trait defining the common interface for all models.

use crate::core::{DailySeries, Forecast};
use crate::error::Result;

/// Common interface for all forecasting models.
pub trait Forecaster {
    /// Fit the model to a daily series.
    fn fit(&mut self, series: &DailySeries) -> Result<()>;

    /// Predict the `horizon` days following the last fitted date.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// Generate predictions with intervals at the given coverage `level`.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let _ = level;
        self.predict(horizon)
    }

    /// Get the fitted values (in-sample predictions).
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Get the residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

