//! Dated forecast output.

use crate::error::{DashboardError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// Point predictions on a date index with optional prediction intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Forecast {
    dates: Vec<NaiveDate>,
    point: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lower: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upper: Option<Vec<f64>>,
}

impl Forecast {
    /// A forecast with no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a forecast from dates and point predictions.
    pub fn new(dates: Vec<NaiveDate>, point: Vec<f64>) -> Result<Self> {
        check_len(dates.len(), point.len())?;
        Ok(Self {
            dates,
            point,
            lower: None,
            upper: None,
        })
    }

    /// Create a forecast with prediction intervals.
    pub fn with_intervals(
        dates: Vec<NaiveDate>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self> {
        check_len(dates.len(), point.len())?;
        check_len(dates.len(), lower.len())?;
        check_len(dates.len(), upper.len())?;
        Ok(Self {
            dates,
            point,
            lower: Some(lower),
            upper: Some(upper),
        })
    }

    /// Number of forecast rows.
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> Option<&[f64]> {
        self.lower.as_deref()
    }

    pub fn upper(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    pub fn has_intervals(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Iterate over `(date, point)` rows.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.point.iter().copied())
    }

    /// Rows dated strictly after `date`.
    pub fn after(&self, date: NaiveDate) -> Forecast {
        let start = self.dates.partition_point(|d| *d <= date);
        Forecast {
            dates: self.dates[start..].to_vec(),
            point: self.point[start..].to_vec(),
            lower: self.lower.as_ref().map(|v| v[start..].to_vec()),
            upper: self.upper.as_ref().map(|v| v[start..].to_vec()),
        }
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(DashboardError::DimensionMismatch { expected, got });
    }
    Ok(())
}
