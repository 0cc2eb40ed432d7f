//! Date-indexed daily temperature series.

use crate::error::{DashboardError, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Default column label of the temperature field.
pub const MEAN_TEMP: &str = "meantemp";

/// A date-indexed series with one numeric field.
///
/// Dates are strictly increasing. `NaN` marks a missing observation. After
/// [`DailySeries::as_daily`] the index is a contiguous daily calendar and after
/// [`DailySeries::gap_filled`] no position is missing (unless every value was).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    label: String,
}

impl DailySeries {
    /// Create a series from parallel date and value vectors.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(DashboardError::DimensionMismatch {
                expected: dates.len(),
                got: values.len(),
            });
        }
        for w in dates.windows(2) {
            if w[1] == w[0] {
                return Err(DashboardError::DuplicateDate(w[1]));
            }
            if w[1] < w[0] {
                return Err(DashboardError::InvalidParameter(
                    "dates must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            dates,
            values,
            label: MEAN_TEMP.to_string(),
        })
    }

    /// Build a series from unordered `(date, value)` records.
    pub fn from_records(mut records: Vec<(NaiveDate, f64)>) -> Result<Self> {
        records.sort_by_key(|(d, _)| *d);
        let (dates, values) = records.into_iter().unzip();
        Self::new(dates, values)
    }

    /// A contiguous daily series starting at `start`.
    pub fn contiguous(start: NaiveDate, values: Vec<f64>) -> Self {
        let dates = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self {
            dates,
            values,
            label: MEAN_TEMP.to_string(),
        }
    }

    /// An empty series.
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
            label: MEAN_TEMP.to_string(),
        }
    }

    /// Replace the series label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Iterate over `(date, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Whether consecutive dates are exactly one day apart.
    pub fn is_contiguous(&self) -> bool {
        self.dates.windows(2).all(|w| w[1] - w[0] == Duration::days(1))
    }

    /// Whether any value is NaN or infinite.
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Number of missing (non-finite) values.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }

    /// Whether every value is missing (true for an empty series).
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(|v| !v.is_finite())
    }

    /// Reindex onto a contiguous daily calendar from the first to the last date.
    ///
    /// Days absent from the index are inserted with a missing value.
    pub fn as_daily(&self) -> DailySeries {
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return DailySeries::empty().with_label(self.label.clone());
        };
        let span = (last - first).num_days() as usize + 1;
        let mut values = vec![f64::NAN; span];
        for (d, v) in self.iter() {
            values[(d - first).num_days() as usize] = v;
        }
        DailySeries::contiguous(first, values).with_label(self.label.clone())
    }

    /// Fill gaps: linear interpolation by position for interior gaps, then
    /// backward fill and forward fill for the edges.
    pub fn gap_filled(&self) -> DailySeries {
        let mut values: Vec<f64> = self
            .values
            .iter()
            .map(|&v| if v.is_finite() { v } else { f64::NAN })
            .collect();
        interpolate_interior(&mut values);
        backward_fill(&mut values);
        forward_fill(&mut values);
        DailySeries {
            dates: self.dates.clone(),
            values,
            label: self.label.clone(),
        }
    }

    /// Copy without the missing observations.
    pub fn drop_missing(&self) -> DailySeries {
        let (dates, values) = self.iter().filter(|(_, v)| v.is_finite()).unzip();
        DailySeries {
            dates,
            values,
            label: self.label.clone(),
        }
    }

    /// Observations with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Result<DailySeries> {
        if start > end {
            return Err(DashboardError::InvalidParameter(format!(
                "date range start {start} is after end {end}"
            )));
        }
        let (dates, values) = self
            .iter()
            .filter(|(d, _)| *d >= start && *d <= end)
            .unzip();
        Ok(DailySeries {
            dates,
            values,
            label: self.label.clone(),
        })
    }

    /// The `horizon` consecutive days strictly after the last date.
    pub fn next_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        match self.last_date() {
            Some(last) => (1..=horizon as i64).map(|i| last + Duration::days(i)).collect(),
            None => Vec::new(),
        }
    }
}

fn interpolate_interior(values: &mut [f64]) {
    let n = values.len();
    let mut i = 0;
    while i < n {
        if !values[i].is_nan() {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && values[i].is_nan() {
            i += 1;
        }
        if start == 0 || i == n {
            continue;
        }
        let left = values[start - 1];
        let right = values[i];
        let steps = (i - start + 1) as f64;
        for (j, slot) in values[start..i].iter_mut().enumerate() {
            *slot = left + (right - left) * (j + 1) as f64 / steps;
        }
    }
}

fn backward_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}

fn forward_fill(values: &mut [f64]) {
    let mut prev = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = prev;
        } else {
            prev = *v;
        }
    }
}
