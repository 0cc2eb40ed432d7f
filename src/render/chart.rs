//! SVG charts drawn with plotters.

use crate::analysis::Decomposition;
use crate::core::{DailySeries, Forecast};
use crate::error::{DashboardError, Result};
use chrono::{Duration, NaiveDate};
use plotters::coord::types::RangedDate;
use plotters::prelude::*;

const WIDTH: u32 = 900;
const HEIGHT: u32 = 420;
const FACET_HEIGHT: u32 = 260;

const HISTORY_COLOR: RGBColor = RGBColor(31, 119, 180);
const FORECAST_COLOR: RGBColor = RGBColor(214, 39, 40);

fn render_err<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Render(e.to_string())
}

/// Date and value bounds of the finite points, padded by 10% of the value span.
fn bounds<'a>(
    points: impl Iterator<Item = &'a (NaiveDate, f64)>,
) -> Option<((NaiveDate, NaiveDate), (f64, f64))> {
    let mut dates: Option<(NaiveDate, NaiveDate)> = None;
    let mut values = (f64::INFINITY, f64::NEG_INFINITY);
    for &(d, v) in points {
        dates = Some(match dates {
            Some((lo, hi)) => (lo.min(d), hi.max(d)),
            None => (d, d),
        });
        values = (values.0.min(v), values.1.max(v));
    }
    let (first, mut last) = dates?;
    if first == last {
        last = first + Duration::days(1);
    }
    let pad = if (values.1 - values.0).abs() > 1e-9 {
        (values.1 - values.0) * 0.1
    } else {
        1.0
    };
    Some(((first, last), (values.0 - pad, values.1 + pad)))
}

fn finite_points(dates: &[NaiveDate], values: &[f64]) -> Vec<(NaiveDate, f64)> {
    dates
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .map(|(d, v)| (*d, *v))
        .collect()
}

fn date_label(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// A single line over time.
pub fn line_chart(series: &DailySeries, title: &str, x_label: &str, y_label: &str) -> Result<String> {
    let points = finite_points(series.dates(), series.values());
    let ((first, last), (lo, hi)) = bounds(points.iter()).ok_or(DashboardError::EmptyData)?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(16)
            .x_label_area_size(40)
            .y_label_area_size(56)
            .build_cartesian_2d(RangedDate::from(first..last), lo..hi)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc(y_label)
            .x_labels(6)
            .x_label_formatter(&date_label)
            .light_line_style(BLACK.mix(0.1))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(LineSeries::new(points, HISTORY_COLOR.stroke_width(2)))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Trend, seasonal and residual components stacked in three facets.
pub fn decomposition_chart(decomposition: &Decomposition) -> Result<String> {
    if decomposition.is_empty() {
        return Err(DashboardError::EmptyData);
    }
    let facets = [
        ("Trend", &decomposition.trend),
        ("Seasonal", &decomposition.seasonal),
        ("Residual", &decomposition.residual),
    ];

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, FACET_HEIGHT * 3)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        for (area, (name, values)) in root.split_evenly((3, 1)).iter().zip(facets) {
            let points = finite_points(&decomposition.dates, values);
            let Some(((first, last), (lo, hi))) = bounds(points.iter()) else {
                continue;
            };
            let mut chart = ChartBuilder::on(area)
                .caption(name, ("sans-serif", 18))
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(56)
                .build_cartesian_2d(RangedDate::from(first..last), lo..hi)
                .map_err(render_err)?;
            chart
                .configure_mesh()
                .y_desc("Value")
                .x_labels(6)
                .x_label_formatter(&date_label)
                .light_line_style(BLACK.mix(0.1))
                .draw()
                .map_err(render_err)?;
            chart
                .draw_series(LineSeries::new(points, HISTORY_COLOR.stroke_width(2)))
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Observed history with the forecast drawn over it.
///
/// Interval bounds, when present, are drawn as faint lines.
pub fn forecast_chart(history: &DailySeries, forecast: &Forecast, title: &str) -> Result<String> {
    let observed = finite_points(history.dates(), history.values());
    let predicted = finite_points(forecast.dates(), forecast.point());
    let lower = forecast
        .lower()
        .map(|b| finite_points(forecast.dates(), b))
        .unwrap_or_default();
    let upper = forecast
        .upper()
        .map(|b| finite_points(forecast.dates(), b))
        .unwrap_or_default();

    let all = observed
        .iter()
        .chain(&predicted)
        .chain(&lower)
        .chain(&upper);
    let ((first, last), (lo, hi)) = bounds(all).ok_or(DashboardError::EmptyData)?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(16)
            .x_label_area_size(40)
            .y_label_area_size(56)
            .build_cartesian_2d(RangedDate::from(first..last), lo..hi)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Temperature")
            .x_labels(6)
            .x_label_formatter(&date_label)
            .light_line_style(BLACK.mix(0.1))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(LineSeries::new(observed, HISTORY_COLOR.stroke_width(2)))
            .map_err(render_err)?
            .label("Observed")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], HISTORY_COLOR));

        chart
            .draw_series(LineSeries::new(predicted, FORECAST_COLOR.stroke_width(2)))
            .map_err(render_err)?
            .label("Forecast")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], FORECAST_COLOR));

        for bound in [lower, upper] {
            if !bound.is_empty() {
                chart
                    .draw_series(LineSeries::new(bound, FORECAST_COLOR.mix(0.35)))
                    .map_err(render_err)?;
            }
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}
