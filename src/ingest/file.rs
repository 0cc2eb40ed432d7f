//! CSV ingestion for uploaded files and the bundled climate dataset.

use crate::core::{DailySeries, MEAN_TEMP};
use crate::error::{DashboardError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

pub const DATE_COLUMN: &str = "date";

/// A century of days; the bundled dataset covers about four years.
pub const DEFAULT_MAX_SERIES_DAYS: usize = 36_525;

/// Cells read as "no value".
const NA_MARKERS: [&str; 7] = ["", "NA", "NaN", "nan", "null", "N/A", "-"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Read an uploaded CSV.
///
/// `meantemp` is required. When there is no `date` column the rows are dated
/// as consecutive days ending at `today`, one per row as read. Rows with a
/// missing date or temperature are dropped, other columns are ignored, and
/// the result is reindexed to daily frequency. Dates spanning more than
/// `max_days` days are rejected before reindexing.
pub fn read_uploaded_csv<R: Read>(reader: R, today: NaiveDate, max_days: usize) -> Result<DailySeries> {
    read_series(reader, Some(today), max_days)
}

/// Read the bundled dataset; both `date` and `meantemp` are required.
pub fn read_bundled_csv(path: &Path, max_days: usize) -> Result<DailySeries> {
    let file = File::open(path).map_err(|e| {
        DashboardError::Io(format!("cannot open {}: {e}", path.display()))
    })?;
    read_series(BufReader::new(file), None, max_days)
}

fn read_series<R: Read>(
    reader: R,
    synthesize_until: Option<NaiveDate>,
    max_days: usize,
) -> Result<DailySeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == name)
    };

    let temp_idx = find(MEAN_TEMP).ok_or_else(|| DashboardError::MissingColumn(MEAN_TEMP.into()))?;
    let date_idx = find(DATE_COLUMN);
    if date_idx.is_none() && synthesize_until.is_none() {
        return Err(DashboardError::MissingColumn(DATE_COLUMN.into()));
    }

    let mut rows: Vec<(Option<NaiveDate>, Option<f64>)> = Vec::new();
    for result in reader.records() {
        let record = result?;
        let temp = parse_temperature(record.get(temp_idx).unwrap_or(""))?;
        let date = match date_idx {
            Some(idx) => parse_date_cell(record.get(idx).unwrap_or(""))?,
            None => None,
        };
        rows.push((date, temp));
    }

    if let (None, Some(today)) = (date_idx, synthesize_until) {
        let n = rows.len() as i64;
        for (i, row) in rows.iter_mut().enumerate() {
            row.0 = Some(today - Duration::days(n - 1 - i as i64));
        }
    }

    let total = rows.len();
    let records: Vec<(NaiveDate, f64)> = rows
        .into_iter()
        .filter_map(|(d, v)| Some((d?, v?)))
        .collect();
    debug!(rows = total, kept = records.len(), "read csv");
    check_span(&records, max_days)?;

    Ok(DailySeries::from_records(records)?.as_daily())
}

/// Reject records whose daily index would exceed `max_days` entries.
fn check_span(records: &[(NaiveDate, f64)], max_days: usize) -> Result<()> {
    let (Some(first), Some(last)) = (
        records.iter().map(|(d, _)| *d).min(),
        records.iter().map(|(d, _)| *d).max(),
    ) else {
        return Ok(());
    };
    let span = (last - first).num_days() + 1;
    if span > max_days as i64 {
        return Err(DashboardError::InvalidParameter(format!(
            "dates from {first} to {last} span {span} days, more than the {max_days}-day limit"
        )));
    }
    Ok(())
}

fn is_na(cell: &str) -> bool {
    NA_MARKERS.contains(&cell)
}

fn parse_temperature(cell: &str) -> Result<Option<f64>> {
    if is_na(cell) {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(DashboardError::Csv(format!(
            "cannot parse {MEAN_TEMP} value '{cell}'"
        ))),
    }
}

fn parse_date_cell(cell: &str) -> Result<Option<NaiveDate>> {
    if is_na(cell) {
        return Ok(None);
    }
    parse_date(cell).map(Some)
}

/// Parse a calendar date in any of the accepted layouts.
///
/// Timestamps are accepted too; only their date part is kept.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }
    Err(DashboardError::InvalidDate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ==================== dates ====================

    #[test]
    fn parse_date_layouts() {
        assert_eq!(parse_date("2017-01-05").unwrap(), d(2017, 1, 5));
        assert_eq!(parse_date("2017/01/05").unwrap(), d(2017, 1, 5));
        assert_eq!(parse_date("01/05/2017").unwrap(), d(2017, 1, 5));
        assert_eq!(parse_date("05-01-2017").unwrap(), d(2017, 1, 5));
        assert_eq!(parse_date("2017-01-05 00:00:00").unwrap(), d(2017, 1, 5));
        assert_eq!(parse_date("2017-01-05T13:45:00Z").unwrap(), d(2017, 1, 5));
        assert!(matches!(
            parse_date("yesterday"),
            Err(DashboardError::InvalidDate(_))
        ));
    }

    // ==================== uploads ====================

    #[test]
    fn upload_with_dates_reindexes_daily() {
        let csv = "date,meantemp,humidity\n2024-01-01,10.0,80\n2024-01-04,13.0,70\n2024-01-02,11.0,75\n";
        let series = read_uploaded_csv(csv.as_bytes(), d(2030, 1, 1), DEFAULT_MAX_SERIES_DAYS).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.first_date(), Some(d(2024, 1, 1)));
        assert_eq!(series.values()[1], 11.0);
        assert!(series.values()[2].is_nan());
        assert_eq!(series.label(), MEAN_TEMP);
    }

    #[test]
    fn upload_without_dates_ends_today() {
        let csv = "meantemp\n1\n2\n3\n4\n5\n";
        let today = d(2024, 3, 10);
        let series = read_uploaded_csv(csv.as_bytes(), today, DEFAULT_MAX_SERIES_DAYS).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.first_date(), Some(d(2024, 3, 6)));
        assert_eq!(series.last_date(), Some(today));
        assert_eq!(series.values(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn missing_cells_drop_rows() {
        let csv = "date,meantemp\n2024-01-01,10\n,11\n2024-01-03,NA\n2024-01-04,\n2024-01-05,14\n";
        let series = read_uploaded_csv(csv.as_bytes(), d(2030, 1, 1), DEFAULT_MAX_SERIES_DAYS).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.missing_count(), 3);
        assert_eq!(series.values()[4], 14.0);
    }

    #[test]
    fn synthesized_dates_count_dropped_rows() {
        let csv = "meantemp\n1\nNA\n3\n";
        let today = d(2024, 3, 10);
        let series = read_uploaded_csv(csv.as_bytes(), today, DEFAULT_MAX_SERIES_DAYS).unwrap();
        assert_eq!(series.first_date(), Some(d(2024, 3, 8)));
        assert_eq!(series.len(), 3);
        assert!(series.values()[1].is_nan());
    }

    #[test]
    fn upload_errors() {
        let today = d(2024, 1, 1);
        assert!(matches!(
            read_uploaded_csv("date,temp\n2024-01-01,3\n".as_bytes(), today, DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::MissingColumn(c)) if c == MEAN_TEMP
        ));
        assert!(matches!(
            read_uploaded_csv("date,meantemp\n2024-01-01,warm\n".as_bytes(), today, DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::Csv(_))
        ));
        assert!(matches!(
            read_uploaded_csv("date,meantemp\nsoon,3\n".as_bytes(), today, DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::InvalidDate(_))
        ));
        assert!(matches!(
            read_uploaded_csv("date,meantemp\n2024-01-01,3\n2024-01-01,4\n".as_bytes(), today, DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::DuplicateDate(_))
        ));
    }

    #[test]
    fn extreme_date_span_is_rejected() {
        let csv = "date,meantemp\n0001-01-01,1\n9999-12-31,2\n";
        let err = read_uploaded_csv(csv.as_bytes(), d(2024, 1, 1), DEFAULT_MAX_SERIES_DAYS).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidParameter(ref m) if m.contains("3652059 days")));
        assert!(err.is_user_error());
    }

    #[test]
    fn span_limit_is_inclusive() {
        let csv = "date,meantemp\n2024-01-01,1\n2024-01-10,2\n";
        let series = read_uploaded_csv(csv.as_bytes(), d(2030, 1, 1), 10).unwrap();
        assert_eq!(series.len(), 10);
        assert!(matches!(
            read_uploaded_csv(csv.as_bytes(), d(2030, 1, 1), 9),
            Err(DashboardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_upload_is_empty_series() {
        let series = read_uploaded_csv("date,meantemp\n".as_bytes(), d(2024, 1, 1), DEFAULT_MAX_SERIES_DAYS).unwrap();
        assert!(series.is_empty());
    }

    // ==================== bundled ====================

    #[test]
    fn bundled_requires_date_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("climate.csv");
        std::fs::write(&path, "meantemp\n1\n2\n").unwrap();
        assert!(matches!(
            read_bundled_csv(&path, DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::MissingColumn(c)) if c == DATE_COLUMN
        ));
        assert!(matches!(
            read_bundled_csv(&dir.path().join("absent.csv"), DEFAULT_MAX_SERIES_DAYS),
            Err(DashboardError::Io(_))
        ));
    }
}
