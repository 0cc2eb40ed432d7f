//! Error types for the weather dashboard.

use thiserror::Error;

/// Result type alias for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Errors that can occur while ingesting, analysing or rendering a series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A required CSV column is absent.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// A date cell could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The same calendar day occurs more than once.
    #[error("duplicate date {0} in series")]
    DuplicateDate(chrono::NaiveDate),

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),

    /// CSV reader error.
    #[error("csv error: {0}")]
    Csv(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(String),

    /// Response document could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// File system error.
    #[error("io error: {0}")]
    Io(String),

    /// Chart rendering failed.
    #[error("render error: {0}")]
    Render(String),
}

impl From<csv::Error> for DashboardError {
    fn from(e: csv::Error) -> Self {
        DashboardError::Csv(e.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        DashboardError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        DashboardError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for DashboardError {
    fn from(e: toml::de::Error) -> Self {
        DashboardError::Config(e.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::Io(e.to_string())
    }
}

impl DashboardError {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DashboardError::EmptyData
                | DashboardError::InsufficientData { .. }
                | DashboardError::InvalidParameter(_)
                | DashboardError::MissingColumn(_)
                | DashboardError::InvalidDate(_)
                | DashboardError::DuplicateDate(_)
                | DashboardError::MissingValues
                | DashboardError::Csv(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn error_messages_are_descriptive() {
        let err = DashboardError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = DashboardError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );

        let err = DashboardError::MissingColumn("meantemp".to_string());
        assert_eq!(err.to_string(), "missing column 'meantemp'");

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = DashboardError::DuplicateDate(date);
        assert_eq!(err.to_string(), "duplicate date 2024-03-01 in series");

        let err = DashboardError::FitRequired;
        assert_eq!(err.to_string(), "model must be fitted before prediction");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = DashboardError::EmptyData;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }

    #[test]
    fn user_errors_are_classified() {
        assert!(DashboardError::MissingColumn("date".into()).is_user_error());
        assert!(DashboardError::InsufficientData { needed: 4, got: 1 }.is_user_error());
        assert!(!DashboardError::Http("timeout".into()).is_user_error());
        assert!(!DashboardError::Render("svg".into()).is_user_error());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: DashboardError = io.into();
        assert!(matches!(err, DashboardError::Io(msg) if msg.contains("no such file")));
    }
}
