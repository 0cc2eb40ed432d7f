//! Forecasting models.

mod traits;

pub mod additive;
pub mod arima;

pub use additive::AdditiveModel;
pub use arima::{ARIMASpec, ARIMA};
pub use traits::Forecaster;

use crate::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forecast model offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Arima,
    /// Additive trend + seasonality model, labelled "Prophet".
    #[serde(alias = "additive")]
    Prophet,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Arima, ModelChoice::Prophet];

    /// Label shown in the UI.
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Arima => "ARIMA",
            ModelChoice::Prophet => "Prophet",
        }
    }

}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelChoice {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arima" => Ok(ModelChoice::Arima),
            "prophet" | "additive" => Ok(ModelChoice::Prophet),
            other => Err(DashboardError::InvalidParameter(format!(
                "unknown forecast model '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_choice_parses_labels() {
        assert_eq!("ARIMA".parse::<ModelChoice>().unwrap(), ModelChoice::Arima);
        assert_eq!("Prophet".parse::<ModelChoice>().unwrap(), ModelChoice::Prophet);
        assert_eq!("additive".parse::<ModelChoice>().unwrap(), ModelChoice::Prophet);
        assert!("ets".parse::<ModelChoice>().is_err());
    }
}
