//! Series diagnostics: stationarity tests and seasonal decomposition.

pub mod decomposition;
pub mod stationarity;

pub use decomposition::{decompose, Decomposition, STLResult, STL};
pub use stationarity::{
    adf_test, kpss_test, stationarity_tests, CriticalValues, StationarityReport,
    StationarityResult, StationarityVerdict, DEFAULT_SIGNIFICANCE,
};
