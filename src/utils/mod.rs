//! Numerical helpers shared by the analysis and forecasting modules.

pub mod ols;
pub mod optimization;
pub mod stats;

pub use ols::{ols_fit, ridge_fit, OLSResult};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{mean, normal_cdf, quantile_normal, variance};
