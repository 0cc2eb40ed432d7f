//! Data acquisition: uploaded or bundled CSV files and the live weather API.

mod file;
pub mod weather;

pub use file::{parse_date, read_bundled_csv, read_uploaded_csv, DATE_COLUMN, DEFAULT_MAX_SERIES_DAYS};
pub use weather::{Location, OpenWeatherClient, CITY_NOT_FOUND_MESSAGE};
