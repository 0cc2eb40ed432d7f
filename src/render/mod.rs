//! Presentation: SVG charts and HTML pages.

pub mod chart;
pub mod page;

pub use chart::{decomposition_chart, forecast_chart, line_chart};
pub use page::{escape_html, render_error_page, render_page, Controls, PAGE_TITLE};
