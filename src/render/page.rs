//! Full HTML pages: sidebar form plus the main analysis panel.

use super::chart::{decomposition_chart, forecast_chart, line_chart};
use crate::core::MEAN_TEMP;
use crate::error::Result;
use crate::ingest::DATE_COLUMN;
use crate::models::ModelChoice;
use crate::pipeline::{Banner, BannerLevel, DashboardReport, ForecastPanel, PageOutcome};
use chrono::NaiveDate;

pub const PAGE_TITLE: &str = "Dynamic Weather Time Series Dashboard";
pub const LINE_CHART_TITLE: &str = "Daily Mean Temperature";

const LINE_CAPTION: &str = "This line chart shows the average daily temperature over the \
    selected time period, highlighting overall warming or cooling trends.";
const STL_CAPTION: &str = "STL decomposition separates the temperature time series into its \
    trend, seasonal variation, and random noise, helping understand underlying behaviors.";

const STYLE: &str = "body{margin:0;font-family:sans-serif;display:flex;color:#262730}\
aside{width:280px;min-height:100vh;background:#f0f2f6;padding:1rem;box-sizing:border-box}\
aside label{display:block;margin:.8rem 0 .2rem;font-size:.9rem}\
aside input[type=text],aside select,aside input[type=date]{width:100%}\
main{flex:1;padding:1rem 2rem;max-width:960px}\
.banner{padding:.6rem 1rem;border-radius:.4rem;margin:.5rem 0}\
.info{background:#e8f0fe}.success{background:#e6f4ea}.warning{background:#fef7e0}.error{background:#fce8e6}\
.caption{color:#6b6f76;font-size:.9rem}.chart svg{max-width:100%;height:auto}";

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Current values of the sidebar form.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    /// Path the form posts to.
    pub action: String,
    /// Whether the city, live-data and history controls are shown.
    pub live_controls: bool,
    pub city: String,
    pub use_live: bool,
    pub days: usize,
    pub min_days: usize,
    pub max_days: usize,
    pub model: ModelChoice,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Previously uploaded CSV text, resubmitted with the form.
    pub upload_cache: Option<String>,
}

impl Controls {
    pub fn live(city: &str, days: usize, min_days: usize, max_days: usize) -> Self {
        Self {
            action: "/".to_string(),
            live_controls: true,
            city: city.to_string(),
            use_live: true,
            days,
            min_days,
            max_days,
            model: ModelChoice::default(),
            date_range: None,
            upload_cache: None,
        }
    }

    pub fn bundled() -> Self {
        Self {
            action: "/bundled".to_string(),
            live_controls: false,
            ..Self::live("", 0, 0, 0)
        }
    }
}

/// Render the page for a pipeline outcome.
pub fn render_page(controls: &Controls, outcome: &PageOutcome) -> Result<String> {
    let main = match outcome {
        PageOutcome::NoData { banners } => banners.iter().map(banner).collect(),
        PageOutcome::Report(report) => report_panel(report)?,
    };
    Ok(layout(controls, &main))
}

/// Render a page whose main panel only reports `message` as an error.
pub fn render_error_page(controls: &Controls, message: &str) -> String {
    layout(controls, &banner(&Banner::error(message)))
}

fn layout(controls: &Controls, main: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title><style>{STYLE}</style></head>\n<body>\n{sidebar}\n\
         <main>\n<h1>{title}</h1>\n{main}</main>\n</body></html>\n",
        title = escape_html(PAGE_TITLE),
        sidebar = sidebar(controls),
    )
}

fn sidebar(c: &Controls) -> String {
    let mut html = format!(
        "<aside><form method=\"post\" action=\"{}\" enctype=\"multipart/form-data\">\n<h2>Controls</h2>\n",
        escape_html(&c.action)
    );
    if c.live_controls {
        html.push_str(&format!(
            "<label for=\"city\">Enter City for Live Weather</label>\
             <input type=\"text\" id=\"city\" name=\"city\" value=\"{}\">\n",
            escape_html(&c.city)
        ));
        html.push_str(&format!(
            "<label><input type=\"checkbox\" name=\"use_live\" value=\"on\"{}> Use Live Weather Data</label>\n",
            if c.use_live { " checked" } else { "" }
        ));
        html.push_str(&format!(
            "<label for=\"days\">Days of History</label>\
             <input type=\"range\" id=\"days\" name=\"days\" min=\"{}\" max=\"{}\" value=\"{}\" \
             oninput=\"this.nextElementSibling.value=this.value\"><output>{}</output>\n",
            c.min_days, c.max_days, c.days, c.days
        ));
        html.push_str(
            "<label for=\"file\">Or Upload CSV (with 'date', 'meantemp')</label>\
             <input type=\"file\" id=\"file\" name=\"file\" accept=\".csv,text/csv\">\n",
        );
        if let Some(text) = &c.upload_cache {
            html.push_str(&format!(
                "<textarea name=\"upload_cache\" hidden>{}</textarea>\n",
                escape_html(text)
            ));
        }
    }

    html.push_str("<label for=\"model\">Forecast Model</label><select id=\"model\" name=\"model\">");
    for choice in ModelChoice::ALL {
        let value = match choice {
            ModelChoice::Arima => "arima",
            ModelChoice::Prophet => "prophet",
        };
        html.push_str(&format!(
            "<option value=\"{value}\"{}>{}</option>",
            if choice == c.model { " selected" } else { "" },
            choice.label()
        ));
    }
    html.push_str("</select>\n");
    html.push_str(&format!(
        "<label for=\"x_axis\">X-Axis for Plot</label><select id=\"x_axis\" name=\"x_axis\">\
         <option>{DATE_COLUMN}</option></select>\n\
         <label for=\"y_axis\">Y-Axis for Plot</label><select id=\"y_axis\" name=\"y_axis\">\
         <option>{MEAN_TEMP}</option></select>\n"
    ));

    let (start, end) = match c.date_range {
        Some((s, e)) => (s.to_string(), e.to_string()),
        None => (String::new(), String::new()),
    };
    html.push_str(&format!(
        "<label for=\"start\">Date Range</label>\
         <input type=\"date\" id=\"start\" name=\"start\" value=\"{start}\">\
         <input type=\"date\" name=\"end\" value=\"{end}\">\n"
    ));
    html.push_str(
        "<p><button type=\"submit\" name=\"action\" value=\"refresh\">Apply</button> \
         <button type=\"submit\" name=\"action\" value=\"forecast\">Run Forecast</button></p>\n\
         </form></aside>",
    );
    html
}

fn banner(b: &Banner) -> String {
    let class = match b.level {
        BannerLevel::Info => "info",
        BannerLevel::Success => "success",
        BannerLevel::Warning => "warning",
        BannerLevel::Error => "error",
    };
    format!(
        "<div class=\"banner {class}\">{}</div>\n",
        escape_html(&b.message)
    )
}

fn caption(text: &str) -> String {
    format!(
        "<p class=\"caption\"><strong>Insight:</strong> {}</p>\n",
        escape_html(text)
    )
}

fn chart(svg: &str) -> String {
    format!("<div class=\"chart\">{svg}</div>\n")
}

fn report_panel(report: &DashboardReport) -> Result<String> {
    let mut html = format!("<h3>{}</h3>\n", escape_html(&report.source_label));

    html.push_str(&chart(&line_chart(
        &report.series,
        LINE_CHART_TITLE,
        DATE_COLUMN,
        MEAN_TEMP,
    )?));
    html.push_str(&caption(LINE_CAPTION));

    html.push_str("<h2>STL Decomposition</h2>\n");
    html.push_str(&chart(&decomposition_chart(&report.decomposition)?));
    html.push_str(&caption(STL_CAPTION));

    // The first two banners belong to the stationarity section.
    let (stationarity, rest) = report.banners.split_at(report.banners.len().min(2));
    html.push_str("<h2>Stationarity Test Results</h2>\n");
    html.extend(stationarity.iter().map(banner));

    html.push_str("<h2>Forecasting</h2>\n");
    html.extend(rest.iter().map(banner));
    if let Some(panel) = &report.forecast {
        html.push_str(&forecast_section(panel)?);
    }
    Ok(html)
}

fn forecast_section(panel: &ForecastPanel) -> Result<String> {
    let svg = forecast_chart(&panel.history, &panel.forecast, &panel.title())?;
    Ok(chart(&svg) + &caption(&panel.caption))
}
