//! # weather-dashboard
//!
//! Serves the dashboard or runs the analysis once from the command line.

use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weather_ts_dashboard::config::{load_config, Config};
use weather_ts_dashboard::core::DailySeries;
use weather_ts_dashboard::error::{DashboardError, Result};
use weather_ts_dashboard::ingest::{read_bundled_csv, read_uploaded_csv, OpenWeatherClient, CITY_NOT_FOUND_MESSAGE};
use weather_ts_dashboard::models::ModelChoice;
use weather_ts_dashboard::pipeline::{AnalysisRequest, DashboardReport, PageOutcome, Pipeline};
use weather_ts_dashboard::render::{render_page, Controls};
use weather_ts_dashboard::server;

#[derive(Parser)]
#[command(name = "weather-dashboard", version)]
#[command(about = "Daily temperature time series dashboard", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "WEATHER_DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web dashboard
    Serve {
        /// Address to bind, overriding the configuration
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Run the analysis once and print the result
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// CSV file with a `meantemp` column and an optional `date` column
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Fetch live history for this city
    #[arg(long)]
    city: Option<String>,

    /// Use the bundled climate dataset
    #[arg(long)]
    bundled: bool,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Days of live history to fetch
    #[arg(long)]
    days: Option<usize>,

    /// Forecast model (arima, prophet)
    #[arg(short, long, default_value = "arima")]
    model: ModelChoice,

    /// Also run the forecast
    #[arg(short, long)]
    forecast: bool,

    /// First day to analyse (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last day to analyse (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Write the dashboard page to this file
    #[arg(long)]
    html: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Commands::Serve { bind } => {
            if let Some(addr) = bind {
                config.server.bind = addr;
            }
            server::serve(config).await
        }
        Commands::Analyze(args) => run_analyze(&config, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_analyze(config: &Config, args: AnalyzeArgs) -> Result<()> {
    let (series, label, settings, mut controls) = if let Some(path) = &args.source.input {
        let file = File::open(path)
            .map_err(|e| DashboardError::Io(format!("cannot open {}: {e}", path.display())))?;
        let today = Local::now().date_naive();
        let series = read_uploaded_csv(BufReader::new(file), today, config.dashboard.max_series_days)?;
        let d = &config.dashboard;
        let mut controls = Controls::live(&d.default_city, d.default_days, d.min_days, d.max_days);
        controls.use_live = false;
        (series, "Uploaded CSV".to_string(), config.live_pipeline(), controls)
    } else if let Some(city) = &args.source.city {
        let d = &config.dashboard;
        let days = d.clamp_days(args.days.unwrap_or(d.default_days));
        let series = fetch_live(config, city, days).await?;
        let controls = Controls::live(city, days, d.min_days, d.max_days);
        (series, format!("Live Data for {city}"), config.live_pipeline(), controls)
    } else {
        let path = &config.bundled.csv_path;
        let series = read_bundled_csv(path, config.dashboard.max_series_days)?;
        let label = format!("Bundled Dataset: {}", path.display());
        (series, label, config.bundled_pipeline(), Controls::bundled())
    };

    let request = AnalysisRequest {
        model: args.model,
        run_forecast: args.forecast,
        date_range: args.start.zip(args.end),
    };
    controls.model = request.model;
    controls.date_range = request.date_range;

    let outcome = Pipeline::new(settings).run(&series, &label, &request)?;

    if let Some(path) = &args.html {
        std::fs::write(path, render_page(&controls, &outcome)?)?;
        tracing::info!(path = %path.display(), "wrote dashboard page");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

async fn fetch_live(config: &Config, city: &str, days: usize) -> Result<DailySeries> {
    let client = OpenWeatherClient::new(&config.weather)?;
    client
        .fetch_history(city, days, Utc::now())
        .await?
        .ok_or_else(|| DashboardError::InvalidParameter(format!("{CITY_NOT_FOUND_MESSAGE} ({city})")))
}

fn print_summary(outcome: &PageOutcome) {
    match outcome {
        PageOutcome::NoData { banners } => {
            for b in banners {
                println!("[{:?}] {}", b.level, b.message);
            }
        }
        PageOutcome::Report(report) => print_report(report),
    }
}

fn print_report(report: &DashboardReport) {
    let series = &report.series;
    println!("{}", report.source_label);
    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        println!("  {} days, {first} to {last}", series.len());
    }
    println!(
        "  STL (period {}): trend strength {:.3}, seasonal strength {:.3}",
        report.decomposition.period,
        report.decomposition.trend_strength(),
        report.decomposition.seasonal_strength()
    );
    println!(
        "  ADF statistic {:.4} (lags {}), KPSS statistic {:.4} (lags {})",
        report.stationarity.adf.statistic,
        report.stationarity.adf.lags,
        report.stationarity.kpss.statistic,
        report.stationarity.kpss.lags
    );
    for b in &report.banners {
        println!("[{:?}] {}", b.level, b.message);
    }

    if let Some(panel) = &report.forecast {
        println!("\n{} ({})", panel.title(), panel.model);
        let future = match series.last_date() {
            Some(last) => panel.forecast.after(last),
            None => panel.forecast.clone(),
        };
        for (date, value) in future.iter() {
            println!("  {date}  {value:>8.2}");
        }
    }
}
