//! repocast - GitHub activity aggregation and forecast fan-out
//!
//! A CLI tool that collects a repository's issue, pull request and branch
//! activity, buckets it into monthly series, and requests forecast
//! artifacts for each series from a forecasting service.
//!
//! Exit codes:
//!   0 - Success (possibly with some fields degraded to null)
//!   1 - Fatal error (bad config, repository lookup failure, output failure)
//!   130 - Interrupted

mod analysis;
mod charts;
mod cli;
mod config;
mod error;
mod forecast;
mod github;
mod models;
mod orchestrator;
mod report;

use anyhow::{Context, Result};
use charts::ReferenceChartBuilder;
use chrono::Utc;
use cli::{Args, Command, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use forecast::{ForecastClient, ForecastConfig};
use github::{GitHubClient, GitHubConfig, ListingSettings, ScanSettings};
use models::{ChartMetric, ErrorPayload};
use orchestrator::{AggregationOrchestrator, PipelineSettings};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Load configuration; the file can turn on verbose logging
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("repocast v{}", env!("CARGO_PKG_VERSION"));
    match args.config {
        Some(ref path) => info!("Loaded config from: {}", path.display()),
        None => debug!("Config file: {} (optional)", DEFAULT_CONFIG_FILE),
    }

    let exit_code = tokio::select! {
        result = run(&args, &config) => match result {
            Ok(()) => 0,
            Err(e) => {
                error!("Request failed: {:#}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning in-flight requests");
            130
        }
    };

    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .repocast.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    eprintln!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    eprintln!("   Set GITHUB_TOKEN in the environment; tokens are never read from this file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so stdout carries nothing but the response.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Produce the response and write it out.
///
/// Failures are also written to the output as an error payload before
/// being returned.
async fn run(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();
    let destination = config.general.output.as_deref();

    match produce(args, config).await {
        Ok(content) => {
            write_output(destination, &content)?;
            info!("Done in {:.1}s", start_time.elapsed().as_secs_f64());
            Ok(())
        }
        Err(e) => {
            let payload = ErrorPayload {
                error: e.to_string(),
            };
            let content = serde_json::to_string_pretty(&payload)?;
            write_output(destination, &content)?;
            Err(e)
        }
    }
}

/// Build the clients and render the response for the requested command.
async fn produce(args: &Args, config: &Config) -> Result<String> {
    let github = GitHubClient::new(GitHubConfig::from_settings(
        &config.github,
        args.token.clone(),
    ))?;
    let forecast = ForecastClient::new(ForecastConfig::from(&config.forecast))?;
    let format = config.general.format;

    match args.command {
        Some(Command::Analyze {
            ref repository,
            as_of,
        }) => {
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let settings = PipelineSettings {
                scan: ScanSettings {
                    show_progress: !args.quiet,
                    ..ScanSettings::from(&config.github)
                },
                listing: ListingSettings::from(&config.github),
            };

            info!("Analyzing {} as of {}", repository, today);
            let response = AggregationOrchestrator::new(&github, &forecast, settings)
                .aggregate(repository, today)
                .await?;

            let unavailable = response
                .forecasts()
                .iter()
                .filter(|f| !f.is_available())
                .count();
            if unavailable > 0 {
                warn!("{} of 4 forecasts unavailable", unavailable);
            }

            match format {
                OutputFormat::Json => report::generate_json_report(&response),
                OutputFormat::Markdown => Ok(report::generate_markdown_report(&response)),
            }
        }
        Some(Command::Stars) => chart(&github, &forecast, config, ChartMetric::Stars, format).await,
        Some(Command::Forks) => chart(&github, &forecast, config, ChartMetric::Forks, format).await,
        None => anyhow::bail!("No command given"),
    }
}

async fn chart(
    github: &GitHubClient,
    forecast: &ForecastClient,
    config: &Config,
    metric: ChartMetric,
    format: OutputFormat,
) -> Result<String> {
    let chart = ReferenceChartBuilder::new(github, forecast, &config.reference.repositories)
        .build(metric)
        .await;

    match format {
        OutputFormat::Json => report::generate_chart_json(&chart),
        OutputFormat::Markdown => Ok(report::generate_chart_markdown(&chart)),
    }
}

/// Write to the output file, or stdout when none is configured.
fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output saved to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// A config file that exists but cannot be parsed is an error.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    Ok(Config::load_default()?.unwrap_or_default())
}
