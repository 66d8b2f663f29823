//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::orchestrator::repo_short_name;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// repocast - GitHub activity history and forecasts
///
/// Collects two years of issue activity for a repository, buckets it by
/// month, and asks a forecasting service for artifacts on each series.
///
/// Examples:
///   repocast analyze angular/angular-cli
///   repocast analyze ollama/ollama --as-of 2024-06-01 --format markdown
///   repocast stars --output stars.json
///   repocast --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .repocast.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// GitHub token used for API requests
    ///
    /// Raises the rate limit. Never written to any file or log.
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub github_url: Option<String>,

    /// Forecasting service base URL
    #[arg(long, global = true, value_name = "URL", env = "REPOCAST_FORECAST_URL")]
    pub forecast_url: Option<String>,

    /// Number of one-month issue windows to scan
    #[arg(long, global = true, value_name = "COUNT")]
    pub windows: Option<usize>,

    /// Number of window queries in flight
    #[arg(long, global = true, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds for every outbound call
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format (json, markdown)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path; stdout when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .repocast.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// What to produce.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Aggregate and forecast the activity of one repository
    Analyze {
        /// Repository as owner/name
        #[arg(value_name = "OWNER/NAME")]
        repository: String,

        /// Anchor date for the issue windows (defaults to today, UTC)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<NaiveDate>,
    },
    /// Bar chart of star counts across the reference repositories
    Stars,
    /// Bar chart of fork counts across the reference repositories
    Forks,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON wire format (default)
    #[default]
    Json,
    /// Markdown summary
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("A command is required: analyze, stars or forks".to_string());
        };

        if let Command::Analyze { repository, .. } = command {
            if repo_short_name(repository).is_none() {
                return Err(format!(
                    "Repository must have the form owner/name, got '{}'",
                    repository
                ));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for (flag, url) in [
            ("GitHub", &self.github_url),
            ("Forecast", &self.forecast_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} URL must start with 'http://' or 'https://'", flag));
                }
            }
        }

        if self.windows == Some(0) {
            return Err("Window count must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Arguments with every optional flag unset.
    #[cfg(test)]
    pub(crate) fn for_command(command: Command) -> Self {
        Self {
            command: Some(command),
            config: None,
            token: None,
            github_url: None,
            forecast_url: None,
            windows: None,
            concurrency: None,
            timeout: None,
            format: None,
            output: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }
}
