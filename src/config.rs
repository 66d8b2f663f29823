//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.repocast.toml` files. The GitHub token is deliberately absent: it only
//! ever comes from the command line or the environment.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".repocast.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// GitHub access settings.
    #[serde(default)]
    pub github: HostingConfig,

    /// Forecasting service settings.
    #[serde(default)]
    pub forecast: ForecastServiceConfig,

    /// Repositories compared in the star and fork charts.
    #[serde(default)]
    pub reference: ReferenceConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output file path; stdout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Items requested per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Number of one-month issue windows to scan.
    #[serde(default = "default_window_count")]
    pub window_count: usize,

    /// Window queries in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pages followed on the pull request and branch listings.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_github_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header; GitHub rejects requests without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            per_page: default_per_page(),
            window_count: default_window_count(),
            concurrency: default_concurrency(),
            max_pages: default_max_pages(),
            timeout_seconds: default_github_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_window_count() -> usize {
    24
}

fn default_concurrency() -> usize {
    6
}

fn default_max_pages() -> u32 {
    1
}

fn default_github_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("repocast/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Forecasting service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastServiceConfig {
    /// Service base URL.
    #[serde(default = "default_forecast_url")]
    pub base_url: String,

    /// Request timeout in seconds. Model training is slow.
    #[serde(default = "default_forecast_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ForecastServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_url(),
            timeout_seconds: default_forecast_timeout(),
        }
    }
}

fn default_forecast_url() -> String {
    "https://lstm-app-708210591622.us-central1.run.app".to_string()
}

fn default_forecast_timeout() -> u64 {
    120
}

/// Reference chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Repositories as `owner/name`.
    #[serde(default = "default_repositories")]
    pub repositories: Vec<String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            repositories: default_repositories(),
        }
    }
}

fn default_repositories() -> Vec<String> {
    vec![
        "ollama/ollama",
        "langchain-ai/langchain",
        "langchain-ai/langgraph",
        "microsoft/autogen",
        "openai/openai-cookbook",
        "meta-llama/llama3",
        "elastic/elasticsearch",
        "milvus-io/pymilvus",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_optional(Path::new(DEFAULT_CONFIG_FILE))
    }

    fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.github_url {
            self.github.api_url = url.clone();
        }
        if let Some(ref url) = args.forecast_url {
            self.forecast.base_url = url.clone();
        }
        if let Some(windows) = args.windows {
            self.github.window_count = windows;
        }
        if let Some(concurrency) = args.concurrency {
            self.github.concurrency = concurrency;
        }

        // One flag bounds every outbound call.
        if let Some(timeout) = args.timeout {
            self.github.timeout_seconds = timeout;
            self.forecast.timeout_seconds = timeout;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
