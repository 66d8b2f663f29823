//! GitHub REST API client.
//!
//! The pipeline talks to GitHub through the [`HostingApi`] trait so the
//! orchestration can be exercised against in-memory fakes. [`GitHubClient`]
//! is the `reqwest` implementation used at runtime.

use crate::config::HostingConfig;
use crate::error::HostingError;
use crate::models::RepositorySnapshot;
use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Read-only operations the pipeline needs from the hosting platform.
///
/// List operations return raw JSON items; turning them into records is
/// the normalizer's job.
#[allow(async_fn_in_trait)] // Only driven through generics inside this crate
pub trait HostingApi {
    /// Repository identity and star/fork counters.
    async fn repository(&self, full_name: &str) -> Result<RepositorySnapshot, HostingError>;

    /// One page of issue search results for `query`.
    async fn search_issues(&self, query: &str, per_page: u32) -> Result<Vec<Value>, HostingError>;

    /// One page of pull requests in any state.
    async fn list_pulls(
        &self,
        full_name: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Value>, HostingError>;

    /// One page of branches.
    async fn list_branches(
        &self,
        full_name: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Value>, HostingError>;
}

/// Runtime settings for the GitHub client.
#[derive(Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    /// Passed through as a bearer token, never inspected.
    pub token: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl GitHubConfig {
    /// Builds client settings from the `[github]` config section.
    pub fn from_settings(settings: &HostingConfig, token: Option<String>) -> Self {
        Self {
            api_url: settings.api_url.clone(),
            token: token.filter(|t| !t.trim().is_empty()),
            timeout_seconds: settings.timeout_seconds,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Repository metadata fields we read.
#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
}

/// Search API envelope.
#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    items: Vec<Value>,
}

/// `reqwest`-backed GitHub client.
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a client with a bounded per-request timeout.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        debug!("Initializing GitHub client for {}", config.api_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create GitHub HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// GET `path` and decode the body as JSON.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, HostingError> {
        let url = self.url(path);

        let mut request = self
            .http_client
            .get(&url)
            .query(query)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HostingError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostingError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| HostingError::from_reqwest(&url, e))
    }

    async fn get_list(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, HostingError> {
        match self.get_json(path, query).await? {
            Value::Array(items) => Ok(items),
            other => Err(HostingError::Decode {
                url: self.url(path),
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }
}

impl HostingApi for GitHubClient {
    async fn repository(&self, full_name: &str) -> Result<RepositorySnapshot, HostingError> {
        let path = format!("repos/{}", full_name);
        let value = self.get_json(&path, &[]).await?;

        let payload: RepositoryPayload =
            serde_json::from_value(value).map_err(|e| HostingError::Decode {
                url: self.url(&path),
                reason: e.to_string(),
            })?;

        Ok(RepositorySnapshot {
            full_name: payload.full_name.unwrap_or_else(|| full_name.to_string()),
            star_count: payload.stargazers_count,
            fork_count: payload.forks_count,
        })
    }

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<Vec<Value>, HostingError> {
        let value = self
            .get_json(
                "search/issues",
                &[("q", query.to_string()), ("per_page", per_page.to_string())],
            )
            .await?;

        let payload: SearchPayload =
            serde_json::from_value(value).map_err(|e| HostingError::Decode {
                url: self.url("search/issues"),
                reason: e.to_string(),
            })?;

        Ok(payload.items)
    }

    async fn list_pulls(
        &self,
        full_name: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Value>, HostingError> {
        self.get_list(
            &format!("repos/{}/pulls", full_name),
            &[
                ("state", "all".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ],
        )
        .await
    }

    async fn list_branches(
        &self,
        full_name: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Value>, HostingError> {
        self.get_list(
            &format!("repos/{}/branches", full_name),
            &[("per_page", per_page.to_string()), ("page", page.to_string())],
        )
        .await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
