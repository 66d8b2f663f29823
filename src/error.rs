//! Error types for the outbound collaborators and the aggregation entry point.

use thiserror::Error;

/// Failure talking to the GitHub REST API.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("cannot reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub API error {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("unexpected response shape from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failure talking to the forecasting service.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast request to {url} timed out")]
    Timeout { url: String },

    #[error("cannot reach forecasting service at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("forecasting service error {status} for {url}")]
    Status { status: u16, url: String },

    #[error("forecasting service returned an unreadable body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failures that abort a whole aggregation request.
///
/// Only the repository identity is a hard dependency; everything else
/// degrades to an empty or null field instead of surfacing here.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("invalid repository name '{0}'\n  hint: expected the form owner/name")]
    InvalidRepositoryName(String),

    #[error("failed to fetch repository metadata for {repo}: {source}")]
    RepositoryLookup {
        repo: String,
        #[source]
        source: HostingError,
    },
}

impl HostingError {
    /// Classifies a `reqwest` failure for `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HostingError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            HostingError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            HostingError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

impl ForecastError {
    /// Classifies a `reqwest` failure for `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForecastError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            ForecastError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            ForecastError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}
