//! HTTP client for the forecasting service.

use crate::config::ForecastServiceConfig;
use crate::error::ForecastError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Transport to the forecasting service.
#[allow(async_fn_in_trait)] // Only driven through generics inside this crate
pub trait ForecastApi {
    /// POST `body` to `path` and return the decoded JSON reply.
    ///
    /// Non-success statuses are errors.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ForecastError>;
}

/// Runtime settings for the forecasting client.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl From<&ForecastServiceConfig> for ForecastConfig {
    fn from(config: &ForecastServiceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// `reqwest`-backed forecasting client.
pub struct ForecastClient {
    config: ForecastConfig,
    http_client: reqwest::Client,
}

impl ForecastClient {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        debug!("Initializing forecast client for {}", config.base_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create forecast HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

impl ForecastApi for ForecastClient {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ForecastError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ForecastError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForecastError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ForecastError::from_reqwest(&url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout_seconds: u64) -> ForecastClient {
        ForecastClient::new(ForecastConfig {
            base_url: format!("{}/", server.uri()),
            timeout_seconds,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_post_json_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/forecast/pulls"))
            .and(body_json(json!({"pulls": [], "repo": "demo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let reply = client_for(&server, 5)
            .post_json("api/forecast/pulls", &json!({"pulls": [], "repo": "demo"}))
            .await
            .unwrap();
        assert_eq!(reply["ok"], true);
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server, 5)
            .post_json("api/forecast", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_slow_reply_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, 1)
            .post_json("api/forecast", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Timeout { .. }));
    }
}
