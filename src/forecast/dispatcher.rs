//! Dispatch of monthly series to the forecasting service.
//!
//! Each series is sent on its own and its outcome never affects the
//! others. Whatever goes wrong (bad status, timeout, unreadable or
//! incomplete reply), the caller receives an unavailable forecast rather
//! than an error.

use crate::forecast::client::ForecastApi;
use crate::models::{
    BranchRecord, ForecastArtifactBundle, IssueRecord, PullRequestRecord, SeriesForecast,
    SeriesKind,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Records backing one series.
#[derive(Debug, Clone, Copy)]
pub enum SeriesItems<'a> {
    Issues(&'a [IssueRecord]),
    Pulls(&'a [PullRequestRecord]),
    Branches(&'a [BranchRecord]),
}

/// A series ready to be sent.
#[derive(Debug, Clone, Copy)]
pub struct SeriesPayload<'a> {
    pub kind: SeriesKind,
    pub items: SeriesItems<'a>,
}

impl<'a> SeriesPayload<'a> {
    pub fn created_issues(issues: &'a [IssueRecord]) -> Self {
        Self {
            kind: SeriesKind::CreatedIssues,
            items: SeriesItems::Issues(issues),
        }
    }

    pub fn closed_issues(issues: &'a [IssueRecord]) -> Self {
        Self {
            kind: SeriesKind::ClosedIssues,
            items: SeriesItems::Issues(issues),
        }
    }

    pub fn pulls(pulls: &'a [PullRequestRecord]) -> Self {
        Self {
            kind: SeriesKind::Pulls,
            items: SeriesItems::Pulls(pulls),
        }
    }

    pub fn branches(branches: &'a [BranchRecord]) -> Self {
        Self {
            kind: SeriesKind::Branches,
            items: SeriesItems::Branches(branches),
        }
    }

    pub fn len(&self) -> usize {
        match self.items {
            SeriesItems::Issues(items) => items.len(),
            SeriesItems::Pulls(items) => items.len(),
            SeriesItems::Branches(items) => items.len(),
        }
    }

    /// Pull and branch series without items are not worth forecasting.
    /// Issue series are always sent.
    pub fn should_skip(&self) -> bool {
        self.len() == 0 && matches!(self.kind, SeriesKind::Pulls | SeriesKind::Branches)
    }

    /// Service endpoint for this series.
    pub fn path(&self) -> &'static str {
        match self.kind {
            SeriesKind::CreatedIssues | SeriesKind::ClosedIssues => "api/forecast",
            SeriesKind::Pulls => "api/forecast/pulls",
            SeriesKind::Branches => "api/forecast/branches",
        }
    }

    /// Request body: the items under their family key, the issue `type`
    /// tag where relevant, and the repository short name.
    pub fn body(&self, repo_short_name: &str) -> Result<Value, serde_json::Error> {
        let mut body = Map::new();

        match self.items {
            SeriesItems::Issues(items) => {
                body.insert("issues".to_string(), serde_json::to_value(items)?);
            }
            SeriesItems::Pulls(items) => {
                body.insert("pulls".to_string(), serde_json::to_value(items)?);
            }
            SeriesItems::Branches(items) => {
                body.insert("branches".to_string(), serde_json::to_value(items)?);
            }
        }

        match self.kind {
            SeriesKind::CreatedIssues => {
                body.insert("type".to_string(), Value::from("created_at"));
            }
            SeriesKind::ClosedIssues => {
                body.insert("type".to_string(), Value::from("closed_at"));
            }
            SeriesKind::Pulls | SeriesKind::Branches => {}
        }

        body.insert("repo".to_string(), Value::from(repo_short_name));
        Ok(Value::Object(body))
    }
}

/// Read a complete artifact bundle from a service reply.
///
/// Returns `None` unless all five references are present as strings.
pub fn decode_bundle(kind: SeriesKind, reply: &Value) -> Option<ForecastArtifactBundle> {
    let field = |key: &str| reply.get(key).and_then(Value::as_str).map(str::to_string);

    Some(ForecastArtifactBundle {
        model_loss_image_url: field("model_loss_image_url")?,
        lstm_generated_image_url: field("lstm_generated_image_url")?,
        all_data_image: field(kind.all_data_key())?,
        prophet_forecast_image_url: field("prophet_forecast_image_url")?,
        sarimax_forecast_image_url: field("sarimax_forecast_image_url")?,
    })
}

/// Sends series to the forecasting service.
pub struct SeriesForecastDispatcher<'a, F> {
    api: &'a F,
}

impl<'a, F: ForecastApi> SeriesForecastDispatcher<'a, F> {
    pub fn new(api: &'a F) -> Self {
        Self { api }
    }

    /// Forecast one series for the repository `repo_short_name`.
    pub async fn dispatch(&self, payload: SeriesPayload<'_>, repo_short_name: &str) -> SeriesForecast {
        let kind = payload.kind;

        if payload.should_skip() {
            info!("{}: no records, forecast skipped", kind);
            return SeriesForecast::unavailable(kind);
        }

        let body = match payload.body(repo_short_name) {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: cannot encode forecast request: {}", kind, e);
                return SeriesForecast::unavailable(kind);
            }
        };

        debug!("{}: sending {} records", kind, payload.len());
        let reply = match self.api.post_json(payload.path(), &body).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{}: forecast unavailable: {}", kind, e);
                return SeriesForecast::unavailable(kind);
            }
        };

        let bundle = decode_bundle(kind, &reply);
        if bundle.is_none() {
            warn!("{}: forecast reply is incomplete, discarding it", kind);
        } else {
            info!("{}: forecast received", kind);
        }

        SeriesForecast { kind, bundle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::models::IssueState;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed reply or status.
    struct ScriptedForecast {
        reply: Result<Value, u16>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedForecast {
        fn replying(reply: Value) -> Self {
            Self {
                reply: Ok(reply),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ForecastApi for ScriptedForecast {
        async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ForecastError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), body.clone()));
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(status) => Err(ForecastError::Status {
                    status: *status,
                    url: path.to_string(),
                }),
            }
        }
    }

    fn full_reply(all_key: &str) -> Value {
        let mut reply = json!({
            "model_loss_image_url": "https://storage/model_loss.png",
            "lstm_generated_image_url": "https://storage/lstm.png",
            "prophet_forecast_image_url": "https://storage/prophet.png",
            "sarimax_forecast_image_url": "https://storage/sarimax.png"
        });
        reply[all_key] = json!("https://storage/all.png");
        reply
    }

    fn sample_issue() -> IssueRecord {
        IssueRecord {
            issue_number: 1,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            closed_at: None,
            labels: BTreeSet::new(),
            state: IssueState::Open,
            author: "dev".to_string(),
        }
    }

    #[tokio::test]
    async fn test_issue_series_body_and_bundle() {
        let api = ScriptedForecast::replying(full_reply("all_issues_data_image"));
        let issues = vec![sample_issue()];

        let forecast = SeriesForecastDispatcher::new(&api)
            .dispatch(SeriesPayload::closed_issues(&issues), "angular")
            .await;

        let bundle = forecast.bundle.unwrap();
        assert_eq!(bundle.all_data_image, "https://storage/all.png");

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "api/forecast");
        assert_eq!(requests[0].1["type"], "closed_at");
        assert_eq!(requests[0].1["repo"], "angular");
        assert_eq!(requests[0].1["issues"][0]["issue_number"], 1);
    }

    #[tokio::test]
    async fn test_server_error_gives_unavailable() {
        let api = ScriptedForecast::failing(500);
        let issues = vec![sample_issue()];

        let forecast = SeriesForecastDispatcher::new(&api)
            .dispatch(SeriesPayload::created_issues(&issues), "angular")
            .await;

        assert_eq!(forecast, SeriesForecast::unavailable(SeriesKind::CreatedIssues));
    }

    #[tokio::test]
    async fn test_empty_pulls_are_not_sent() {
        let api = ScriptedForecast::replying(full_reply("all_pulls_data_image"));

        let forecast = SeriesForecastDispatcher::new(&api)
            .dispatch(SeriesPayload::pulls(&[]), "angular")
            .await;

        assert!(!forecast.is_available());
        assert!(api.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_issues_are_still_sent() {
        let api = ScriptedForecast::failing(422);

        let _ = SeriesForecastDispatcher::new(&api)
            .dispatch(SeriesPayload::created_issues(&[]), "angular")
            .await;

        assert_eq!(api.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_branch_body_shape() {
        let api = ScriptedForecast::replying(full_reply("all_branches_data_image"));
        let branches = vec![BranchRecord {
            branch_name: "main".to_string(),
            created_at: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }];

        let forecast = SeriesForecastDispatcher::new(&api)
            .dispatch(SeriesPayload::branches(&branches), "demo")
            .await;
        assert!(forecast.is_available());

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests[0].0, "api/forecast/branches");
        assert_eq!(
            requests[0].1,
            json!({
                "branches": [{"branch_name": "main", "created_at": "2024-06-01"}],
                "repo": "demo"
            })
        );
    }

    #[test]
    fn test_partial_reply_is_discarded() {
        let mut reply = full_reply("all_pulls_data_image");
        reply["sarimax_forecast_image_url"] = Value::Null;
        assert!(decode_bundle(SeriesKind::Pulls, &reply).is_none());
    }

    #[test]
    fn test_reply_with_wrong_family_key_is_discarded() {
        let reply = full_reply("all_issues_data_image");
        assert!(decode_bundle(SeriesKind::Branches, &reply).is_none());
        assert!(decode_bundle(SeriesKind::CreatedIssues, &reply).is_some());
    }
}
