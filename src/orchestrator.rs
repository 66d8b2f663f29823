//! End-to-end aggregation for one repository.
//!
//! Only the repository lookup can fail a request. Issue scanning, pull
//! request and branch retrieval, and the four forecasts all degrade to
//! empty or null fields on their own.

use crate::analysis::{monthly_series, state_counts, top_labels, TimestampField};
use crate::error::AggregateError;
use crate::forecast::{ForecastApi, SeriesForecastDispatcher, SeriesPayload};
use crate::github::retrieval::{fetch_branches, fetch_pull_requests};
use crate::github::{HostingApi, ListingSettings, ScanSettings, WindowedQueryPlanner};
use crate::models::{ActivitySummary, AggregateResponse};
use chrono::NaiveDate;
use tracing::info;

/// Number of labels kept in the activity summary.
const TOP_LABELS: usize = 5;

/// Settings shared by every stage of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub scan: ScanSettings,
    pub listing: ListingSettings,
}

/// Split `owner/name` and return `name`.
pub fn repo_short_name(full_name: &str) -> Option<&str> {
    let (owner, name) = full_name.split_once('/')?;
    let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
    (valid(owner) && valid(name) && !name.contains('/')).then_some(name)
}

/// Coordinates collection, bucketing and forecasting.
pub struct AggregationOrchestrator<'a, H, F> {
    hosting: &'a H,
    forecast: &'a F,
    settings: PipelineSettings,
}

impl<'a, H: HostingApi, F: ForecastApi> AggregationOrchestrator<'a, H, F> {
    pub fn new(hosting: &'a H, forecast: &'a F, settings: PipelineSettings) -> Self {
        Self {
            hosting,
            forecast,
            settings,
        }
    }

    /// Build the combined response for `full_name` as of `today`.
    ///
    /// `today` anchors the issue windows and stamps collected branches.
    pub async fn aggregate(
        &self,
        full_name: &str,
        today: NaiveDate,
    ) -> Result<AggregateResponse, AggregateError> {
        let short_name = repo_short_name(full_name)
            .ok_or_else(|| AggregateError::InvalidRepositoryName(full_name.to_string()))?;

        info!("Fetching repository metadata for {}", full_name);
        let snapshot = self
            .hosting
            .repository(full_name)
            .await
            .map_err(|source| AggregateError::RepositoryLookup {
                repo: full_name.to_string(),
                source,
            })?;
        info!(
            "{}: {} stars, {} forks",
            snapshot.full_name, snapshot.star_count, snapshot.fork_count
        );

        let planner = WindowedQueryPlanner::new(self.hosting, full_name, self.settings.scan.clone());
        let (scan, pulls, branches) = tokio::join!(
            planner.scan(today),
            fetch_pull_requests(self.hosting, full_name, self.settings.listing),
            fetch_branches(self.hosting, full_name, self.settings.listing, today),
        );

        let created = monthly_series(&scan.issues, TimestampField::CreatedAt);
        let closed = monthly_series(&scan.issues, TimestampField::ClosedAt);

        info!("Requesting forecasts for {}", short_name);
        let dispatcher = SeriesForecastDispatcher::new(self.forecast);
        let (created_forecast, closed_forecast, pulls_forecast, branches_forecast) = tokio::join!(
            dispatcher.dispatch(SeriesPayload::created_issues(&scan.issues), short_name),
            dispatcher.dispatch(SeriesPayload::closed_issues(&scan.issues), short_name),
            dispatcher.dispatch(SeriesPayload::pulls(&pulls), short_name),
            dispatcher.dispatch(SeriesPayload::branches(&branches), short_name),
        );

        let (open_issues, closed_issues) = state_counts(&scan.issues);
        let activity = ActivitySummary {
            issues: scan.issues.len(),
            open_issues,
            closed_issues,
            pulls: pulls.len(),
            branches: branches.len(),
            windows: scan.windows,
            empty_windows: scan.empty_windows,
            failed_windows: scan.failed_windows,
            top_labels: top_labels(&scan.issues, TOP_LABELS),
        };

        Ok(AggregateResponse {
            full_name: snapshot.full_name,
            created,
            closed,
            star_count: snapshot.star_count,
            fork_count: snapshot.fork_count,
            created_forecast,
            closed_forecast,
            pulls_forecast,
            branches_forecast,
            activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ForecastError, HostingError};
    use crate::models::{RepositorySnapshot, SeriesKind, YearMonth};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// In-memory GitHub with one repository.
    struct FakeGitHub {
        repository: Option<RepositorySnapshot>,
        issues: Vec<Value>,
        pulls: Vec<Value>,
        branches: Vec<Value>,
        fail_search: bool,
    }

    impl FakeGitHub {
        fn demo() -> Self {
            Self {
                repository: Some(RepositorySnapshot {
                    full_name: "octo/demo".to_string(),
                    star_count: 120,
                    fork_count: 30,
                }),
                issues: vec![
                    json!({"number": 1, "created_at": "2024-01-03T00:00:00Z", "closed_at": "2024-03-01T00:00:00Z", "state": "closed", "labels": [{"name": "bug"}], "user": {"login": "a"}}),
                    json!({"number": 2, "created_at": "2024-01-20T00:00:00Z", "closed_at": null, "state": "open", "labels": [], "user": {"login": "b"}}),
                    json!({"number": 3, "created_at": "2024-03-09T00:00:00Z", "closed_at": null, "state": "open", "labels": [{"name": "bug"}], "user": {"login": "c"}}),
                ],
                pulls: vec![json!({"number": 10, "created_at": "2024-02-02T00:00:00Z"})],
                branches: vec![json!({"name": "main"})],
                fail_search: false,
            }
        }
    }

    impl HostingApi for FakeGitHub {
        async fn repository(&self, full_name: &str) -> Result<RepositorySnapshot, HostingError> {
            self.repository.clone().ok_or_else(|| HostingError::Status {
                status: 404,
                url: format!("repos/{}", full_name),
                body: "Not Found".to_string(),
            })
        }

        async fn search_issues(&self, query: &str, _: u32) -> Result<Vec<Value>, HostingError> {
            if self.fail_search {
                return Err(HostingError::Timeout {
                    url: "search/issues".to_string(),
                });
            }
            // Everything lives in the first window.
            if query.contains("created:2024-03-15..") {
                Ok(self.issues.clone())
            } else {
                Ok(Vec::new())
            }
        }

        async fn list_pulls(&self, _: &str, _: u32, _: u32) -> Result<Vec<Value>, HostingError> {
            Ok(self.pulls.clone())
        }

        async fn list_branches(&self, _: &str, _: u32, _: u32) -> Result<Vec<Value>, HostingError> {
            Ok(self.branches.clone())
        }
    }

    /// Forecast service that fails chosen paths and records every call.
    struct FakeForecast {
        failing_paths: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeForecast {
        fn new(failing_paths: Vec<&'static str>) -> Self {
            Self {
                failing_paths,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_to(&self, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == path)
                .count()
        }
    }

    impl ForecastApi for FakeForecast {
        async fn post_json(&self, path: &str, _: &Value) -> Result<Value, ForecastError> {
            self.calls.lock().unwrap().push(path.to_string());
            if self.failing_paths.contains(&path) {
                return Err(ForecastError::Status {
                    status: 500,
                    url: path.to_string(),
                });
            }
            let all_key = match path {
                "api/forecast/pulls" => "all_pulls_data_image",
                "api/forecast/branches" => "all_branches_data_image",
                _ => "all_issues_data_image",
            };
            let mut reply = json!({
                "model_loss_image_url": format!("{}/loss.png", path),
                "lstm_generated_image_url": format!("{}/lstm.png", path),
                "prophet_forecast_image_url": format!("{}/prophet.png", path),
                "sarimax_forecast_image_url": format!("{}/sarimax.png", path),
            });
            reply[all_key] = json!(format!("{}/all.png", path));
            Ok(reply)
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            scan: ScanSettings {
                window_count: 3,
                ..ScanSettings::default()
            },
            listing: ListingSettings::default(),
        }
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_repo_short_name() {
        assert_eq!(repo_short_name("angular/angular-cli"), Some("angular-cli"));
        assert_eq!(repo_short_name("angular"), None);
        assert_eq!(repo_short_name("/angular"), None);
        assert_eq!(repo_short_name("a/b/c"), None);
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let github = FakeGitHub::demo();
        let forecast = FakeForecast::new(vec![]);

        let response = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap();

        assert_eq!(response.star_count, 120);
        assert_eq!(response.fork_count, 30);
        assert_eq!(
            response.created.entries(),
            &[(ym("2024-01"), 2), (ym("2024-02"), 0), (ym("2024-03"), 1)]
        );
        assert_eq!(response.closed.entries(), &[(ym("2024-03"), 1)]);
        assert!(response.forecasts().iter().all(|f| f.is_available()));
        assert_eq!(forecast.calls_to("api/forecast"), 2);

        assert_eq!(response.activity.issues, 3);
        assert_eq!(response.activity.open_issues, 2);
        assert_eq!(response.activity.windows, 3);
        assert_eq!(response.activity.empty_windows, 2);
        assert_eq!(response.activity.top_labels, vec![("bug".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_forecast_failure_only_nulls_its_field() {
        let github = FakeGitHub::demo();
        let forecast = FakeForecast::new(vec!["api/forecast/pulls"]);

        let response = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap();

        assert!(!response.pulls_forecast.is_available());
        assert!(response.created_forecast.is_available());
        assert!(response.branches_forecast.is_available());
        assert_eq!(response.star_count, 120);
        assert_eq!(response.created.total(), 3);

        let value = serde_json::to_value(&response).unwrap();
        let pulls = value["pullsForecastImageUrls"].as_object().unwrap();
        assert_eq!(pulls.len(), 5);
        assert!(pulls.values().all(Value::is_null));
        assert_eq!(value["starCount"], 120);
        assert_eq!(value["forkCount"], 30);
    }

    #[tokio::test]
    async fn test_issue_forecast_failure_keeps_series_and_counts() {
        let github = FakeGitHub::demo();
        let forecast = FakeForecast::new(vec!["api/forecast"]);

        let response = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap();

        assert_eq!(forecast.calls_to("api/forecast"), 2);
        assert!(!response.created_forecast.is_available());
        assert!(!response.closed_forecast.is_available());
        assert!(response.pulls_forecast.is_available());
        assert!(response.branches_forecast.is_available());
        assert_eq!(
            response.created.entries(),
            &[(ym("2024-01"), 2), (ym("2024-02"), 0), (ym("2024-03"), 1)]
        );
        assert_eq!(response.closed.entries(), &[(ym("2024-03"), 1)]);

        let value = serde_json::to_value(&response).unwrap();
        for key in ["createdAtImageUrls", "closedAtImageUrls"] {
            let urls = value[key].as_object().unwrap();
            assert_eq!(urls.len(), 5);
            assert!(urls.values().all(Value::is_null));
        }
        assert_eq!(value["starCount"], 120);
        assert_eq!(value["forkCount"], 30);
        assert_eq!(value["created"], json!([["2024-01", 2], ["2024-02", 0], ["2024-03", 1]]));
    }

    #[tokio::test]
    async fn test_empty_pulls_skip_dispatch() {
        let mut github = FakeGitHub::demo();
        github.pulls.clear();
        let forecast = FakeForecast::new(vec![]);

        let response = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap();

        assert_eq!(response.pulls_forecast.kind, SeriesKind::Pulls);
        assert!(response.pulls_forecast.bundle.is_none());
        assert_eq!(forecast.calls_to("api/forecast/pulls"), 0);
        assert_eq!(forecast.calls_to("api/forecast/branches"), 1);
    }

    #[tokio::test]
    async fn test_failed_scan_degrades_to_empty_series() {
        let mut github = FakeGitHub::demo();
        github.fail_search = true;
        let forecast = FakeForecast::new(vec![]);

        let response = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap();

        assert!(response.created.is_empty());
        assert!(response.closed.is_empty());
        assert_eq!(response.activity.failed_windows, 3);
        assert!(response.pulls_forecast.is_available());
    }

    #[tokio::test]
    async fn test_missing_repository_is_fatal() {
        let mut github = FakeGitHub::demo();
        github.repository = None;
        let forecast = FakeForecast::new(vec![]);

        let err = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo/demo", date("2024-04-15"))
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::RepositoryLookup { .. }));
        assert!(forecast.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_fatal() {
        let github = FakeGitHub::demo();
        let forecast = FakeForecast::new(vec![]);

        let err = AggregationOrchestrator::new(&github, &forecast, settings())
            .aggregate("octo", date("2024-04-15"))
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::InvalidRepositoryName(_)));
    }
}
