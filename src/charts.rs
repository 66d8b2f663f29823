//! Star and fork comparison charts across the reference repositories.

use crate::forecast::ForecastApi;
use crate::github::HostingApi;
use crate::models::{ChartEntry, ChartMetric, ChartResponse};
use crate::orchestrator::repo_short_name;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// Chart endpoint on the forecasting service.
fn chart_path(metric: ChartMetric) -> &'static str {
    match metric {
        ChartMetric::Stars => "api/stars",
        ChartMetric::Forks => "api/forks",
    }
}

/// Builds one chart request from live repository metadata.
pub struct ReferenceChartBuilder<'a, H, F> {
    hosting: &'a H,
    charts: &'a F,
    repositories: &'a [String],
}

impl<'a, H: HostingApi, F: ForecastApi> ReferenceChartBuilder<'a, H, F> {
    pub fn new(hosting: &'a H, charts: &'a F, repositories: &'a [String]) -> Self {
        Self {
            hosting,
            charts,
            repositories,
        }
    }

    /// Look up every repository concurrently. A failed lookup counts as 0.
    ///
    /// Entries keep the configured order.
    pub async fn entries(&self, metric: ChartMetric) -> Vec<ChartEntry> {
        let lookups = self.repositories.iter().map(|full_name| async move {
            let name = repo_short_name(full_name).unwrap_or(full_name).to_string();
            let count = match self.hosting.repository(full_name).await {
                Ok(snapshot) => metric.count_of(&snapshot),
                Err(e) => {
                    warn!("Counting {} as 0: {}", full_name, e);
                    0
                }
            };
            ChartEntry { name, count }
        });

        join_all(lookups).await
    }

    /// Request the chart and return its reference, `None` when the service fails.
    pub async fn build(&self, metric: ChartMetric) -> ChartResponse {
        let entries = self.entries(metric).await;
        info!(
            "Requesting {} chart for {} repositories",
            metric.count_key(),
            entries.len()
        );

        let repos: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut item = Map::new();
                item.insert("name".to_string(), Value::from(entry.name.as_str()));
                item.insert(metric.count_key().to_string(), Value::from(entry.count));
                Value::Object(item)
            })
            .collect();
        let body = json!({ "repos": repos });

        let url = match self.charts.post_json(chart_path(metric), &body).await {
            Ok(reply) => {
                let url = reply
                    .get(metric.url_key())
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if url.is_none() {
                    warn!("Chart reply has no {}", metric.url_key());
                }
                url
            }
            Err(e) => {
                warn!("Chart unavailable: {}", e);
                None
            }
        };

        ChartResponse { metric, url }
    }
}
