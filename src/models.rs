//! Data models for the activity pipeline.
//!
//! This module contains the canonical records produced by normalization,
//! the monthly series built from them, and the typed response returned
//! to the dashboard.

use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// State of an issue as reported by the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
        }
    }
}

/// A normalized issue.
///
/// `closed_at` is `None` only for open issues, and never precedes
/// `created_at`. The normalizer drops items that break either rule.
/// The serialized keys follow what the forecasting service reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
    pub issue_number: u64,
    pub created_at: NaiveDate,
    pub closed_at: Option<NaiveDate>,
    pub labels: BTreeSet<String>,
    #[serde(rename = "State")]
    pub state: IssueState,
    #[serde(rename = "Author")]
    pub author: String,
}

/// A normalized pull request. Merge state is not tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRecord {
    pub pull_number: u64,
    pub created_at: NaiveDate,
}

/// A normalized branch.
///
/// GitHub does not expose when a branch was created, so `created_at`
/// holds the date the branch list was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRecord {
    pub branch_name: String,
    pub created_at: NaiveDate,
}

/// A date range exactly one calendar month wide.
///
/// `end` is excluded so neighbouring windows never share a day, except on
/// the window ending at the anchor date, which covers the anchor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub includes_end: bool,
}

impl TimeWindow {
    /// Last day covered by the window.
    pub fn last_day(&self) -> NaiveDate {
        if self.includes_end {
            return self.end;
        }
        self.end.pred_opt().unwrap_or(self.start)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A calendar month, ordered chronologically and rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a month, returning `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following calendar month.
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-month counts, ascending, with every month between the first and
/// last observed month present (unobserved months count zero).
///
/// Serializes as `[["2024-01", 2], ["2024-02", 0], ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MonthlySeries(Vec<(YearMonth, u64)>);

impl MonthlySeries {
    /// Wraps already dense, sorted entries. Only the aggregator builds these.
    pub(crate) fn from_dense(entries: Vec<(YearMonth, u64)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(YearMonth, u64)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all monthly counts.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, count)| count).sum()
    }

    /// Count recorded for `period`, if the period is inside the series.
    #[cfg(test)]
    pub fn count_for(&self, period: YearMonth) -> Option<u64> {
        self.0
            .iter()
            .find(|(p, _)| *p == period)
            .map(|(_, count)| *count)
    }
}

/// The four series sent to the forecasting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    CreatedIssues,
    ClosedIssues,
    Pulls,
    Branches,
}

impl SeriesKind {
    /// Key of the "all data" artifact, which differs per family.
    pub fn all_data_key(&self) -> &'static str {
        match self {
            SeriesKind::CreatedIssues | SeriesKind::ClosedIssues => "all_issues_data_image",
            SeriesKind::Pulls => "all_pulls_data_image",
            SeriesKind::Branches => "all_branches_data_image",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::CreatedIssues => write!(f, "Created issues"),
            SeriesKind::ClosedIssues => write!(f, "Closed issues"),
            SeriesKind::Pulls => write!(f, "Pull requests"),
            SeriesKind::Branches => write!(f, "Branches"),
        }
    }
}

/// Artifact references returned by the forecasting service for one series.
///
/// Every field is required: a reply missing any of them is discarded as
/// a whole rather than propagated partially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastArtifactBundle {
    pub model_loss_image_url: String,
    pub lstm_generated_image_url: String,
    pub all_data_image: String,
    pub prophet_forecast_image_url: String,
    pub sarimax_forecast_image_url: String,
}

/// The forecast outcome for one series as it appears in the response.
///
/// Always serializes as an object carrying the five artifact keys; when
/// the bundle is unavailable every value is `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesForecast {
    pub kind: SeriesKind,
    pub bundle: Option<ForecastArtifactBundle>,
}

impl SeriesForecast {
    pub fn unavailable(kind: SeriesKind) -> Self {
        Self { kind, bundle: None }
    }

    pub fn is_available(&self) -> bool {
        self.bundle.is_some()
    }

    /// Artifact key/value pairs in wire order.
    pub fn artifacts(&self) -> [(&'static str, Option<&str>); 5] {
        let b = self.bundle.as_ref();
        [
            (
                "model_loss_image_url",
                b.map(|b| b.model_loss_image_url.as_str()),
            ),
            (
                "lstm_generated_image_url",
                b.map(|b| b.lstm_generated_image_url.as_str()),
            ),
            (self.kind.all_data_key(), b.map(|b| b.all_data_image.as_str())),
            (
                "prophet_forecast_image_url",
                b.map(|b| b.prophet_forecast_image_url.as_str()),
            ),
            (
                "sarimax_forecast_image_url",
                b.map(|b| b.sarimax_forecast_image_url.as_str()),
            ),
        ]
    }
}

impl Serialize for SeriesForecast {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        for (key, value) in self.artifacts() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

/// Identity and popularity counters of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub full_name: String,
    pub star_count: u64,
    pub fork_count: u64,
}

/// The combined answer returned to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub full_name: String,
    pub created: MonthlySeries,
    pub closed: MonthlySeries,
    pub star_count: u64,
    pub fork_count: u64,
    #[serde(rename = "createdAtImageUrls")]
    pub created_forecast: SeriesForecast,
    #[serde(rename = "closedAtImageUrls")]
    pub closed_forecast: SeriesForecast,
    #[serde(rename = "pullsForecastImageUrls")]
    pub pulls_forecast: SeriesForecast,
    #[serde(rename = "branchesForecastImageUrls")]
    pub branches_forecast: SeriesForecast,
    /// Collection statistics for reports; not part of the wire format.
    #[serde(skip)]
    pub activity: ActivitySummary,
}

/// What was collected while building a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    pub issues: usize,
    pub open_issues: usize,
    pub closed_issues: usize,
    pub pulls: usize,
    pub branches: usize,
    pub windows: usize,
    pub empty_windows: usize,
    pub failed_windows: usize,
    pub top_labels: Vec<(String, usize)>,
}

impl AggregateResponse {
    /// The four forecast slots in dispatch order.
    pub fn forecasts(&self) -> [&SeriesForecast; 4] {
        [
            &self.created_forecast,
            &self.closed_forecast,
            &self.pulls_forecast,
            &self.branches_forecast,
        ]
    }
}

/// Structured payload emitted when a request fails outright.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Popularity metric plotted by the reference bar charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMetric {
    Stars,
    Forks,
}

impl ChartMetric {
    /// Key carrying the count for each repository in the chart request.
    pub fn count_key(&self) -> &'static str {
        match self {
            ChartMetric::Stars => "stars",
            ChartMetric::Forks => "forks",
        }
    }

    /// Key carrying the chart reference in the reply and in our response.
    pub fn url_key(&self) -> &'static str {
        match self {
            ChartMetric::Stars => "star_bar_chart_url",
            ChartMetric::Forks => "forks_bar_chart_url",
        }
    }

    /// Picks the counter this metric plots from a snapshot.
    pub fn count_of(&self, snapshot: &RepositorySnapshot) -> u64 {
        match self {
            ChartMetric::Stars => snapshot.star_count,
            ChartMetric::Forks => snapshot.fork_count,
        }
    }
}

/// One bar of a reference chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartEntry {
    pub name: String,
    pub count: u64,
}

/// Chart reference returned for the star or fork comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartResponse {
    pub metric: ChartMetric,
    pub url: Option<String>,
}

impl Serialize for ChartResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.metric.url_key(), &self.url)?;
        map.end()
    }
}
