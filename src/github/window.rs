//! Windowed issue search.
//!
//! GitHub's search API caps how far a single query can reach, so issue
//! history is collected as a series of one-month windows walking backward
//! from an anchor date. Windows are independent and are queried
//! concurrently; a window that fails or comes back empty contributes
//! nothing and never stops the scan.

use crate::config::HostingConfig;
use crate::error::HostingError;
use crate::github::client::HostingApi;
use crate::github::normalize::normalize_issues;
use crate::models::{IssueRecord, TimeWindow};
use chrono::{Months, NaiveDate};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Settings for the windowed scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Number of one-month windows to inspect.
    pub window_count: usize,
    /// Items requested per window query.
    pub per_page: u32,
    /// Maximum window queries in flight.
    pub concurrency: usize,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            window_count: 24,
            per_page: 100,
            concurrency: 6,
            show_progress: false,
        }
    }
}

impl From<&HostingConfig> for ScanSettings {
    fn from(config: &HostingConfig) -> Self {
        Self {
            window_count: config.window_count,
            per_page: config.per_page,
            concurrency: config.concurrency,
            show_progress: false,
        }
    }
}

/// Outcome of a full scan.
#[derive(Debug, Clone, Default)]
pub struct WindowScan {
    pub issues: Vec<IssueRecord>,
    pub windows: usize,
    pub empty_windows: usize,
    pub failed_windows: usize,
}

/// Plan `count` contiguous one-month windows ending at `today`.
///
/// Window `i` covers `[today - (i+1) months, today - i months)`, except
/// that the first window also covers `today`. Both bounds are derived from
/// the anchor so month-end clamping never opens a gap between neighbours.
pub fn plan_windows(today: NaiveDate, count: usize) -> Vec<TimeWindow> {
    (0..count)
        .map_while(|i| {
            let end = months_before(today, i)?;
            let start = months_before(today, i + 1)?;
            Some(TimeWindow {
                start,
                end,
                includes_end: i == 0,
            })
        })
        .collect()
}

fn months_before(date: NaiveDate, months: usize) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(u32::try_from(months).ok()?))
}

/// Search query for the issues of `repo` created inside `window`.
///
/// GitHub date ranges are inclusive, so the query stops at the window's
/// last covered day.
pub fn search_query(repo: &str, window: &TimeWindow) -> String {
    format!(
        "type:issue repo:{} created:{}..{}",
        repo,
        window.start,
        window.last_day()
    )
}

/// Runs the windowed scan for one repository.
pub struct WindowedQueryPlanner<'a, H> {
    api: &'a H,
    repo: &'a str,
    settings: ScanSettings,
}

impl<'a, H: HostingApi> WindowedQueryPlanner<'a, H> {
    pub fn new(api: &'a H, repo: &'a str, settings: ScanSettings) -> Self {
        Self {
            api,
            repo,
            settings,
        }
    }

    /// Query every window anchored at `today` and merge the results.
    pub async fn scan(&self, today: NaiveDate) -> WindowScan {
        let windows = plan_windows(today, self.settings.window_count);
        info!(
            "Scanning {} monthly windows of {} issues",
            windows.len(),
            self.repo
        );

        let progress = self.progress_bar(windows.len());
        let mut scan = WindowScan {
            windows: windows.len(),
            ..WindowScan::default()
        };

        let outcomes: Vec<(TimeWindow, Result<Vec<IssueRecord>, HostingError>)> =
            stream::iter(windows)
                .map(|window| async move { (window, self.query_window(&window).await) })
                .buffer_unordered(self.settings.concurrency.max(1))
                .inspect(|_| progress.inc(1))
                .collect()
                .await;
        progress.finish_and_clear();

        for (window, outcome) in outcomes {
            match outcome {
                Ok(issues) if issues.is_empty() => {
                    debug!("Window {} has no issues", window);
                    scan.empty_windows += 1;
                }
                Ok(issues) => scan.issues.extend(issues),
                Err(e) => {
                    warn!("Skipping window {}: {}", window, e);
                    scan.failed_windows += 1;
                }
            }
        }

        info!(
            "Collected {} issues ({} empty, {} failed windows)",
            scan.issues.len(),
            scan.empty_windows,
            scan.failed_windows
        );
        scan
    }

    async fn query_window(&self, window: &TimeWindow) -> Result<Vec<IssueRecord>, HostingError> {
        let query = search_query(self.repo, window);
        debug!("Searching: {}", query);

        let items = self.api.search_issues(&query, self.settings.per_page).await?;
        if items.len() as u64 >= u64::from(self.settings.per_page) {
            debug!(
                "Window {} returned a full page; older issues in it are not counted",
                window
            );
        }

        Ok(normalize_issues(&items))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} windows [{bar:30.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
