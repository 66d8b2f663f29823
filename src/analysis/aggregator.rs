//! Monthly bucketing and record statistics.
//!
//! This module turns normalized records into dense monthly series and
//! computes the small summaries shown in reports.

use crate::models::{
    BranchRecord, IssueRecord, IssueState, MonthlySeries, PullRequestRecord, YearMonth,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Which timestamp of a record to bucket on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    CreatedAt,
    ClosedAt,
}

/// Records that carry the timestamps the aggregator buckets on.
pub trait Timestamped {
    fn created_at(&self) -> NaiveDate;

    /// Absent for records that are still open or have no close event.
    fn closed_at(&self) -> Option<NaiveDate> {
        None
    }

    fn timestamp(&self, field: TimestampField) -> Option<NaiveDate> {
        match field {
            TimestampField::CreatedAt => Some(self.created_at()),
            TimestampField::ClosedAt => self.closed_at(),
        }
    }
}

impl Timestamped for IssueRecord {
    fn created_at(&self) -> NaiveDate {
        self.created_at
    }

    fn closed_at(&self) -> Option<NaiveDate> {
        self.closed_at
    }
}

impl Timestamped for PullRequestRecord {
    fn created_at(&self) -> NaiveDate {
        self.created_at
    }
}

impl Timestamped for BranchRecord {
    fn created_at(&self) -> NaiveDate {
        self.created_at
    }
}

/// Bucket `records` by the month of `field`.
///
/// Records without the selected timestamp are left out before counting.
pub fn monthly_series<T: Timestamped>(records: &[T], field: TimestampField) -> MonthlySeries {
    bucket_months(records.iter().filter_map(|r| r.timestamp(field)))
}

/// Count dates per calendar month and fill every month between the first
/// and last observed month, using zero where nothing was observed.
///
/// No dates means no range, which yields an empty series.
pub fn bucket_months<I>(dates: I) -> MonthlySeries
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut counts: BTreeMap<YearMonth, u64> = BTreeMap::new();
    for date in dates {
        *counts.entry(YearMonth::of(date)).or_default() += 1;
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return MonthlySeries::default();
    };

    let mut entries = Vec::new();
    let mut period = first;
    loop {
        entries.push((period, counts.get(&period).copied().unwrap_or(0)));
        if period == last {
            break;
        }
        period = period.succ();
    }

    MonthlySeries::from_dense(entries)
}

/// Number of open and closed issues.
pub fn state_counts(issues: &[IssueRecord]) -> (usize, usize) {
    let open = issues
        .iter()
        .filter(|i| i.state == IssueState::Open)
        .count();
    (open, issues.len() - open)
}

/// Most used labels, most frequent first, ties broken by name.
pub fn top_labels(issues: &[IssueRecord], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for issue in issues {
        for label in &issue.labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
    }

    let mut labels: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    labels.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    labels.truncate(n);
    labels
}
