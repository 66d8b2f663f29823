//! Conversion of raw GitHub items into canonical records.
//!
//! Every function here is pure. Items missing an identity field, carrying
//! an unreadable timestamp, or breaking the issue state invariants are
//! dropped rather than reported.

use crate::models::{BranchRecord, IssueRecord, IssueState, PullRequestRecord};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Truncate an ISO-8601 timestamp to its calendar date.
fn calendar_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

/// Normalize one issue from the search API.
pub fn normalize_issue(raw: &Value) -> Option<IssueRecord> {
    let issue_number = raw.get("number")?.as_u64()?;
    let created_at = calendar_date(raw.get("created_at")?)?;

    let closed_at = match raw.get("closed_at") {
        None | Some(Value::Null) => None,
        Some(value) => Some(calendar_date(value)?),
    };

    let labels: BTreeSet<String> = raw
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let state = match raw.get("state").and_then(Value::as_str) {
        Some("open") => IssueState::Open,
        Some("closed") => IssueState::Closed,
        _ if closed_at.is_some() => IssueState::Closed,
        _ => IssueState::Open,
    };

    if state == IssueState::Closed && closed_at.is_none() {
        return None;
    }
    if matches!(closed_at, Some(closed) if closed < created_at) {
        return None;
    }

    let author = raw
        .get("user")
        .and_then(|user| user.get("login"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(IssueRecord {
        issue_number,
        created_at,
        closed_at,
        labels,
        state,
        author,
    })
}

/// Normalize one pull request from the pulls listing.
pub fn normalize_pull(raw: &Value) -> Option<PullRequestRecord> {
    Some(PullRequestRecord {
        pull_number: raw.get("number")?.as_u64()?,
        created_at: calendar_date(raw.get("created_at")?)?,
    })
}

/// Normalize one branch. The listing carries no creation time, so the
/// record is stamped with `collected_on`.
pub fn normalize_branch(raw: &Value, collected_on: NaiveDate) -> Option<BranchRecord> {
    Some(BranchRecord {
        branch_name: raw.get("name")?.as_str()?.to_string(),
        created_at: collected_on,
    })
}

/// Normalize a batch of issues, skipping malformed items.
pub fn normalize_issues(items: &[Value]) -> Vec<IssueRecord> {
    let issues: Vec<IssueRecord> = items.iter().filter_map(normalize_issue).collect();
    log_dropped("issues", items.len(), issues.len());
    issues
}

/// Normalize a batch of pull requests, skipping malformed items.
pub fn normalize_pulls(items: &[Value]) -> Vec<PullRequestRecord> {
    let pulls: Vec<PullRequestRecord> = items.iter().filter_map(normalize_pull).collect();
    log_dropped("pull requests", items.len(), pulls.len());
    pulls
}

/// Normalize a batch of branches, skipping malformed items.
pub fn normalize_branches(items: &[Value], collected_on: NaiveDate) -> Vec<BranchRecord> {
    let branches: Vec<BranchRecord> = items
        .iter()
        .filter_map(|raw| normalize_branch(raw, collected_on))
        .collect();
    log_dropped("branches", items.len(), branches.len());
    branches
}

fn log_dropped(kind: &str, received: usize, kept: usize) {
    if kept < received {
        debug!("Dropped {} malformed {} of {}", received - kept, kind, received);
    }
}
