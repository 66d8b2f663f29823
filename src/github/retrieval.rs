//! Pull request and branch retrieval.
//!
//! Both collections are optional inputs to the pipeline: any failure
//! degrades to an empty collection so the corresponding forecast is
//! simply skipped.

use crate::config::HostingConfig;
use crate::error::HostingError;
use crate::github::client::HostingApi;
use crate::github::normalize::{normalize_branches, normalize_pulls};
use crate::models::{BranchRecord, PullRequestRecord};
use chrono::NaiveDate;
use serde_json::Value;
use std::future::Future;
use tracing::{info, warn};

/// Paging limits for the list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ListingSettings {
    pub per_page: u32,
    pub max_pages: u32,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_pages: 1,
        }
    }
}

impl From<&HostingConfig> for ListingSettings {
    fn from(config: &HostingConfig) -> Self {
        Self {
            per_page: config.per_page,
            max_pages: config.max_pages,
        }
    }
}

/// Fetch pages until a short page or `max_pages` is reached.
///
/// A failure on the first page is returned; a later failure keeps what
/// was already collected.
async fn collect_pages<F, Fut>(listing: ListingSettings, mut fetch_page: F) -> Result<Vec<Value>, HostingError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, HostingError>>,
{
    let mut items = Vec::new();

    for page in 1..=listing.max_pages.max(1) {
        match fetch_page(page).await {
            Ok(batch) => {
                let short_page = (batch.len() as u64) < u64::from(listing.per_page);
                items.extend(batch);
                if short_page {
                    break;
                }
            }
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!("Stopping pagination at page {}: {}", page, e);
                break;
            }
        }
    }

    Ok(items)
}

/// All pull requests of `repo` in any state.
pub async fn fetch_pull_requests<H: HostingApi>(
    api: &H,
    repo: &str,
    listing: ListingSettings,
) -> Vec<PullRequestRecord> {
    let pages = collect_pages(listing, move |page| api.list_pulls(repo, listing.per_page, page)).await;

    match pages {
        Ok(items) => {
            let pulls = normalize_pulls(&items);
            info!("Collected {} pull requests", pulls.len());
            pulls
        }
        Err(e) => {
            warn!("Failed to retrieve pull requests for {}: {}", repo, e);
            Vec::new()
        }
    }
}

/// All branches of `repo`, stamped with `collected_on`.
pub async fn fetch_branches<H: HostingApi>(
    api: &H,
    repo: &str,
    listing: ListingSettings,
    collected_on: NaiveDate,
) -> Vec<BranchRecord> {
    let pages =
        collect_pages(listing, move |page| api.list_branches(repo, listing.per_page, page)).await;

    match pages {
        Ok(items) => {
            let branches = normalize_branches(&items, collected_on);
            info!("Collected {} branches", branches.len());
            branches
        }
        Err(e) => {
            warn!("Failed to retrieve branches for {}: {}", repo, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositorySnapshot;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves numbered pages of synthetic items and can fail a given page.
    struct PagedApi {
        pages: Vec<Vec<Value>>,
        fail_page: Option<u32>,
        requested: Mutex<Vec<u32>>,
    }

    impl PagedApi {
        fn page(&self, page: u32) -> Result<Vec<Value>, HostingError> {
            self.requested.lock().unwrap().push(page);
            if self.fail_page == Some(page) {
                return Err(HostingError::Timeout {
                    url: format!("page {}", page),
                });
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }
    }

    impl HostingApi for PagedApi {
        async fn repository(&self, _: &str) -> Result<RepositorySnapshot, HostingError> {
            unreachable!("retrieval never looks up repositories")
        }

        async fn search_issues(&self, _: &str, _: u32) -> Result<Vec<Value>, HostingError> {
            Ok(Vec::new())
        }

        async fn list_pulls(&self, _: &str, _: u32, page: u32) -> Result<Vec<Value>, HostingError> {
            self.page(page)
        }

        async fn list_branches(&self, _: &str, _: u32, page: u32) -> Result<Vec<Value>, HostingError> {
            self.page(page)
        }
    }

    fn pulls(range: std::ops::Range<u64>) -> Vec<Value> {
        range
            .map(|n| json!({"number": n, "created_at": "2024-01-10T00:00:00Z"}))
            .collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_single_page_by_default() {
        let api = PagedApi {
            pages: vec![pulls(0..2), pulls(2..4)],
            fail_page: None,
            requested: Mutex::new(Vec::new()),
        };
        let listing = ListingSettings {
            per_page: 2,
            max_pages: 1,
        };

        let records = fetch_pull_requests(&api, "octo/demo", listing).await;
        assert_eq!(records.len(), 2);
        assert_eq!(*api.requested.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() {
        let api = PagedApi {
            pages: vec![pulls(0..2), pulls(2..3), pulls(3..5)],
            fail_page: None,
            requested: Mutex::new(Vec::new()),
        };
        let listing = ListingSettings {
            per_page: 2,
            max_pages: 5,
        };

        let records = fetch_pull_requests(&api, "octo/demo", listing).await;
        assert_eq!(records.len(), 3);
        assert_eq!(*api.requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_earlier_items() {
        let api = PagedApi {
            pages: vec![pulls(0..2), pulls(2..4)],
            fail_page: Some(2),
            requested: Mutex::new(Vec::new()),
        };
        let listing = ListingSettings {
            per_page: 2,
            max_pages: 3,
        };

        let records = fetch_pull_requests(&api, "octo/demo", listing).await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_first_page_failure_degrades_to_empty() {
        let api = PagedApi {
            pages: vec![vec![json!({"name": "main"})]],
            fail_page: Some(1),
            requested: Mutex::new(Vec::new()),
        };

        let branches =
            fetch_branches(&api, "octo/demo", ListingSettings::default(), date("2024-02-02")).await;
        assert!(branches.is_empty());
    }

    #[tokio::test]
    async fn test_branches_are_stamped_with_collection_date() {
        let api = PagedApi {
            pages: vec![vec![json!({"name": "main"}), json!({"name": "dev"})]],
            fail_page: None,
            requested: Mutex::new(Vec::new()),
        };

        let branches =
            fetch_branches(&api, "octo/demo", ListingSettings::default(), date("2024-02-02")).await;
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().all(|b| b.created_at == date("2024-02-02")));
    }
}
