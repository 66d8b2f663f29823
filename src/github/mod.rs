//! GitHub access: the REST client, record normalization, the windowed
//! issue scan, and pull request/branch retrieval.

pub mod client;
pub mod normalize;
pub mod retrieval;
pub mod window;

pub use client::{GitHubClient, GitHubConfig, HostingApi};
pub use retrieval::ListingSettings;
pub use window::{ScanSettings, WindowedQueryPlanner};
