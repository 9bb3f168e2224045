//! Result store contract.

use crate::error::Result;
use async_trait::async_trait;
use sitescan_core::{Timestamp, WebsiteId};
use sitescan_scanner::ScanReport;

/// A website known to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Website {
    /// Store identifier
    pub id: WebsiteId,
    /// URL as submitted
    pub url: String,
    /// When the latest report was saved; `None` if never scanned
    pub updated_at: Option<Timestamp>,
}

/// Persistence for websites and their latest reports.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Website by id.
    async fn find(&self, id: WebsiteId) -> Result<Option<Website>>;

    /// Website by URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<Website>>;

    /// Every website.
    async fn all_websites(&self) -> Result<Vec<Website>>;

    /// Replace the website's latest report and bump its `updated_at`.
    async fn save_report(&self, website_id: WebsiteId, report: &ScanReport) -> Result<()>;

    /// Websites whose latest report is older than `cutoff`, or missing.
    async fn find_stale(&self, cutoff: Timestamp) -> Result<Vec<Website>>;
}

/// True when a report saved at `last_updated` is due for a rescan.
#[must_use]
pub fn is_stale(last_updated: Option<Timestamp>, cutoff: Timestamp) -> bool {
    match last_updated {
        Some(updated) => updated < cutoff,
        None => true,
    }
}
