//! Sitescan Database Layer
//!
//! `SQLite` persistence for the websites being scanned and the latest report
//! of each. Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use sitescan_db::SqliteStore;
//!
//! let store = SqliteStore::new("sitescan.db").await?;
//! store.run_migrations().await?;
//! let site = store.upsert_website("18f.gov").await?;
//! ```
//!
//! Reports are stored flattened (`primary.urlScan.finalUrl` style keys) as a
//! JSON object, one row per website, replaced on every scan.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod scan_results;
pub mod websites;

pub use error::{DatabaseError, Result};
pub use scan_results::StoredReport;

use async_trait::async_trait;
use sitescan_core::{Timestamp, WebsiteId};
use sitescan_scanner::ScanReport;
use sitescan_scheduler::{ResultStore, Website};
use sqlx::SqlitePool;
use std::path::Path;

/// `SQLite`-backed [`ResultStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `path` (or `:memory:`), creating it if missing.
    ///
    /// Migrations are not applied; call [`SqliteStore::run_migrations`].
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::connect(path).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Highest applied migration version.
    pub async fn schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Register a website, returning the existing row if already known.
    pub async fn upsert_website(&self, url: &str) -> Result<Website> {
        websites::upsert_website(&self.pool, url).await
    }

    /// Latest stored report for a website.
    pub async fn latest_report(&self, website_id: WebsiteId) -> Result<Option<StoredReport>> {
        scan_results::latest_report(&self.pool, website_id).await
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn find(&self, id: WebsiteId) -> sitescan_scheduler::Result<Option<Website>> {
        Ok(websites::find(&self.pool, id).await?)
    }

    async fn find_by_url(&self, url: &str) -> sitescan_scheduler::Result<Option<Website>> {
        Ok(websites::find_by_url(&self.pool, url).await?)
    }

    async fn all_websites(&self) -> sitescan_scheduler::Result<Vec<Website>> {
        Ok(websites::all(&self.pool).await?)
    }

    async fn save_report(
        &self,
        website_id: WebsiteId,
        report: &ScanReport,
    ) -> sitescan_scheduler::Result<()> {
        scan_results::save_report(&self.pool, website_id, report).await?;
        Ok(())
    }

    async fn find_stale(&self, cutoff: Timestamp) -> sitescan_scheduler::Result<Vec<Website>> {
        Ok(websites::find_stale(&self.pool, cutoff).await?)
    }
}
