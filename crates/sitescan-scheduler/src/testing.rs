//! Hand-written fakes for the scheduler's collaborators.

use crate::error::Result;
use crate::store::{is_stale, ResultStore, Website};
use crate::Scanner;
use async_trait::async_trait;
use sitescan_browser::PoolError;
use sitescan_core::{ScanJob, ScanStatus, Timestamp, WebsiteId};
use sitescan_scanner::{ScanError, ScanReport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeScanner {
    pub calls: AtomicUsize,
    pub peak: AtomicUsize,
    in_flight: AtomicUsize,
    failing_urls: Vec<String>,
    fail_all: bool,
    delay: Option<Duration>,
}

impl FakeScanner {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_for(urls: &[&str]) -> Self {
        Self {
            failing_urls: urls.iter().map(|u| (*u).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn scan(&self, job: &ScanJob) -> std::result::Result<ScanReport, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all || self.failing_urls.contains(&job.url) {
            return Err(ScanError::Pool(PoolError::Closed));
        }
        Ok(ScanReport::all_failed(ScanStatus::Timeout, "fake"))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    websites: Mutex<Vec<Website>>,
    saves: Mutex<HashMap<WebsiteId, usize>>,
}

impl MemoryStore {
    pub fn with_websites(urls: &[&str]) -> Self {
        let websites = urls
            .iter()
            .zip(1..)
            .map(|(url, id)| Website {
                id: WebsiteId::new(id),
                url: (*url).to_string(),
                updated_at: None,
            })
            .collect();
        Self {
            websites: Mutex::new(websites),
            saves: Mutex::default(),
        }
    }

    pub fn set_updated_at(&self, id: WebsiteId, at: Option<Timestamp>) {
        let mut websites = self.websites.lock().expect("websites lock");
        if let Some(site) = websites.iter_mut().find(|w| w.id == id) {
            site.updated_at = at;
        }
    }

    pub fn saved(&self, id: WebsiteId) -> usize {
        self.saves
            .lock()
            .expect("saves lock")
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn find(&self, id: WebsiteId) -> Result<Option<Website>> {
        let websites = self.websites.lock().expect("websites lock");
        Ok(websites.iter().find(|w| w.id == id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Website>> {
        let websites = self.websites.lock().expect("websites lock");
        Ok(websites.iter().find(|w| w.url == url).cloned())
    }

    async fn all_websites(&self) -> Result<Vec<Website>> {
        Ok(self.websites.lock().expect("websites lock").clone())
    }

    async fn save_report(&self, website_id: WebsiteId, _report: &ScanReport) -> Result<()> {
        self.set_updated_at(website_id, Some(Timestamp::now()));
        *self
            .saves
            .lock()
            .expect("saves lock")
            .entry(website_id)
            .or_default() += 1;
        Ok(())
    }

    async fn find_stale(&self, cutoff: Timestamp) -> Result<Vec<Website>> {
        let websites = self.websites.lock().expect("websites lock");
        Ok(websites
            .iter()
            .filter(|w| is_stale(w.updated_at, cutoff))
            .cloned()
            .collect())
    }
}
