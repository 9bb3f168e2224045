//! Scan orchestrator: one job in, one complete report out.
//!
//! The orchestrator checks a browser out of the pool, runs every analyzer
//! concurrently under its own timeout and a per-job concurrency gate, and
//! folds the results into a [`ScanReport`]. Analyzer failures never abort
//! the job; only failing to acquire a browser does.

use crate::analyzers::{
    accessibility, client_redirect, dns, not_found, performance, primary, robots_txt, security,
    sitemap_xml, www,
};
use crate::analyzers::security::SecurityDataSource;
use crate::error::{classify, Result, ScanError};
use crate::report::{BaseScan, ScanReport};
use crate::target::ScanTarget;
use sitescan_browser::{BrowserFactory, BrowserInstance, BrowserPool};
use sitescan_core::{AnalyzerOutcome, ErrorInfo, ScanJob, ScanStatus, ScanningConfig};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Per-job limits.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Timeout for every analyzer except the primary one
    pub analyzer_timeout: Duration,
    /// Timeout for the primary analyzer
    pub primary_timeout: Duration,
    /// Analyzers of one job allowed to run at once
    pub max_concurrent_analyzers: usize,
    /// Wait before reading the page URL in the client-redirect analyzer
    pub client_redirect_settle: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from(&ScanningConfig::default())
    }
}

impl From<&ScanningConfig> for ScanSettings {
    fn from(config: &ScanningConfig) -> Self {
        Self {
            analyzer_timeout: config.analyzer_timeout(),
            primary_timeout: config.primary_timeout(),
            max_concurrent_analyzers: config.max_concurrent_analyzers,
            client_redirect_settle: config.client_redirect_settle(),
        }
    }
}

/// Runs scan jobs against pooled browsers.
pub struct ScanOrchestrator<F: BrowserFactory> {
    pool: BrowserPool<F>,
    http: reqwest::Client,
    security: Arc<dyn SecurityDataSource>,
    settings: ScanSettings,
}

impl<F: BrowserFactory> ScanOrchestrator<F> {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        pool: BrowserPool<F>,
        http: reqwest::Client,
        security: Arc<dyn SecurityDataSource>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            pool,
            http,
            security,
            settings,
        }
    }

    /// The browser pool in use.
    pub fn pool(&self) -> &BrowserPool<F> {
        &self.pool
    }

    /// Scan one website.
    ///
    /// An unparsable URL yields a report in which every aspect is
    /// `invalid_url`; the pool is not touched.
    ///
    /// # Errors
    /// Returns [`ScanError::Pool`] when no browser could be acquired.
    pub async fn scan(&self, job: &ScanJob) -> Result<ScanReport> {
        let started = Instant::now();
        tracing::info!(
            "Scanning {} (website {}, scan {})",
            job.url,
            job.website_id,
            job.scan_id
        );
        tracing::debug!("Scan {} state: Idle", job.scan_id);

        let target = match ScanTarget::parse(&job.url) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Scan {} has an invalid URL: {}", job.scan_id, e);
                return Ok(ScanReport::all_failed(ScanStatus::InvalidUrl, &e.to_string()));
            }
        };

        let browser = match self.pool.acquire().await {
            Ok(browser) => browser,
            Err(e) => {
                tracing::error!("Scan {} state: Failed ({})", job.scan_id, e);
                return Err(ScanError::Pool(e));
            }
        };
        tracing::debug!(
            "Scan {} state: ResourceAcquired (use {})",
            job.scan_id,
            browser.use_count()
        );

        let report = self.run_analyzers(&*browser, &target, job).await;
        drop(browser);
        tracing::debug!("Scan {} state: Aggregated", job.scan_id);

        tracing::info!(
            "Finished {} in {:?} ({} of 11 aspects failed)",
            job.url,
            started.elapsed(),
            report.failure_count()
        );
        tracing::debug!("Scan {} state: Done", job.scan_id);
        Ok(report)
    }

    async fn run_analyzers(
        &self,
        browser: &dyn BrowserInstance,
        target: &ScanTarget,
        job: &ScanJob,
    ) -> ScanReport {
        tracing::debug!("Scan {} state: AnalyzersRunning", job.scan_id);
        let gate = Semaphore::new(self.settings.max_concurrent_analyzers.max(1));
        let limit = self.settings.analyzer_timeout;
        let settle = self.settings.client_redirect_settle;

        let (
            not_found,
            primary,
            robots_txt,
            sitemap_xml,
            dns,
            accessibility,
            performance,
            security,
            client_redirect,
            www,
        ) = tokio::join!(
            run(job, "notFound", limit, &gate, not_found::scan(&self.http, target)),
            run(
                job,
                "primary",
                self.settings.primary_timeout,
                &gate,
                primary::scan(browser, target)
            ),
            run(job, "robotsTxt", limit, &gate, robots_txt::scan(browser, target)),
            run(job, "sitemapXml", limit, &gate, sitemap_xml::scan(browser, target)),
            run(job, "dns", limit, &gate, dns::scan(target)),
            run(job, "accessibility", limit, &gate, accessibility::scan(browser, target)),
            run(job, "performance", limit, &gate, performance::scan(browser, target)),
            run(job, "security", limit, &gate, security::scan(self.security.as_ref(), target)),
            run(
                job,
                "clientRedirect",
                limit,
                &gate,
                client_redirect::scan(browser, target, settle)
            ),
            run(job, "www", limit, &gate, www::scan(&self.http, target)),
        );

        ScanReport {
            base: AnalyzerOutcome::completed(BaseScan::from(target)),
            not_found,
            primary,
            robots_txt,
            sitemap_xml,
            dns,
            accessibility,
            performance,
            security: security.or_not_applicable(),
            client_redirect,
            www: www.or_not_applicable(),
        }
    }
}

/// Run one analyzer under the job's gate and its timeout.
///
/// The timeout starts once a permit is held. A panicking analyzer becomes an
/// `unknown_error` outcome for its aspect alone.
async fn run<T>(
    job: &ScanJob,
    aspect: &'static str,
    limit: Duration,
    gate: &Semaphore,
    analyzer: impl Future<Output = Result<T>>,
) -> AnalyzerOutcome<T> {
    let _permit = match gate.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            return AnalyzerOutcome::failed(ScanStatus::UnknownError, ErrorInfo::new(e.to_string()))
        }
    };

    let started = Instant::now();
    let guarded = AssertUnwindSafe(analyzer).catch_unwind();
    let result = match tokio::time::timeout(limit, guarded).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(ScanError::Other(format!(
            "analyzer panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(ScanError::Timeout(limit)),
    };

    match result {
        Ok(value) => {
            tracing::debug!("{} for {} completed in {:?}", aspect, job.url, started.elapsed());
            AnalyzerOutcome::completed(value)
        }
        Err(e) => {
            let status = classify(&e);
            if status == ScanStatus::UnknownError {
                tracing::warn!("{} for {} failed with an unknown error: {}", aspect, job.url, e);
            } else {
                tracing::debug!("{} for {} failed ({}): {}", aspect, job.url, status, e);
            }
            AnalyzerOutcome::failed(status, ErrorInfo::new(e.to_string()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
