//! Job consumer: pulls jobs off the queue, scans, persists.

use crate::error::Result;
use crate::queue::{JobQueue, QueuedJob};
use crate::store::ResultStore;
use async_trait::async_trait;
use sitescan_browser::BrowserFactory;
use sitescan_core::ScanJob;
use sitescan_scanner::{ScanError, ScanOrchestrator, ScanReport};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Anything that turns a job into a report.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan one website.
    async fn scan(&self, job: &ScanJob) -> std::result::Result<ScanReport, ScanError>;
}

#[async_trait]
impl<F: BrowserFactory> Scanner for ScanOrchestrator<F> {
    async fn scan(&self, job: &ScanJob) -> std::result::Result<ScanReport, ScanError> {
        ScanOrchestrator::scan(self, job).await
    }
}

/// Processes queued jobs with bounded parallelism.
pub struct JobConsumer {
    scanner: Arc<dyn Scanner>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ResultStore>,
    concurrency: usize,
}

impl JobConsumer {
    /// Create a consumer running at most `concurrency` jobs at once.
    #[must_use]
    pub fn new(
        scanner: Arc<dyn Scanner>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ResultStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            scanner,
            queue,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Scan one job and save its report.
    ///
    /// # Errors
    /// Fails when no browser could be acquired or the report could not be saved.
    pub async fn process_job(&self, job: &ScanJob) -> Result<ScanReport> {
        let report = self.scanner.scan(job).await?;
        self.store.save_report(job.website_id, &report).await?;
        Ok(report)
    }

    async fn handle(&self, queued: QueuedJob) {
        match self.process_job(&queued.job).await {
            Ok(report) => {
                tracing::info!(
                    "Saved report for {} ({} failed aspect(s))",
                    queued.job.url,
                    report.failure_count()
                );
                if let Err(e) = self.queue.complete(&queued).await {
                    tracing::warn!("Failed to acknowledge {}: {}", queued.job.scan_id, e);
                }
            }
            Err(e) => {
                tracing::error!(
                    "Job {} for {} failed on attempt {}: {}",
                    queued.job.scan_id,
                    queued.job.url,
                    queued.attempt,
                    e
                );
                if let Err(qe) = self.queue.fail(&queued, &e.to_string()).await {
                    tracing::warn!("Failed to report failure of {}: {}", queued.job.scan_id, qe);
                }
            }
        }
    }

    /// Consume jobs until the queue closes or `shutdown` is cancelled, then
    /// wait for in-flight jobs.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!("Job consumer started (concurrency {})", self.concurrency);
        let permits = Arc::new(Semaphore::new(self.concurrency));

        loop {
            let permit = tokio::select! {
                () = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let queued = tokio::select! {
                () = shutdown.cancelled() => break,
                queued = self.queue.dequeue() => match queued {
                    Some(queued) => queued,
                    None => break,
                },
            };

            let consumer = Arc::clone(&self);
            tokio::spawn(async move {
                consumer.handle(queued).await;
                drop(permit);
            });
        }

        tracing::info!("Job consumer stopping; waiting for in-flight jobs");
        // Every in-flight job holds a permit until it is done.
        let all = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        let _ = permits.acquire_many(all).await;
        tracing::info!("Job consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::testing::{FakeScanner, MemoryStore};
    use sitescan_core::WebsiteId;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn consumer(
        scanner: Arc<FakeScanner>,
        queue: Arc<MemoryQueue>,
        store: Arc<MemoryStore>,
        concurrency: usize,
    ) -> Arc<JobConsumer> {
        Arc::new(JobConsumer::new(scanner, queue, store, concurrency))
    }

    #[tokio::test]
    async fn test_process_job_saves_report() {
        let store = Arc::new(MemoryStore::with_websites(&["18f.gov"]));
        let consumer = consumer(
            Arc::new(FakeScanner::default()),
            Arc::new(MemoryQueue::new(1)),
            Arc::clone(&store),
            1,
        );

        let job = ScanJob::new(WebsiteId::new(1), "18f.gov");
        consumer.process_job(&job).await.expect("process");

        assert_eq!(store.saved(WebsiteId::new(1)), 1);
        assert!(store
            .find(WebsiteId::new(1))
            .await
            .expect("find")
            .expect("website")
            .updated_at
            .is_some());
    }

    #[tokio::test]
    async fn test_process_job_surfaces_pool_failure() {
        let store = Arc::new(MemoryStore::with_websites(&["18f.gov"]));
        let consumer = consumer(
            Arc::new(FakeScanner::failing()),
            Arc::new(MemoryQueue::new(1)),
            Arc::clone(&store),
            1,
        );

        let job = ScanJob::new(WebsiteId::new(1), "18f.gov");
        assert!(consumer.process_job(&job).await.is_err());
        assert_eq!(store.saved(WebsiteId::new(1)), 0);
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_applies_retries() {
        let queue = Arc::new(MemoryQueue::new(2));
        let store = Arc::new(MemoryStore::with_websites(&["a.gov", "b.gov"]));
        let scanner = Arc::new(FakeScanner::failing_for(&["b.gov"]));
        let consumer = consumer(Arc::clone(&scanner), Arc::clone(&queue), Arc::clone(&store), 2);

        queue.enqueue(ScanJob::new(WebsiteId::new(1), "a.gov")).await.expect("enqueue");
        queue.enqueue(ScanJob::new(WebsiteId::new(2), "b.gov")).await.expect("enqueue");

        let handle = tokio::spawn(Arc::clone(&consumer).run(CancellationToken::new()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.close();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("consumer stops")
            .expect("join");

        assert_eq!(queue.completed(), 1);
        assert_eq!(store.saved(WebsiteId::new(1)), 1);
        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_respects_concurrency() {
        let queue = Arc::new(MemoryQueue::new(1));
        let store = Arc::new(MemoryStore::default());
        let scanner = Arc::new(FakeScanner::slow(Duration::from_millis(50)));
        let consumer = consumer(Arc::clone(&scanner), Arc::clone(&queue), store, 2);

        for id in 0..6 {
            queue
                .enqueue(ScanJob::new(WebsiteId::new(id), format!("site{id}.gov")))
                .await
                .expect("enqueue");
        }
        queue.close();
        consumer.run(CancellationToken::new()).await;

        assert_eq!(scanner.calls.load(Ordering::SeqCst), 6);
        assert_eq!(scanner.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_consumer() {
        let consumer = consumer(
            Arc::new(FakeScanner::default()),
            Arc::new(MemoryQueue::new(1)),
            Arc::new(MemoryStore::default()),
            1,
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&consumer).run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer stops")
            .expect("join");
    }
}
