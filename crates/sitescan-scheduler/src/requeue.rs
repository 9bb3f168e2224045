//! Periodic requeueing of websites whose reports have gone stale.

use crate::error::Result;
use crate::queue::JobQueue;
use crate::store::ResultStore;
use chrono::{DateTime, Utc};
use sitescan_core::{ScanJob, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Enqueues a fresh job for every website not scanned within `max_age`,
/// unless the queue already holds one for it.
pub struct StaleJobRequeuer {
    store: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
    max_age: chrono::TimeDelta,
}

impl StaleJobRequeuer {
    /// Create a requeuer.
    #[must_use]
    pub fn new(
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn JobQueue>,
        max_age: chrono::TimeDelta,
    ) -> Self {
        Self {
            store,
            queue,
            max_age,
        }
    }

    /// Enqueue every website stale as of `now`. Returns how many were queued.
    pub async fn requeue_stale(&self, now: Timestamp) -> Result<usize> {
        let cutoff = now
            .as_datetime()
            .checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let cutoff = Timestamp::from(cutoff);
        let stale = self.store.find_stale(cutoff).await?;
        let mut queued = 0;
        for website in &stale {
            if self
                .queue
                .enqueue(ScanJob::new(website.id, website.url.clone()))
                .await?
            {
                queued += 1;
            }
        }
        tracing::info!(
            "Requeued {} of {} website(s) not scanned since {}",
            queued,
            stale.len(),
            cutoff
        );
        Ok(queued)
    }

    /// Requeue every `interval` until `shutdown` is cancelled. The first pass
    /// runs one interval after start.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.requeue_stale(Timestamp::now()).await {
                        tracing::error!("Stale requeue failed: {}", e);
                    }
                }
            }
        }
        tracing::info!("Stale job requeuer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::testing::MemoryStore;
    use sitescan_core::WebsiteId;

    fn at(s: &str) -> Timestamp {
        Timestamp::from_rfc3339(s).expect("timestamp")
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_websites(&["old.gov", "fresh.gov", "new.gov"]));
        store.set_updated_at(WebsiteId::new(1), Some(at("2026-02-15T12:00:00Z")));
        store.set_updated_at(WebsiteId::new(2), Some(at("2026-02-17T11:00:00Z")));
        store
    }

    #[tokio::test]
    async fn test_requeues_old_and_never_scanned() {
        let queue = Arc::new(MemoryQueue::new(1));
        let requeuer = StaleJobRequeuer::new(store(), queue.clone(), chrono::TimeDelta::hours(24));

        let count = requeuer
            .requeue_stale(at("2026-02-17T12:00:00Z"))
            .await
            .expect("requeue");
        assert_eq!(count, 2);

        queue.close();
        let first = queue.dequeue().await.expect("job");
        let second = queue.dequeue().await.expect("job");
        assert_eq!(first.job.url, "old.gov");
        assert_eq!(second.job.url, "new.gov");
        assert_ne!(first.job.scan_id, second.job.scan_id);
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_nothing_stale() {
        let queue = Arc::new(MemoryQueue::new(1));
        let store = store();
        store.set_updated_at(WebsiteId::new(1), Some(at("2026-02-17T10:00:00Z")));
        store.set_updated_at(WebsiteId::new(3), Some(at("2026-02-17T10:00:00Z")));
        let requeuer = StaleJobRequeuer::new(store, queue.clone(), chrono::TimeDelta::hours(24));

        let count = requeuer
            .requeue_stale(at("2026-02-17T12:00:00Z"))
            .await
            .expect("requeue");
        assert_eq!(count, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pending_website_not_requeued() {
        let queue = Arc::new(MemoryQueue::new(1));
        let requeuer = StaleJobRequeuer::new(store(), queue.clone(), chrono::TimeDelta::hours(24));
        let now = at("2026-02-17T12:00:00Z");

        assert_eq!(requeuer.requeue_stale(now).await.expect("first pass"), 2);
        assert_eq!(requeuer.requeue_stale(now).await.expect("second pass"), 0);
        assert_eq!(queue.len(), 2);

        let done = queue.dequeue().await.expect("job");
        queue.complete(&done).await.expect("complete");
        assert_eq!(requeuer.requeue_stale(now).await.expect("third pass"), 1);
    }

    #[tokio::test]
    async fn test_huge_max_age_does_not_overflow() {
        let queue = Arc::new(MemoryQueue::new(1));
        let requeuer = StaleJobRequeuer::new(store(), queue.clone(), chrono::TimeDelta::MAX);

        let count = requeuer
            .requeue_stale(at("2026-02-17T12:00:00Z"))
            .await
            .expect("requeue");
        assert_eq!(count, 1, "only the never-scanned website is stale");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let queue = Arc::new(MemoryQueue::new(1));
        let store = Arc::new(MemoryStore::with_websites(&["never.gov"]));
        let requeuer = Arc::new(StaleJobRequeuer::new(
            store,
            queue.clone(),
            chrono::TimeDelta::hours(24),
        ));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let requeuer = Arc::clone(&requeuer);
            let shutdown = shutdown.clone();
            async move { requeuer.run(Duration::from_secs(60), shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(queue.len(), 1, "still-pending website is not queued twice");

        shutdown.cancel();
        handle.await.expect("join");
    }
}
