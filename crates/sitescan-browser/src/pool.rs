//! Bounded pool of reusable browser instances.
//!
//! Capacity is a semaphore of `max` permits; each [`PooledBrowser`] guard
//! holds one permit and gives its instance back from `Drop`, so a caller that
//! errors, panics or is cancelled still releases. Instances are recycled after
//! `max_uses` acquisitions and evicted after `idle_timeout` without use.

use crate::error::PoolError;
use crate::session::{BrowserFactory, BrowserInstance};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Pool sizing and recycling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Instances kept warm
    pub min: usize,
    /// Upper bound on live instances
    pub max: usize,
    /// Idle time after which an instance is destroyed
    pub idle_timeout: Duration,
    /// Acquisitions before an instance is recycled; 0 disables recycling
    pub max_uses: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 3,
            idle_timeout: Duration::from_secs(60),
            max_uses: 100,
        }
    }
}

impl From<&sitescan_core::PoolConfig> for PoolConfig {
    fn from(config: &sitescan_core::PoolConfig) -> Self {
        Self {
            min: config.min,
            max: config.max.max(1),
            idle_timeout: config.idle_timeout(),
            max_uses: config.max_uses,
        }
    }
}

struct PoolEntry<I> {
    instance: I,
    use_count: u32,
    last_used_at: Instant,
}

impl<I> PoolEntry<I> {
    fn new(instance: I) -> Self {
        Self {
            instance,
            use_count: 0,
            last_used_at: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Duration, now: Instant) -> bool {
        now.duration_since(self.last_used_at) >= idle_timeout
    }

    fn is_worn_out(&self, max_uses: u32) -> bool {
        max_uses > 0 && self.use_count >= max_uses
    }
}

struct PoolInner<F: BrowserFactory> {
    factory: F,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<PoolEntry<F::Instance>>>,
    closed: AtomicBool,
}

impl<F: BrowserFactory> PoolInner<F> {
    fn idle(&self) -> MutexGuard<'_, Vec<PoolEntry<F::Instance>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A pool of browser instances produced by `F`.
pub struct BrowserPool<F: BrowserFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: BrowserFactory> Clone for BrowserPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: BrowserFactory> BrowserPool<F> {
    /// Create an empty pool. Call [`warm_up`](Self::warm_up) to pre-launch instances.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let max = config.max.max(1);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                permits: Arc::new(Semaphore::new(max)),
                idle: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Instances currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Instances currently checked out.
    pub fn in_use(&self) -> usize {
        self.inner
            .config
            .max
            .max(1)
            .saturating_sub(self.inner.permits.available_permits())
    }

    /// Check out an instance, waiting while the pool is at capacity.
    pub async fn acquire(&self) -> Result<PooledBrowser<F>, PoolError> {
        if self.inner.is_closed() {
            return Err(PoolError::Closed);
        }
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        loop {
            let candidate = self.inner.idle().pop();
            let Some(entry) = candidate else { break };

            if entry.is_expired(self.inner.config.idle_timeout, Instant::now()) {
                tracing::debug!("Discarding idle browser past its idle timeout");
                self.inner.factory.destroy(entry.instance).await;
                continue;
            }
            if !entry.instance.validate().await {
                tracing::warn!("Pooled browser failed validation, replacing it");
                self.inner.factory.destroy(entry.instance).await;
                continue;
            }
            return Ok(self.hand_out(entry, permit));
        }

        let instance = self
            .inner
            .factory
            .create()
            .await
            .map_err(PoolError::Create)?;
        tracing::debug!("Created browser instance ({} in use)", self.in_use());
        Ok(self.hand_out(PoolEntry::new(instance), permit))
    }

    fn hand_out(
        &self,
        mut entry: PoolEntry<F::Instance>,
        permit: OwnedSemaphorePermit,
    ) -> PooledBrowser<F> {
        entry.use_count += 1;
        PooledBrowser {
            entry: Some(entry),
            permit: Some(permit),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Launch instances until `min` are idle.
    pub async fn warm_up(&self) -> Result<(), PoolError> {
        let created = self.top_up().await?;
        tracing::info!("Browser pool warmed up with {} instance(s)", created);
        Ok(())
    }

    /// Each launch holds a permit until the new instance is idle, so it counts
    /// against `max` alongside checked-out instances.
    async fn top_up(&self) -> Result<usize, PoolError> {
        let mut created = 0;
        loop {
            if self.inner.is_closed() {
                return Err(PoolError::Closed);
            }
            if self.idle_count() >= self.inner.config.min {
                return Ok(created);
            }
            let permit = match Arc::clone(&self.inner.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => return Ok(created),
                Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            };
            // Live = idle + held permits; the new instance must fit under max.
            if self.idle_count() > self.inner.permits.available_permits() {
                return Ok(created);
            }
            let instance = self
                .inner
                .factory
                .create()
                .await
                .map_err(PoolError::Create)?;
            self.inner.idle().push(PoolEntry::new(instance));
            drop(permit);
            created += 1;
        }
    }

    /// Destroy idle instances past their idle timeout, then top back up to `min`.
    pub async fn evict_idle(&self) -> Result<usize, PoolError> {
        let now = Instant::now();
        let expired: Vec<_> = {
            let mut idle = self.inner.idle();
            let (expired, fresh): (Vec<_>, Vec<_>) = idle
                .drain(..)
                .partition(|entry| entry.is_expired(self.inner.config.idle_timeout, now));
            *idle = fresh;
            expired
        };

        let evicted = expired.len();
        for entry in expired {
            self.inner.factory.destroy(entry.instance).await;
        }
        if evicted > 0 {
            tracing::debug!("Evicted {} idle browser(s)", evicted);
        }
        self.top_up().await?;
        Ok(evicted)
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until the pool closes.
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if pool.inner.is_closed() {
                    break;
                }
                if let Err(e) = pool.evict_idle().await {
                    tracing::warn!("Browser pool reaper failed: {}", e);
                }
            }
        })
    }

    /// Close the pool and destroy every idle instance.
    ///
    /// Checked-out instances are destroyed when their guards drop.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.permits.close();
        let idle: Vec<_> = self.inner.idle().drain(..).collect();
        let count = idle.len();
        for entry in idle {
            self.inner.factory.destroy(entry.instance).await;
        }
        tracing::info!("Browser pool shut down, destroyed {} idle instance(s)", count);
    }
}

/// A checked-out browser. Returned to the pool on drop.
pub struct PooledBrowser<F: BrowserFactory> {
    entry: Option<PoolEntry<F::Instance>>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<F>>,
}

impl<F: BrowserFactory> PooledBrowser<F> {
    /// Times this instance has been acquired, including this one.
    pub fn use_count(&self) -> u32 {
        self.entry.as_ref().map_or(0, |entry| entry.use_count)
    }

    /// Return the instance to the pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl<F: BrowserFactory> Deref for PooledBrowser<F> {
    type Target = F::Instance;

    fn deref(&self) -> &F::Instance {
        // entry is only taken in Drop
        match &self.entry {
            Some(entry) => &entry.instance,
            None => unreachable!("pooled browser used after release"),
        }
    }
}

impl<F: BrowserFactory> Drop for PooledBrowser<F> {
    fn drop(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        let permit = self.permit.take();

        if !self.pool.is_closed() && !entry.is_worn_out(self.pool.config.max_uses) {
            entry.last_used_at = Instant::now();
            self.pool.idle().push(entry);
            return;
        }

        tracing::debug!(
            "Recycling browser after {} use(s) (pool closed: {})",
            entry.use_count,
            self.pool.is_closed()
        );
        let pool = Arc::clone(&self.pool);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            // The permit is held until the instance is gone.
            runtime.spawn(async move {
                pool.factory.destroy(entry.instance).await;
                drop(permit);
            });
        }
    }
}
