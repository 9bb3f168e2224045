//! Job queue contract and an in-memory implementation.
//!
//! Retries belong to the queue: the consumer reports a failure and the
//! queue decides whether the job runs again. A website has at most one
//! outstanding job (waiting or running) at a time.

use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use sitescan_core::{ScanJob, WebsiteId};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// A job handed out by a queue, with its attempt number (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    /// The job itself
    pub job: ScanJob,
    /// Which attempt this is
    pub attempt: u32,
}

/// Source of scan jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job. Returns `false` without queueing when the website already
    /// has an outstanding job.
    async fn enqueue(&self, job: ScanJob) -> Result<bool>;

    /// Wait for the next job. `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<QueuedJob>;

    /// Acknowledge a finished job.
    async fn complete(&self, job: &QueuedJob) -> Result<()>;

    /// Report a failed job; the queue applies its retry policy.
    async fn fail(&self, job: &QueuedJob, reason: &str) -> Result<()>;
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedJob>,
    outstanding: HashSet<WebsiteId>,
    dead: Vec<(ScanJob, String)>,
    completed: usize,
    closed: bool,
}

/// FIFO queue held in memory with bounded retries.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    max_attempts: u32,
}

impl MemoryQueue {
    /// Create a queue that runs each job at most `max_attempts` times.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Stop accepting jobs. Pending jobs are still handed out.
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Jobs waiting to run.
    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    /// True when no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while `website_id` has a job waiting or running.
    pub fn is_outstanding(&self, website_id: WebsiteId) -> bool {
        self.state().outstanding.contains(&website_id)
    }

    /// Jobs acknowledged as done.
    pub fn completed(&self) -> usize {
        self.state().completed
    }

    /// Jobs that exhausted their attempts, with the last failure reason.
    pub fn dead_letters(&self) -> Vec<(ScanJob, String)> {
        self.state().dead.clone()
    }

    fn push(&self, queued: QueuedJob) -> Result<()> {
        {
            let mut state = self.state();
            if state.closed {
                return Err(SchedulerError::QueueClosed);
            }
            state.pending.push_back(queued);
        }
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: ScanJob) -> Result<bool> {
        {
            let mut state = self.state();
            if state.closed {
                return Err(SchedulerError::QueueClosed);
            }
            if !state.outstanding.insert(job.website_id) {
                tracing::debug!("Skipping {}: a job is already outstanding", job.url);
                return Ok(false);
            }
        }
        tracing::debug!("Enqueued {} ({})", job.url, job.scan_id);
        self.push(QueuedJob { job, attempt: 1 })?;
        Ok(true)
    }

    async fn dequeue(&self) -> Option<QueuedJob> {
        loop {
            {
                let mut state = self.state();
                if let Some(job) = state.pending.pop_front() {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    async fn complete(&self, queued: &QueuedJob) -> Result<()> {
        let mut state = self.state();
        state.completed += 1;
        state.outstanding.remove(&queued.job.website_id);
        Ok(())
    }

    async fn fail(&self, queued: &QueuedJob, reason: &str) -> Result<()> {
        if queued.attempt < self.max_attempts {
            tracing::info!(
                "Retrying {} (attempt {} of {}): {}",
                queued.job.url,
                queued.attempt + 1,
                self.max_attempts,
                reason
            );
            let retry = self.push(QueuedJob {
                job: queued.job.clone(),
                attempt: queued.attempt + 1,
            });
            if retry.is_err() {
                self.state().outstanding.remove(&queued.job.website_id);
            }
            return retry;
        }
        tracing::error!(
            "Giving up on {} after {} attempt(s): {}",
            queued.job.url,
            queued.attempt,
            reason
        );
        let mut state = self.state();
        state.outstanding.remove(&queued.job.website_id);
        state.dead.push((queued.job.clone(), reason.to_string()));
        Ok(())
    }
}
