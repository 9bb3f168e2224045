//! Scheduler errors.

use sitescan_scanner::ScanError;
use thiserror::Error;

/// Errors surfaced while consuming or requeueing jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scan could not run (no browser available)
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    /// The result store rejected an operation
    #[error("result store error: {0}")]
    Store(String),

    /// The queue rejected an operation
    #[error("queue error: {0}")]
    Queue(String),

    /// The queue no longer accepts jobs
    #[error("queue is closed")]
    QueueClosed,
}

/// Result type alias using `SchedulerError`.
pub type Result<T> = std::result::Result<T, SchedulerError>;
