//! Sitescan Scheduler - Feeding jobs to the orchestrator.
//!
//! The [`JobConsumer`] pulls [`ScanJob`](sitescan_core::ScanJob)s off a
//! [`JobQueue`], runs them through a [`Scanner`] and saves each report to a
//! [`ResultStore`]. The [`StaleJobRequeuer`] periodically enqueues websites
//! whose latest report is too old.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod consumer;
pub mod error;
pub mod queue;
pub mod requeue;
pub mod store;

#[cfg(test)]
mod testing;

pub use consumer::{JobConsumer, Scanner};
pub use error::{Result, SchedulerError};
pub use queue::{JobQueue, MemoryQueue, QueuedJob};
pub use requeue::StaleJobRequeuer;
pub use store::{is_stale, ResultStore, Website};
