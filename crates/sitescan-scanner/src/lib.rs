//! Sitescan Scanner - Per-website scan orchestration.
//!
//! This crate turns one [`ScanJob`](sitescan_core::ScanJob) into one
//! [`ScanReport`]. It checks a browser out of the pool, runs the page
//! analyzers concurrently, classifies every failure into the shared
//! [`ScanStatus`](sitescan_core::ScanStatus) taxonomy and aggregates the
//! outcomes so that one failing analyzer never hides the others.
//!
//! # Features
//!
//! - Ten analyzers: not-found, primary, robots.txt, sitemap.xml, DNS,
//!   accessibility, performance, security, client-redirect and www
//! - Analytics (DAP) and design-system (USWDS) detectors over the captured
//!   home page traffic
//! - Per-analyzer timeouts and a per-job concurrency gate
//! - Dotted-key flattening of reports for persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use sitescan_scanner::{NoSecurityData, ScanOrchestrator, ScanSettings};
//! use std::sync::Arc;
//!
//! let orchestrator = ScanOrchestrator::new(
//!     pool,
//!     http_client,
//!     Arc::new(NoSecurityData),
//!     ScanSettings::default(),
//! );
//!
//! let report = orchestrator.scan(&job).await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod analyzers;
pub mod detectors;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod report;
pub mod target;

#[cfg(test)]
mod fakes;

// Re-export commonly used types
pub use analyzers::security::{JsonSecurityData, NoSecurityData, SecurityDataSource, SecurityScan};
pub use detectors::{DapScan, DapScriptCandidate, UswdsScan};
pub use error::{classify, Result, ScanError};
pub use http::build_client;
pub use orchestrator::{ScanOrchestrator, ScanSettings};
pub use report::{BaseScan, ScanReport};
pub use target::ScanTarget;
