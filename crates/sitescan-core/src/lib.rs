//! Sitescan Core - Foundation crate for the site-scanning engine.
//!
//! This crate provides shared types, the per-analyzer outcome contract,
//! error handling and configuration management that all other crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared identifiers and the `ScanJob` descriptor
//! - [`outcome`] - `ScanStatus` taxonomy and `AnalyzerOutcome`
//!
//! # Example
//!
//! ```rust
//! use sitescan_core::{AnalyzerOutcome, AppConfig, ScanStatus};
//!
//! let config = AppConfig::default();
//! assert!(config.pool.max >= config.pool.min);
//!
//! let outcome = AnalyzerOutcome::completed("ok");
//! assert_eq!(outcome.status(), ScanStatus::Completed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod outcome;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, ConsumerConfig, DatabaseConfig, PoolConfig, RequeueConfig, ScanningConfig,
    SecurityConfig,
};
pub use error::{ConfigError, ConfigResult, Result, SiteScanError};
pub use outcome::{AnalyzerOutcome, ErrorInfo, ScanStatus};
pub use types::{ScanId, ScanJob, Timestamp, WebsiteId};
