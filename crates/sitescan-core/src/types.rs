//! Shared types used across the scanning engine.
//!
//! This module defines the identifiers and the job descriptor that travel
//! between the queue, the orchestrator and the result store.

use crate::error::SiteScanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a website row owned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebsiteId(i64);

impl WebsiteId {
    /// Wrap a raw database identifier.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for WebsiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WebsiteId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of one scan attempt.
///
/// Scan ids are opaque strings chosen by whoever enqueues the job; freshly
/// generated ids are UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    /// Create a `ScanId` from an existing string.
    ///
    /// # Errors
    /// Returns error if the id is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, SiteScanError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SiteScanError::Validation(
                "invalid scan ID: must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Create a new random `ScanId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable input to one orchestration run.
///
/// Created by the queue layer and consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    /// Website the result belongs to
    pub website_id: WebsiteId,
    /// Target URL as stored, usually a bare hostname such as `18f.gov`
    pub url: String,
    /// Attempt identifier
    pub scan_id: ScanId,
}

impl ScanJob {
    /// Create a job with a freshly generated scan id.
    #[must_use]
    pub fn new(website_id: WebsiteId, url: impl Into<String>) -> Self {
        Self {
            website_id,
            url: url.into(),
            scan_id: ScanId::generate(),
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, SiteScanError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| SiteScanError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
