//! Security posture from an external data source.

use crate::error::{Result, ScanError};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Security posture of a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScan {
    /// HTTP is redirected to HTTPS
    pub https_enforced: Option<bool>,
    /// Strict-Transport-Security is served
    pub hsts: Option<bool>,
}

/// Lookup of security posture by hostname.
#[async_trait::async_trait]
pub trait SecurityDataSource: Send + Sync {
    /// Data for `hostname`, or `None` when the source has no entry.
    async fn lookup(&self, hostname: &str) -> Result<Option<SecurityScan>>;
}

/// Source with no data; every lookup is `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecurityData;

#[async_trait::async_trait]
impl SecurityDataSource for NoSecurityData {
    async fn lookup(&self, _hostname: &str) -> Result<Option<SecurityScan>> {
        Ok(None)
    }
}

/// In-memory source loaded from a JSON map `{ hostname: SecurityScan }`.
#[derive(Debug, Clone, Default)]
pub struct JsonSecurityData {
    entries: HashMap<String, SecurityScan>,
}

impl JsonSecurityData {
    /// Load the JSON file at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScanError::SecurityData(format!("{}: {e}", path.display())))?;
        let entries: HashMap<String, SecurityScan> = serde_json::from_str(&raw)
            .map_err(|e| ScanError::SecurityData(format!("{}: {e}", path.display())))?;
        tracing::info!("Loaded security data for {} hosts", entries.len());
        Ok(Self::from_map(entries))
    }

    /// Build from an existing map. Hostnames are lowercased.
    #[must_use]
    pub fn from_map(entries: HashMap<String, SecurityScan>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(host, scan)| (host.to_lowercase(), scan))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl SecurityDataSource for JsonSecurityData {
    async fn lookup(&self, hostname: &str) -> Result<Option<SecurityScan>> {
        let host = hostname.to_lowercase();
        let found = self.entries.get(&host).or_else(|| {
            host.strip_prefix("www.")
                .and_then(|apex| self.entries.get(apex))
        });
        Ok(found.cloned())
    }
}

/// Look up the target's host.
pub async fn scan(
    source: &dyn SecurityDataSource,
    target: &ScanTarget,
) -> Result<Option<SecurityScan>> {
    source.lookup(target.host()).await
}
