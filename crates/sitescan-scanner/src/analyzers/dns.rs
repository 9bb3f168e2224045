//! Hostname resolution.

use crate::error::{Result, ScanError};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// DNS posture of the target host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsScan {
    /// At least one IPv6 address resolved
    pub ipv6: bool,
    /// Number of distinct addresses resolved
    pub dns_address_count: usize,
}

/// Resolve the target host.
pub async fn scan(target: &ScanTarget) -> Result<DnsScan> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((target.host(), 443))
        .await
        .map_err(ScanError::Dns)?
        .collect();
    if addrs.is_empty() {
        return Err(ScanError::Dns(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses for {}", target.host()),
        )));
    }
    Ok(summarize(&addrs))
}

fn summarize(addrs: &[SocketAddr]) -> DnsScan {
    let mut ips: Vec<_> = addrs.iter().map(SocketAddr::ip).collect();
    ips.sort();
    ips.dedup();
    DnsScan {
        ipv6: ips.iter().any(std::net::IpAddr::is_ipv6),
        dns_address_count: ips.len(),
    }
}
