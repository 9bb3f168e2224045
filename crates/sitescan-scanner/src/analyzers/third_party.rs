//! Third-party services contacted by the home page.

use crate::target::base_domain;
use serde::{Deserialize, Serialize};
use sitescan_browser::NetworkRequest;
use std::collections::BTreeSet;

/// Hosts outside the site's base domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyScan {
    /// Sorted distinct hostnames
    pub third_party_service_domains: Vec<String>,
    /// Number of distinct hostnames
    pub third_party_service_count: usize,
}

/// Collect hosts whose base domain differs from `site_base_domain`.
#[must_use]
pub fn scan(requests: &[NetworkRequest], site_base_domain: &str) -> ThirdPartyScan {
    let domains: BTreeSet<String> = requests
        .iter()
        .filter_map(|req| url::Url::parse(&req.url).ok())
        .filter_map(|url| url.host_str().map(str::to_lowercase))
        .filter(|host| base_domain(host) != site_base_domain)
        .collect();

    ThirdPartyScan {
        third_party_service_count: domains.len(),
        third_party_service_domains: domains.into_iter().collect(),
    }
}
