//! Whether the apex and `www.` hosts serve the same website.

use crate::error::Result;
use crate::target::{same_website, ScanTarget};
use serde::{Deserialize, Serialize};
use url::Url;

/// WWW canonicalization findings. Fields are `None` when undeterminable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WwwScan {
    /// Where the `www.` host ended up
    pub www_final_url: Option<String>,
    /// HTTP status of the `www.` host's final response
    pub www_status_code: Option<u16>,
    /// Apex and `www.` end on the same website
    pub www_same_website: Option<bool>,
}

/// Outcome of one HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Final URL after redirects
    pub final_url: String,
    /// Final status code
    pub status: u16,
}

/// Combine both probes. `None` when nothing could be determined.
#[must_use]
pub fn summarize(apex: Option<&Probe>, www: Option<&Probe>) -> Option<WwwScan> {
    let result = WwwScan {
        www_final_url: www.map(|p| p.final_url.clone()),
        www_status_code: www.map(|p| p.status),
        www_same_website: apex
            .zip(www)
            .map(|(a, w)| same_website(&a.final_url, &w.final_url)),
    };
    if result == WwwScan::default() {
        None
    } else {
        Some(result)
    }
}

/// GET `url`; an unreachable host is `None`, a timeout is an error.
async fn probe(client: &reqwest::Client, url: Url) -> Result<Option<Probe>> {
    match client.get(url.clone()).send().await {
        Ok(response) => Ok(Some(Probe {
            final_url: response.url().to_string(),
            status: response.status().as_u16(),
        })),
        Err(e) if !e.is_timeout() && e.is_connect() => {
            tracing::debug!("{} unreachable: {}", url, e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Probe both host variants of the target.
pub async fn scan(client: &reqwest::Client, target: &ScanTarget) -> Result<Option<WwwScan>> {
    let Some(counterpart) = target.www_counterpart() else {
        return Ok(None);
    };
    let (apex_url, www_url) = if target.host().starts_with("www.") {
        (counterpart, target.with_path("/"))
    } else {
        (target.with_path("/"), counterpart)
    };

    let (apex, www) = tokio::try_join!(probe(client, apex_url), probe(client, www_url))?;
    Ok(summarize(apex.as_ref(), www.as_ref()))
}
