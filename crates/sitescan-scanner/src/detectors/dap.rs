//! Digital Analytics Program (DAP) script detection.
//!
//! Works on the requests captured while loading the home page: any request
//! that references the DAP script or one of its GA property ids is a
//! candidate, and the best candidate supplies parameters and version.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sitescan_browser::NetworkRequest;
use std::sync::OnceLock;

/// DAP script file name.
pub const DAP_SCRIPT_NAME: &str = "Universal-Federated-Analytics-Min.js";

/// GA property ids used by DAP.
pub const DAP_PROPERTY_IDS: &[&str] = &["G-CSLL4ZEK4L", "UA-33523145-1"];

/// Result of DAP detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DapScan {
    /// Any candidate request was seen
    pub dap_detected: bool,
    /// Query string of the selected candidate
    pub dap_parameters: Option<String>,
    /// Version scraped from the selected candidate's body
    pub dap_version: Option<String>,
}

/// A request that looks like DAP, with what could be extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DapScriptCandidate {
    /// Request URL
    pub url: String,
    /// Query string, if any
    pub parameters: Option<String>,
    /// Response body, if retrievable
    pub body: Option<String>,
    /// Version from the body, if found
    pub version: Option<String>,
}

impl DapScriptCandidate {
    /// Build a candidate from a captured request and its response body.
    #[must_use]
    pub fn from_request(request: &NetworkRequest, body: Option<String>) -> Self {
        let parameters = url::Url::parse(&request.url)
            .ok()
            .and_then(|u| u.query().map(str::to_string))
            .filter(|q| !q.is_empty());
        let version = body.as_deref().and_then(dap_version);
        Self {
            url: request.url.clone(),
            parameters,
            body,
            version,
        }
    }

    fn has_script_name(&self) -> bool {
        url_has_script_name(&self.url)
    }

    fn has_property_id(&self) -> bool {
        contains_property_id(&self.url)
    }
}

fn url_has_script_name(url: &str) -> bool {
    url.to_lowercase()
        .contains(&DAP_SCRIPT_NAME.to_lowercase())
}

fn contains_property_id(text: &str) -> bool {
    DAP_PROPERTY_IDS.iter().any(|id| text.contains(id))
}

/// True when a request references the DAP script or a DAP property id.
#[must_use]
pub fn is_candidate_request(request: &NetworkRequest) -> bool {
    url_has_script_name(&request.url)
        || contains_property_id(&request.url)
        || request
            .post_data
            .as_deref()
            .is_some_and(contains_property_id)
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bversion\s*[:=]\s*["']([0-9]{8}\s+v[0-9.]+[^"']*)["']"#)
            .expect("valid regex")
    })
}

/// Version signature from a DAP script body (minified or not).
#[must_use]
pub fn dap_version(body: &str) -> Option<String> {
    version_regex()
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Pick the most informative candidate, preferring discovery order on ties.
#[must_use]
pub fn best_candidate(candidates: &[DapScriptCandidate]) -> Option<&DapScriptCandidate> {
    candidates
        .iter()
        .find(|c| c.has_script_name() && c.version.is_some())
        .or_else(|| {
            candidates
                .iter()
                .find(|c| c.has_property_id() && c.version.is_some())
        })
        .or_else(|| candidates.first())
}

/// Summarise the candidates into a [`DapScan`].
#[must_use]
pub fn summarize(candidates: &[DapScriptCandidate]) -> DapScan {
    match best_candidate(candidates) {
        Some(best) => DapScan {
            dap_detected: true,
            dap_parameters: best.parameters.clone(),
            dap_version: best.version.clone(),
        },
        None => DapScan::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIFIED: &str = r#"var _fedmeta={VERSION:"20240712 v8.2 - GA4",AGENCY:"GSA"};function f(){}"#;
    const NON_MINIFIED: &str = "var oCONFIG = {\n    VERSION: '20240524 v7.05 - Dual Tracking',\n    AGENCY: '',\n};";

    fn request(url: &str, post_data: Option<&str>) -> NetworkRequest {
        NetworkRequest {
            id: url.to_string(),
            url: url.to_string(),
            method: if post_data.is_some() { "POST" } else { "GET" }.to_string(),
            post_data: post_data.map(str::to_string),
            ..NetworkRequest::default()
        }
    }

    fn candidate(url: &str, version: Option<&str>) -> DapScriptCandidate {
        DapScriptCandidate {
            url: url.to_string(),
            parameters: None,
            body: None,
            version: version.map(str::to_string),
        }
    }

    #[test]
    fn test_version_from_minified_script() {
        assert_eq!(dap_version(MINIFIED).as_deref(), Some("20240712 v8.2 - GA4"));
    }

    #[test]
    fn test_version_from_non_minified_script() {
        assert_eq!(
            dap_version(NON_MINIFIED).as_deref(),
            Some("20240524 v7.05 - Dual Tracking")
        );
    }

    #[test]
    fn test_no_version() {
        assert_eq!(dap_version(""), None);
        assert_eq!(dap_version("var version = 3;"), None);
    }

    #[test]
    fn test_candidate_filter() {
        let requests = [
            request(
                "https://dap.digitalgov.gov/Universal-Federated-Analytics-Min.js?test1=1&test2=2",
                None,
            ),
            request("https://abcd-def/G-CSLL4ZEK4L/xyz", None),
            request("https://test.gov", Some("abcd-def/G-CSLL4ZEK4L/xyz")),
            request("https://no-dap/here", None),
        ];
        let matched: Vec<_> = requests.iter().filter(|r| is_candidate_request(r)).collect();
        assert_eq!(matched.len(), 3);
    }

    #[test]
    fn test_candidate_extracts_parameters_and_version() {
        let req = request(
            "https://dap.digitalgov.gov/Universal-Federated-Analytics-Min.js?test1=1&test2=2",
            None,
        );
        let c = DapScriptCandidate::from_request(&req, Some(MINIFIED.to_string()));
        assert_eq!(c.parameters.as_deref(), Some("test1=1&test2=2"));
        assert_eq!(c.version.as_deref(), Some("20240712 v8.2 - GA4"));
    }

    #[test]
    fn test_script_with_version_wins() {
        let candidates = [
            candidate("https://abcd-def/G-CSLL4ZEK4L/xyz", Some("property")),
            candidate(
                "https://test.gov/Universal-Federated-Analytics-Min.js",
                None,
            ),
            candidate(
                "https://test.gov/Universal-Federated-Analytics-Min.js?a=1",
                Some("script"),
            ),
        ];
        let best = best_candidate(&candidates).expect("candidate");
        assert_eq!(best.version.as_deref(), Some("script"));
    }

    #[test]
    fn test_property_with_version_beats_versionless_script() {
        let candidates = [
            candidate(
                "https://test.gov/Universal-Federated-Analytics-Min.js",
                None,
            ),
            candidate("https://abcd-def/G-CSLL4ZEK4L/xyz", Some("property")),
        ];
        let best = best_candidate(&candidates).expect("candidate");
        assert_eq!(best.version.as_deref(), Some("property"));
    }

    #[test]
    fn test_falls_back_to_first_candidate() {
        let candidates = [
            candidate("https://abcd-def/G-CSLL4ZEK4L/xyz", None),
            candidate("https://test.gov/Universal-Federated-Analytics-Min.js", None),
        ];
        let scan = summarize(&candidates);
        assert!(scan.dap_detected);
        assert_eq!(scan.dap_version, None);
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(summarize(&[]), DapScan::default());
        assert!(!summarize(&[]).dap_detected);
    }
}
