//! The per-job scan report.

use crate::analyzers::{
    accessibility::AccessibilityScan, client_redirect::ClientRedirectScan, dns::DnsScan,
    not_found::NotFoundScan, performance::PerformanceScan, primary::PrimaryScan,
    robots_txt::RobotsTxtScan, security::SecurityScan, sitemap_xml::SitemapXmlScan, www::WwwScan,
};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sitescan_core::{AnalyzerOutcome, ErrorInfo, ScanStatus};

/// The target as normalised for scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseScan {
    /// Normalised target URL
    pub target_url: String,
    /// Base domain of the target
    pub target_url_base_domain: String,
}

impl From<&ScanTarget> for BaseScan {
    fn from(target: &ScanTarget) -> Self {
        Self {
            target_url: target.as_str().to_string(),
            target_url_base_domain: target.base_domain(),
        }
    }
}

/// One outcome per aspect. Every aspect is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Normalised target
    pub base: AnalyzerOutcome<BaseScan>,
    /// Random path answers 404
    pub not_found: AnalyzerOutcome<NotFoundScan>,
    /// Home page analysis
    pub primary: AnalyzerOutcome<PrimaryScan>,
    /// robots.txt
    pub robots_txt: AnalyzerOutcome<RobotsTxtScan>,
    /// sitemap.xml
    pub sitemap_xml: AnalyzerOutcome<SitemapXmlScan>,
    /// Hostname resolution
    pub dns: AnalyzerOutcome<DnsScan>,
    /// Accessibility audit
    pub accessibility: AnalyzerOutcome<AccessibilityScan>,
    /// Web-vitals
    pub performance: AnalyzerOutcome<PerformanceScan>,
    /// Security posture
    pub security: AnalyzerOutcome<SecurityScan>,
    /// Client-side redirects
    pub client_redirect: AnalyzerOutcome<ClientRedirectScan>,
    /// WWW canonicalization
    pub www: AnalyzerOutcome<WwwScan>,
}

impl ScanReport {
    /// Report in which every aspect failed the same way.
    #[must_use]
    pub fn all_failed(status: ScanStatus, message: &str) -> Self {
        let error = || ErrorInfo::new(message);
        Self {
            base: AnalyzerOutcome::failed(status, error()),
            not_found: AnalyzerOutcome::failed(status, error()),
            primary: AnalyzerOutcome::failed(status, error()),
            robots_txt: AnalyzerOutcome::failed(status, error()),
            sitemap_xml: AnalyzerOutcome::failed(status, error()),
            dns: AnalyzerOutcome::failed(status, error()),
            accessibility: AnalyzerOutcome::failed(status, error()),
            performance: AnalyzerOutcome::failed(status, error()),
            security: AnalyzerOutcome::failed(status, error()),
            client_redirect: AnalyzerOutcome::failed(status, error()),
            www: AnalyzerOutcome::failed(status, error()),
        }
    }

    /// Status of every aspect, keyed by its wire name.
    #[must_use]
    pub fn statuses(&self) -> [(&'static str, ScanStatus); 11] {
        [
            ("base", self.base.status()),
            ("notFound", self.not_found.status()),
            ("primary", self.primary.status()),
            ("robotsTxt", self.robots_txt.status()),
            ("sitemapXml", self.sitemap_xml.status()),
            ("dns", self.dns.status()),
            ("accessibility", self.accessibility.status()),
            ("performance", self.performance.status()),
            ("security", self.security.status()),
            ("clientRedirect", self.client_redirect.status()),
            ("www", self.www.status()),
        ]
    }

    /// Number of aspects that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.statuses()
            .iter()
            .filter(|(_, status)| status.is_failure())
            .count()
    }

    /// Dotted-key view for persistence.
    ///
    /// Each aspect contributes `<aspect>.status`, `<aspect>.error` when it
    /// failed, and one key per result leaf (`primary.urlScan.finalUrl`).
    /// Arrays are kept as values.
    pub fn flatten(&self) -> serde_json::Result<Map<String, Value>> {
        let Value::Object(aspects) = serde_json::to_value(self)? else {
            return Ok(Map::new());
        };

        let mut flat = Map::new();
        for (aspect, outcome) in aspects {
            let Value::Object(mut outcome) = outcome else {
                continue;
            };
            if let Some(status) = outcome.remove("status") {
                flat.insert(format!("{aspect}.status"), status);
            }
            if let Some(Value::Object(mut error)) = outcome.remove("error") {
                if let Some(message) = error.remove("message") {
                    flat.insert(format!("{aspect}.error"), message);
                }
            }
            if let Some(result) = outcome.remove("result") {
                flatten_into(&mut flat, &aspect, result);
            }
        }
        Ok(flat)
    }
}

fn flatten_into(flat: &mut Map<String, Value>, prefix: &str, value: Value) {
    match value {
        Value::Null => {}
        Value::Object(fields) => {
            for (key, field) in fields {
                let key = format!("{prefix}.{key}");
                match field {
                    Value::Object(_) => flatten_into(flat, &key, field),
                    leaf => {
                        flat.insert(key, leaf);
                    }
                }
            }
        }
        leaf => {
            flat.insert(prefix.to_string(), leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ScanReport {
        let mut report = ScanReport::all_failed(ScanStatus::Timeout, "too slow");
        let target = ScanTarget::parse("18f.gov").expect("target");
        report.base = AnalyzerOutcome::completed(BaseScan::from(&target));
        report.dns = AnalyzerOutcome::completed(DnsScan {
            ipv6: true,
            dns_address_count: 2,
        });
        report.www = AnalyzerOutcome::not_applicable();
        report
    }

    #[test]
    fn test_all_failed_covers_every_aspect() {
        let report = ScanReport::all_failed(ScanStatus::InvalidUrl, "bad url");
        assert_eq!(report.failure_count(), 11);
        assert!(report
            .statuses()
            .iter()
            .all(|(_, status)| *status == ScanStatus::InvalidUrl));
    }

    #[test]
    fn test_serialized_keys() {
        let json = serde_json::to_value(sample()).expect("serialize");
        let keys: Vec<&str> = json
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        for (aspect, _) in sample().statuses() {
            assert!(keys.contains(&aspect), "missing {aspect}");
        }
        assert_eq!(keys.len(), 11);
    }

    #[test]
    fn test_flatten() {
        let flat = sample().flatten().expect("flatten");

        assert_eq!(flat["base.status"], json!("completed"));
        assert_eq!(flat["base.targetUrl"], json!("https://18f.gov/"));
        assert_eq!(flat["base.targetUrlBaseDomain"], json!("18f.gov"));
        assert_eq!(flat["dns.ipv6"], json!(true));
        assert_eq!(flat["dns.dnsAddressCount"], json!(2));
        assert_eq!(flat["primary.status"], json!("timeout"));
        assert_eq!(flat["primary.error"], json!("too slow"));
        assert_eq!(flat["www.status"], json!("not_applicable"));
        assert!(!flat.contains_key("www.error"));
        assert!(!flat.contains_key("dns.error"));
    }

    #[test]
    fn test_flatten_nested_result() {
        let mut report = sample();
        report.primary = AnalyzerOutcome::completed(PrimaryScan::default());
        let flat = report.flatten().expect("flatten");

        assert_eq!(flat["primary.urlScan.finalUrlMIMEType"], json!(""));
        assert_eq!(flat["primary.thirdPartyScan.thirdPartyServiceDomains"], json!([]));
        assert_eq!(flat["primary.dapScan.dapVersion"], Value::Null);
    }
}
