//! Home page analysis: URL behaviour, SEO, DAP, USWDS and third parties.

use super::{close_quietly, seo, third_party};
use crate::detectors::{dap, uswds, DapScan, DapScriptCandidate, UswdsScan};
use crate::error::Result;
use crate::target::{same_website, url_base_domain, ScanTarget};
use seo::SeoScan;
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, NavigationResponse, PageSession, WaitPolicy};
use third_party::ThirdPartyScan;

/// Where the target URL ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlScan {
    /// URL reached after redirects
    pub final_url: String,
    /// Base domain of the final URL
    pub final_url_base_domain: String,
    /// Final response was 2xx
    pub final_url_is_live: bool,
    /// MIME type of the final response
    #[serde(rename = "finalUrlMIMEType")]
    pub final_url_mime_type: String,
    /// HTTP status of the final response
    pub final_url_status_code: u16,
    /// At least one redirect was followed
    pub target_url_redirects: bool,
    /// Target and final URL share a base domain
    pub final_url_same_domain: bool,
    /// Target and final URL are the same website
    pub final_url_same_website: bool,
}

impl UrlScan {
    fn from_response(target: &ScanTarget, response: &NavigationResponse) -> Self {
        let final_url_base_domain = url_base_domain(&response.url).unwrap_or_default();
        Self {
            final_url: response.url.clone(),
            final_url_same_domain: final_url_base_domain == target.base_domain(),
            final_url_base_domain,
            final_url_is_live: response.is_live(),
            final_url_mime_type: response.mime_type(),
            final_url_status_code: response.status,
            target_url_redirects: response.redirect_count > 0,
            final_url_same_website: same_website(target.as_str(), &response.url),
        }
    }
}

/// Everything learned from loading the home page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryScan {
    /// Redirect and status behaviour
    pub url_scan: UrlScan,
    /// SEO metadata
    pub seo_scan: SeoScan,
    /// Analytics detection
    pub dap_scan: DapScan,
    /// Design-system scoring
    pub uswds_scan: UswdsScan,
    /// Third-party hosts contacted
    pub third_party_scan: ThirdPartyScan,
}

/// Load the target and run every home page check on it.
pub async fn scan(browser: &dyn BrowserInstance, target: &ScanTarget) -> Result<PrimaryScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target).await;
    close_quietly(page).await;
    result
}

async fn inspect(page: &dyn PageSession, target: &ScanTarget) -> Result<PrimaryScan> {
    let response = page.navigate(target.as_str(), WaitPolicy::NetworkIdle).await?;
    let url_scan = UrlScan::from_response(target, &response);
    tracing::debug!(
        "Loaded {} -> {} ({})",
        target.as_str(),
        url_scan.final_url,
        url_scan.final_url_status_code
    );

    let dom = page.content().await?;
    let html = response.body.clone().unwrap_or_else(|| dom.clone());
    let requests = page.network_requests().await;

    let mut candidates = Vec::new();
    for request in requests.iter().filter(|r| dap::is_candidate_request(r)) {
        let body = page.response_body(&request.id).await;
        candidates.push(DapScriptCandidate::from_request(request, body));
    }

    let mut stylesheets = Vec::new();
    for request in requests.iter().filter(|r| r.is_stylesheet()) {
        if let Some(body) = page.response_body(&request.id).await {
            stylesheets.push(body);
        }
    }

    Ok(PrimaryScan {
        seo_scan: seo::scan(&dom),
        dap_scan: dap::summarize(&candidates),
        uswds_scan: uswds::scan(&html, &dom, &stylesheets),
        third_party_scan: third_party::scan(&requests, &url_scan.final_url_base_domain),
        url_scan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{request, FakeBrowser, FakeResponse, FakeSite};
    use crate::ScanError;
    use sitescan_browser::NetworkRequest;

    const HOME: &str = r#"<html><head><title>18F</title>
        <meta property="og:title" content="18F: Digital service delivery | Home">
        <link rel="stylesheet" href="/assets/uswds.css">
        </head><body><div class="usa-banner"></div><main>hello</main>
        <img src="/img/us_flag_small.png"></body></html>"#;

    const DAP_SCRIPT: &str = r#"var _fedmeta={VERSION:"20240712 v8.2 - GA4"};"#;

    fn site() -> FakeSite {
        FakeSite::default()
            .with_page(
                "https://18f.gov/",
                FakeResponse::html("https://18f.gsa.gov/", HOME).redirected(2),
            )
            .with_request(request("doc", "https://18f.gsa.gov/", "Document"), None)
            .with_request(
                request("css", "https://18f.gsa.gov/assets/uswds.css", "Stylesheet"),
                Some("/*! uswds v2.9.0 */ body{font-family:'Public Sans Web'}"),
            )
            .with_request(
                request(
                    "dap",
                    "https://dap.digitalgov.gov/Universal-Federated-Analytics-Min.js?agency=GSA",
                    "Script",
                ),
                Some(DAP_SCRIPT),
            )
            .with_request(
                NetworkRequest {
                    id: "ga".to_string(),
                    url: "https://www.google-analytics.com/g/collect".to_string(),
                    method: "POST".to_string(),
                    post_data: Some("tid=G-CSLL4ZEK4L".to_string()),
                    resource_type: Some("Ping".to_string()),
                    status: Some(204),
                },
                None,
            )
    }

    #[tokio::test]
    async fn test_primary_scan() {
        let browser = FakeBrowser::new(site());
        let target = ScanTarget::parse("18f.gov").expect("target");

        let result = scan(&browser, &target).await.expect("scan");

        let url = &result.url_scan;
        assert_eq!(url.final_url, "https://18f.gsa.gov/");
        assert_eq!(url.final_url_base_domain, "gsa.gov");
        assert!(url.final_url_is_live);
        assert_eq!(url.final_url_mime_type, "text/html");
        assert!(url.target_url_redirects);
        assert!(!url.final_url_same_domain);
        assert!(!url.final_url_same_website);

        assert!(result.seo_scan.main_element_final_url);
        assert_eq!(
            result.seo_scan.og_title_final_url.as_deref(),
            Some("18F: Digital service delivery | Home")
        );

        assert!(result.dap_scan.dap_detected);
        assert_eq!(result.dap_scan.dap_parameters.as_deref(), Some("agency=GSA"));
        assert_eq!(result.dap_scan.dap_version.as_deref(), Some("20240712 v8.2 - GA4"));

        assert_eq!(result.uswds_scan.usa_classes, 5);
        assert_eq!(result.uswds_scan.uswds_us_flag, 20);
        assert_eq!(result.uswds_scan.uswds_public_sans_font, 20);
        assert_eq!(result.uswds_scan.uswds_semantic_version.as_deref(), Some("2.9.0"));

        assert_eq!(
            result.third_party_scan.third_party_service_domains,
            vec!["dap.digitalgov.gov", "www.google-analytics.com"]
        );
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_navigation_error_closes_page() {
        let browser = FakeBrowser::new(site().failing("net::ERR_NAME_NOT_RESOLVED"));
        let target = ScanTarget::parse("18f.gov").expect("target");

        let err = scan(&browser, &target).await.expect_err("navigation fails");
        assert!(matches!(err, ScanError::Browser(_)));
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_usa_classes_use_rendered_dom() {
        let rendered = format!(
            "<html><body>{}</body></html>",
            r#"<div class="usa-card"></div>"#.repeat(4)
        );
        let browser = FakeBrowser::new(FakeSite::default().with_page(
            "https://18f.gov/",
            FakeResponse::html("https://18f.gov/", "<html><body></body></html>").with_dom(&rendered),
        ));
        let target = ScanTarget::parse("18f.gov").expect("target");

        let result = scan(&browser, &target).await.expect("scan");
        assert_eq!(result.uswds_scan.usa_classes, 10);
        assert_eq!(result.uswds_scan.uswds_inline_css, 0);
        assert!(result.url_scan.final_url_same_website);
        assert!(!result.url_scan.target_url_redirects);
    }

    #[test]
    fn test_url_scan_serializes_mime_key() {
        let json = serde_json::to_value(UrlScan::default()).expect("serialize");
        assert!(json.get("finalUrlMIMEType").is_some());
    }
}
