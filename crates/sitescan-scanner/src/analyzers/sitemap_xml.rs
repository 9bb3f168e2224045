//! sitemap.xml presence and size.

use super::{close_quietly, response_text};
use crate::error::Result;
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, PageSession, WaitPolicy};

const SITEMAP_PATH: &str = "/sitemap.xml";
const URL_COUNT_SCRIPT: &str = "document.getElementsByTagName('url').length";

/// sitemap.xml findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapXmlScan {
    /// URL reached after redirects
    pub sitemap_xml_final_url: String,
    /// Final response was 2xx
    pub sitemap_xml_final_url_live: bool,
    /// At least one redirect was followed
    pub sitemap_target_url_redirects: bool,
    /// MIME type of the final response
    pub sitemap_xml_final_url_mime_type: String,
    /// HTTP status of the final response
    pub sitemap_xml_status_code: u16,
    /// Final URL is `/sitemap.xml` and live
    pub sitemap_xml_detected: bool,
    /// Body size in bytes (detected only)
    pub sitemap_xml_final_url_filesize: Option<usize>,
    /// `<url>` elements (detected only)
    pub sitemap_xml_count: Option<u64>,
    /// `.pdf` occurrences (detected only)
    pub sitemap_xml_pdf_count: Option<usize>,
}

/// Fetch `/sitemap.xml` on the target and measure it.
pub async fn scan(browser: &dyn BrowserInstance, target: &ScanTarget) -> Result<SitemapXmlScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target).await;
    close_quietly(page).await;
    result
}

async fn inspect(page: &dyn PageSession, target: &ScanTarget) -> Result<SitemapXmlScan> {
    let response = page
        .navigate(target.with_path(SITEMAP_PATH).as_str(), WaitPolicy::Load)
        .await?;

    let live = response.is_live();
    let final_path = url::Url::parse(&response.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let detected = final_path == SITEMAP_PATH && live;

    let mut result = SitemapXmlScan {
        sitemap_xml_final_url: response.url.clone(),
        sitemap_xml_final_url_live: live,
        sitemap_target_url_redirects: response.redirect_count > 0,
        sitemap_xml_final_url_mime_type: response.mime_type(),
        sitemap_xml_status_code: response.status,
        sitemap_xml_detected: detected,
        ..SitemapXmlScan::default()
    };

    if detected {
        let text = response_text(page, &response).await?;
        let url_count = match page.evaluate(URL_COUNT_SCRIPT).await?.as_u64() {
            Some(count) => count,
            None => url_elements(&text),
        };
        result.sitemap_xml_final_url_filesize = Some(text.len());
        result.sitemap_xml_count = Some(url_count);
        result.sitemap_xml_pdf_count = Some(pdf_count(&text));
    }
    Ok(result)
}

/// Occurrences of `.pdf` in the raw sitemap.
pub fn pdf_count(text: &str) -> usize {
    text.matches(".pdf").count()
}

fn url_elements(text: &str) -> u64 {
    let count = text.matches("<url>").count() + text.matches("<url ").count();
    u64::try_from(count).unwrap_or(u64::MAX)
}
