//! robots.txt presence and directives.

use super::{close_quietly, response_text};
use crate::error::Result;
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, PageSession, WaitPolicy};

const ROBOTS_PATH: &str = "/robots.txt";

/// robots.txt findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsTxtScan {
    /// URL reached after redirects
    pub robots_txt_final_url: String,
    /// Final response was 2xx
    pub robots_txt_final_url_live: bool,
    /// At least one redirect was followed
    pub robots_txt_target_url_redirects: bool,
    /// MIME type of the final response
    pub robots_txt_final_url_mime_type: String,
    /// HTTP status of the final response
    pub robots_txt_status_code: u16,
    /// Final URL is `/robots.txt` and live
    pub robots_txt_detected: bool,
    /// Body size in bytes (detected only)
    pub robots_txt_final_url_size: Option<usize>,
    /// Last parsable `crawl-delay` (detected only)
    pub robots_txt_crawl_delay: Option<u32>,
    /// `sitemap:` values joined by `,` (detected only)
    pub robots_txt_sitemap_locations: Option<String>,
}

/// Fetch and parse `/robots.txt` on the target.
pub async fn scan(browser: &dyn BrowserInstance, target: &ScanTarget) -> Result<RobotsTxtScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target).await;
    close_quietly(page).await;
    result
}

async fn inspect(page: &dyn PageSession, target: &ScanTarget) -> Result<RobotsTxtScan> {
    let response = page
        .navigate(target.with_path(ROBOTS_PATH).as_str(), WaitPolicy::Load)
        .await?;

    let live = response.is_live();
    let final_path = url::Url::parse(&response.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let detected = final_path == ROBOTS_PATH && live;

    let mut result = RobotsTxtScan {
        robots_txt_final_url: response.url.clone(),
        robots_txt_final_url_live: live,
        robots_txt_target_url_redirects: response.redirect_count > 0,
        robots_txt_final_url_mime_type: response.mime_type(),
        robots_txt_status_code: response.status,
        robots_txt_detected: detected,
        ..RobotsTxtScan::default()
    };

    if detected {
        let text = response_text(page, &response).await?;
        result.robots_txt_final_url_size = Some(text.len());
        result.robots_txt_crawl_delay = crawl_delay(&text);
        result.robots_txt_sitemap_locations = Some(sitemap_locations(&text));
    }
    Ok(result)
}

fn directive_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let line = line.trim();
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
}

/// Last parsable `crawl-delay` directive, in whole seconds.
///
/// Only the leading digits count, so `1.5` reads as 1.
pub fn crawl_delay(robots: &str) -> Option<u32> {
    let mut delay = None;
    for line in robots.lines() {
        let Some(value) = directive_value(line, "crawl-delay") else {
            continue;
        };
        let digits = value
            .find(|c: char| !c.is_ascii_digit())
            .map_or(value, |end| &value[..end]);
        match digits.parse::<u32>() {
            Ok(parsed) => delay = Some(parsed),
            Err(e) => tracing::warn!("Could not parse crawl delay {:?}: {}", line.trim(), e),
        }
    }
    delay
}

/// Every `sitemap:` value, in order, joined by `,`.
pub fn sitemap_locations(robots: &str) -> String {
    robots
        .lines()
        .filter_map(|line| directive_value(line, "sitemap"))
        .filter_map(|value| {
            let location = value.split_whitespace().next();
            if location.is_none() {
                tracing::warn!("Empty sitemap directive in robots.txt");
            }
            location
        })
        .collect::<Vec<_>>()
        .join(",")
}
