//! Redirects performed by the page itself rather than by HTTP.

use super::close_quietly;
use crate::error::Result;
use crate::target::ScanTarget;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, PageSession, WaitPolicy};
use std::sync::OnceLock;
use std::time::Duration;

/// Client-side redirect findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRedirectScan {
    /// URL reached through HTTP redirects
    pub http_final_url: String,
    /// URL shown after the settle period
    pub client_final_url: String,
    /// The page moved after loading
    pub client_redirect: bool,
    /// A `<meta http-equiv="refresh">` is present
    pub meta_refresh: bool,
    /// Target of the meta refresh, if it names one
    pub meta_refresh_url: Option<String>,
    /// The page moved without a meta refresh
    pub script_redirect: bool,
}

fn meta_refresh_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("meta[http-equiv]").expect("valid selector"))
}

/// A `<meta http-equiv="refresh">` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRefresh {
    /// Destination, `None` for a plain reload
    pub url: Option<String>,
}

/// First meta refresh directive in the document.
#[must_use]
pub fn meta_refresh(dom: &str) -> Option<MetaRefresh> {
    let document = Html::parse_document(dom);
    let content = document
        .select(meta_refresh_selector())
        .find(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })?
        .value()
        .attr("content")
        .unwrap_or_default()
        .to_string();

    let url = content.split_once(';').and_then(|(_, rest)| {
        let rest = rest.trim();
        let (key, value) = rest.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("url")
            .then(|| value.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .filter(|v| !v.is_empty())
    });
    Some(MetaRefresh { url })
}

/// Load the target, let it settle, and compare where it ends up.
pub async fn scan(
    browser: &dyn BrowserInstance,
    target: &ScanTarget,
    settle: Duration,
) -> Result<ClientRedirectScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target, settle).await;
    close_quietly(page).await;
    result
}

async fn inspect(
    page: &dyn PageSession,
    target: &ScanTarget,
    settle: Duration,
) -> Result<ClientRedirectScan> {
    let response = page.navigate(target.as_str(), WaitPolicy::Load).await?;
    let dom = page.content().await?;
    let refresh = meta_refresh(&dom);

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    let client_final_url = page.current_url().await?;
    let client_redirect = client_final_url != response.url;

    Ok(ClientRedirectScan {
        http_final_url: response.url,
        client_final_url,
        client_redirect,
        meta_refresh: refresh.is_some(),
        script_redirect: client_redirect && refresh.is_none(),
        meta_refresh_url: refresh.and_then(|r| r.url),
    })
}
