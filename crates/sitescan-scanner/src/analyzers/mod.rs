//! Page analyzers.
//!
//! Each analyzer is an async function returning its aspect's result or a
//! [`ScanError`](crate::ScanError); the orchestrator binds it to a timeout and
//! turns errors into outcomes. Browser analyzers open their own page and close
//! it before returning.

pub mod accessibility;
pub mod client_redirect;
pub mod dns;
pub mod not_found;
pub mod performance;
pub mod primary;
pub mod robots_txt;
pub mod security;
pub mod seo;
pub mod sitemap_xml;
pub mod third_party;
pub mod www;

use crate::error::Result;
use sitescan_browser::{NavigationResponse, PageSession};

pub(crate) async fn close_quietly(page: Box<dyn PageSession>) {
    if let Err(e) = page.close().await {
        tracing::debug!("Failed to close page: {}", e);
    }
}

/// Raw body of the navigation response, or the rendered text when the
/// browser did not keep it.
pub(crate) async fn response_text(
    page: &dyn PageSession,
    response: &NavigationResponse,
) -> Result<String> {
    if let Some(body) = &response.body {
        return Ok(body.clone());
    }
    let text = page
        .evaluate("document.documentElement ? document.documentElement.innerText : ''")
        .await?;
    Ok(text.as_str().unwrap_or_default().to_string())
}
