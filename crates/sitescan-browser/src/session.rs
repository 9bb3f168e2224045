//! Capability traits over a browser and its pages.
//!
//! Analyzers only ever see these traits, so the pool and the scanner can be
//! exercised with in-memory fakes.

use crate::error::Result;
use std::collections::HashMap;

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// The `load` event fired
    #[default]
    Load,
    /// `load` fired and at most two requests stayed in flight for 500 ms
    NetworkIdle,
}

/// Main-document response of a navigation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationResponse {
    /// URL after all redirects
    pub url: String,
    /// HTTP status of the final response
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Number of HTTP redirects followed
    pub redirect_count: u32,
    /// Raw response body, when the browser kept it
    pub body: Option<String>,
}

impl NavigationResponse {
    /// MIME type from `content-type` without parameters, or `unknown`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        self.headers
            .get("content-type")
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .map_or_else(|| "unknown".to_string(), str::to_string)
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_live(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request observed by a page, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkRequest {
    /// Protocol-level request id, usable with [`PageSession::response_body`]
    pub id: String,
    /// Request URL (the last hop when redirected)
    pub url: String,
    /// HTTP method
    pub method: String,
    /// POST body, if any
    pub post_data: Option<String>,
    /// Resource type as reported by the browser (`Document`, `Script`, `Stylesheet`, ...)
    pub resource_type: Option<String>,
    /// Response status, once a response arrived
    pub status: Option<u16>,
}

impl NetworkRequest {
    /// True when the browser classified the request as a stylesheet.
    #[must_use]
    pub fn is_stylesheet(&self) -> bool {
        self.resource_type.as_deref() == Some("Stylesheet")
    }
}

/// A single open page.
///
/// Implementations close the underlying page on drop if [`close`](Self::close)
/// was never called, so a cancelled analyzer does not leak tabs.
#[async_trait::async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait according to `wait`.
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<NavigationResponse>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    /// Evaluate a script and return its JSON value (`null` for `undefined`).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// URL currently shown by the page.
    async fn current_url(&self) -> Result<String>;

    /// All requests observed since the page was opened.
    async fn network_requests(&self) -> Vec<NetworkRequest>;

    /// Body of a finished response, if still retrievable as text.
    async fn response_body(&self, request_id: &str) -> Option<String>;

    /// Close the page.
    async fn close(&self) -> Result<()>;
}

/// A running browser able to open pages.
#[async_trait::async_trait]
pub trait BrowserInstance: Send + Sync + 'static {
    /// Open a fresh page with network capture enabled.
    async fn open_page(&self) -> Result<Box<dyn PageSession>>;

    /// Cheap liveness check used before handing the instance out.
    async fn validate(&self) -> bool;
}

/// Creates and destroys browser instances for the pool.
#[async_trait::async_trait]
pub trait BrowserFactory: Send + Sync + 'static {
    /// Instance type produced by this factory.
    type Instance: BrowserInstance;

    /// Launch a new instance.
    async fn create(&self) -> Result<Self::Instance>;

    /// Tear an instance down. Must not fail; problems are logged.
    async fn destroy(&self, instance: Self::Instance);
}
