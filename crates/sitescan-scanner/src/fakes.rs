//! In-memory browser used by unit tests.

use sitescan_browser::{
    BrowserError, BrowserFactory, BrowserInstance, NavigationResponse, NetworkRequest,
    PageSession, WaitPolicy,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeResponse {
    response: NavigationResponse,
    dom: String,
}

impl FakeResponse {
    pub fn text(final_url: &str, status: u16, content_type: &str, body: &str) -> Self {
        let headers = HashMap::from([("content-type".to_string(), content_type.to_string())]);
        Self {
            response: NavigationResponse {
                url: final_url.to_string(),
                status,
                headers,
                redirect_count: 0,
                body: Some(body.to_string()),
            },
            dom: body.to_string(),
        }
    }

    pub fn html(final_url: &str, body: &str) -> Self {
        Self::text(final_url, 200, "text/html; charset=utf-8", body)
    }

    pub fn redirected(mut self, hops: u32) -> Self {
        self.response.redirect_count = hops;
        self
    }

    pub fn with_dom(mut self, dom: &str) -> Self {
        self.dom = dom.to_string();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakeResponse>,
    evaluations: Vec<(String, serde_json::Value)>,
    requests: Vec<NetworkRequest>,
    bodies: HashMap<String, String>,
    script_location: Option<String>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl FakeSite {
    pub fn with_page(mut self, url: &str, response: FakeResponse) -> Self {
        self.pages.insert(url.to_string(), response);
        self
    }

    pub fn with_evaluation(mut self, needle: &str, value: serde_json::Value) -> Self {
        self.evaluations.push((needle.to_string(), value));
        self
    }

    pub fn with_request(mut self, request: NetworkRequest, body: Option<&str>) -> Self {
        if let Some(body) = body {
            self.bodies.insert(request.id.clone(), body.to_string());
        }
        self.requests.push(request);
        self
    }

    pub fn with_script_location(mut self, url: &str) -> Self {
        self.script_location = Some(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

pub fn request(id: &str, url: &str, resource_type: &str) -> NetworkRequest {
    NetworkRequest {
        id: id.to_string(),
        url: url.to_string(),
        method: "GET".to_string(),
        post_data: None,
        resource_type: Some(resource_type.to_string()),
        status: Some(200),
    }
}

#[derive(Clone)]
pub struct FakeBrowser {
    site: Arc<FakeSite>,
    open: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_pages(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BrowserInstance for FakeBrowser {
    async fn open_page(&self) -> sitescan_browser::Result<Box<dyn PageSession>> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            open: Arc::clone(&self.open),
            closed: AtomicBool::new(false),
            location: Mutex::new("about:blank".to_string()),
        }))
    }

    async fn validate(&self) -> bool {
        true
    }
}

struct FakePage {
    site: Arc<FakeSite>,
    open: Arc<AtomicUsize>,
    closed: AtomicBool,
    location: Mutex<String>,
}

impl FakePage {
    fn location(&self) -> String {
        self.location.lock().expect("location lock").clone()
    }
}

#[async_trait::async_trait]
impl PageSession for FakePage {
    async fn navigate(
        &self,
        url: &str,
        _wait: WaitPolicy,
    ) -> sitescan_browser::Result<NavigationResponse> {
        if let Some(delay) = self.site.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.site.failure {
            return Err(BrowserError::NavigationError(message.clone()));
        }
        let response = match self.site.pages.get(url) {
            Some(page) => page.response.clone(),
            None => FakeResponse::text(url, 404, "text/html", "not found").response,
        };
        *self.location.lock().expect("location lock") = response.url.clone();
        Ok(response)
    }

    async fn content(&self) -> sitescan_browser::Result<String> {
        let location = self.location();
        Ok(self
            .site
            .pages
            .values()
            .find(|page| page.response.url == location)
            .map(|page| page.dom.clone())
            .unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> sitescan_browser::Result<serde_json::Value> {
        Ok(self
            .site
            .evaluations
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> sitescan_browser::Result<String> {
        Ok(self
            .site
            .script_location
            .clone()
            .unwrap_or_else(|| self.location()))
    }

    async fn network_requests(&self) -> Vec<NetworkRequest> {
        self.site.requests.clone()
    }

    async fn response_body(&self, request_id: &str) -> Option<String> {
        self.site.bodies.get(request_id).cloned()
    }

    async fn close(&self) -> sitescan_browser::Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for FakePage {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Factory handing out browsers that all serve the same fake site.
#[derive(Clone)]
pub struct FakeFactory {
    browser: FakeBrowser,
    pub created: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            browser: FakeBrowser::new(site),
            created: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeSite::default())
        }
    }

    pub fn open_pages(&self) -> usize {
        self.browser.open_pages()
    }
}

#[async_trait::async_trait]
impl BrowserFactory for FakeFactory {
    type Instance = FakeBrowser;

    async fn create(&self) -> sitescan_browser::Result<FakeBrowser> {
        if self.fail {
            return Err(BrowserError::LaunchError("chrome not found".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.browser.clone())
    }

    async fn destroy(&self, _instance: FakeBrowser) {}
}
