//! Chromium-backed implementation of the browser capability traits.

use crate::error::{BrowserError, Result};
use crate::session::{
    BrowserFactory, BrowserInstance, NavigationResponse, NetworkRequest, PageSession, WaitPolicy,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId, ResourceType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);
const NETWORK_IDLE_MAX_IN_FLIGHT: usize = 2;
const NETWORK_IDLE_CAP: Duration = Duration::from_secs(15);
const NETWORK_IDLE_POLL: Duration = Duration::from_millis(50);

/// Launches headless Chromium instances.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    headless: bool,
    executable: Option<PathBuf>,
}

impl ChromiumFactory {
    /// Create a factory; `headless = false` opens visible windows.
    #[must_use]
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            executable: None,
        }
    }

    /// Use an explicit Chrome/Chromium binary instead of auto-detection.
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(BrowserError::LaunchError)
    }
}

#[async_trait::async_trait]
impl BrowserFactory for ChromiumFactory {
    type Instance = ChromiumBrowser;

    async fn create(&self) -> Result<ChromiumBrowser> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {}", e);
                }
            }
        });

        tracing::debug!("Launched Chromium instance");
        Ok(ChromiumBrowser { browser, handler })
    }

    async fn destroy(&self, mut instance: ChromiumBrowser) {
        if let Err(e) = instance.browser.close().await {
            tracing::debug!("Chromium close failed: {}", e);
        }
        if let Err(e) = instance.browser.wait().await {
            tracing::debug!("Chromium wait failed: {}", e);
        }
        instance.handler.abort();
        tracing::debug!("Destroyed Chromium instance");
    }
}

/// A running Chromium process.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

#[async_trait::async_trait]
impl BrowserInstance for ChromiumBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        let session = ChromiumPage::attach(page).await?;
        Ok(Box::new(session))
    }

    async fn validate(&self) -> bool {
        self.browser.version().await.is_ok()
    }
}

#[derive(Debug, Default)]
struct Capture {
    requests: Vec<NetworkRequest>,
    index: HashMap<String, usize>,
    in_flight: usize,
    awaiting_document: bool,
    main_request: Option<String>,
    main_redirects: u32,
    documents: HashMap<String, (u16, HashMap<String, String>)>,
}

impl Capture {
    fn on_request(&mut self, event: &EventRequestWillBeSent) {
        let id = event.request_id.inner().clone();
        let resource_type = event
            .r#type
            .as_ref()
            .map(|t| AsRef::<str>::as_ref(t).to_string());
        let is_document = matches!(event.r#type, Some(ResourceType::Document));

        if self.awaiting_document && is_document {
            self.awaiting_document = false;
            self.main_request = Some(id.clone());
            self.main_redirects = 0;
        }

        if let Some(&position) = self.index.get(&id) {
            // Redirect hop: same id, new URL.
            if event.redirect_response.is_some()
                && self.main_request.as_deref() == Some(id.as_str())
            {
                self.main_redirects += 1;
            }
            let entry = &mut self.requests[position];
            entry.url.clone_from(&event.request.url);
            entry.method.clone_from(&event.request.method);
            entry.post_data.clone_from(&event.request.post_data);
            return;
        }

        self.in_flight += 1;
        self.index.insert(id.clone(), self.requests.len());
        self.requests.push(NetworkRequest {
            id,
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            post_data: event.request.post_data.clone(),
            resource_type,
            status: None,
        });
    }

    fn on_response(&mut self, event: &EventResponseReceived) {
        let id = event.request_id.inner();
        let status = u16::try_from(event.response.status).unwrap_or_default();
        if let Some(&position) = self.index.get(id) {
            self.requests[position].status = Some(status);
        }
        if matches!(event.r#type, ResourceType::Document) {
            let headers = event
                .response
                .headers
                .inner()
                .as_object()
                .map(|map| {
                    map.iter()
                        .map(|(name, value)| {
                            let value = value
                                .as_str()
                                .map_or_else(|| value.to_string(), str::to_string);
                            (name.to_ascii_lowercase(), value)
                        })
                        .collect()
                })
                .unwrap_or_default();
            self.documents.insert(id.clone(), (status, headers));
        }
    }

    fn on_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// A Chromium tab with network capture.
pub struct ChromiumPage {
    page: Page,
    capture: Arc<Mutex<Capture>>,
    listeners: Vec<JoinHandle<()>>,
    closed: AtomicBool,
}

impl ChromiumPage {
    async fn attach(page: Page) -> Result<Self> {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let listen_err = |e: chromiumoxide::error::CdpError| {
            BrowserError::ChromiumError(format!("failed to subscribe to network events: {e}"))
        };

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen_err)?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(listen_err)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen_err)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen_err)?;

        let mut listeners = Vec::with_capacity(4);
        let state = Arc::clone(&capture);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                state.lock().await.on_request(&event);
            }
        }));
        let state = Arc::clone(&capture);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                state.lock().await.on_response(&event);
            }
        }));
        let state = Arc::clone(&capture);
        listeners.push(tokio::spawn(async move {
            while finished.next().await.is_some() {
                state.lock().await.on_finished();
            }
        }));
        let state = Arc::clone(&capture);
        listeners.push(tokio::spawn(async move {
            while failed.next().await.is_some() {
                state.lock().await.on_finished();
            }
        }));

        Ok(Self {
            page,
            capture,
            listeners,
            closed: AtomicBool::new(false),
        })
    }

    async fn wait_for_network_idle(&self) {
        let deadline = Instant::now() + NETWORK_IDLE_CAP;
        let mut quiet_since: Option<Instant> = None;
        loop {
            let in_flight = self.capture.lock().await.in_flight;
            let now = Instant::now();
            if in_flight <= NETWORK_IDLE_MAX_IN_FLIGHT {
                let since = *quiet_since.get_or_insert(now);
                if now.duration_since(since) >= NETWORK_IDLE_QUIET {
                    return;
                }
            } else {
                quiet_since = None;
            }
            if now >= deadline {
                tracing::debug!("Network never went idle, continuing with {} in flight", in_flight);
                return;
            }
            tokio::time::sleep(NETWORK_IDLE_POLL).await;
        }
    }

    async fn fetch_body(&self, request_id: &str) -> Option<String> {
        let params = GetResponseBodyParams::new(RequestId::new(request_id.to_string()));
        match self.page.execute(params).await {
            Ok(response) if !response.result.base64_encoded => Some(response.result.body),
            Ok(_) => None,
            Err(e) => {
                tracing::trace!("No body for request {}: {}", request_id, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<NavigationResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::PageClosed);
        }
        {
            let mut capture = self.capture.lock().await;
            capture.awaiting_document = true;
            capture.main_request = None;
        }

        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;

        if wait == WaitPolicy::NetworkIdle {
            self.wait_for_network_idle().await;
        }

        let final_url = self.current_url().await?;
        let (main_request, redirect_count, status, headers) = {
            let capture = self.capture.lock().await;
            let main = capture.main_request.clone();
            let (status, headers) = main
                .as_ref()
                .and_then(|id| capture.documents.get(id).cloned())
                .unwrap_or_default();
            (main, capture.main_redirects, status, headers)
        };

        let body = match &main_request {
            Some(id) => self.fetch_body(id).await,
            None => None,
        };

        Ok(NavigationResponse {
            url: final_url,
            status,
            headers,
            redirect_count,
            body,
        })
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::EvaluationError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn network_requests(&self) -> Vec<NetworkRequest> {
        self.capture.lock().await.requests.clone()
    }

    async fn response_body(&self, request_id: &str) -> Option<String> {
        self.fetch_body(request_id).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for listener in &self.listeners {
            listener.abort();
        }
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let page = self.page.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!("Deferred page close failed: {}", e);
                }
            });
        }
    }
}
