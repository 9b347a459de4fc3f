//! HTTP client shared by every adapter in a run.
//!
//! Network requests are bounded by a counting semaphore, identical requests
//! are collapsed through the [`RequestCache`] and `render` requests go through
//! the headless browser instead of the connection pool.

mod cache;
mod user_agent;

pub use cache::RequestCache;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use super::browser::{BrowserEngineConfig, BrowserFetcher};
use super::error::is_transient_status;
use super::ScrapeError;
use crate::models::{Method, Request, Response};
use crate::scrapers::office::DOCX;

/// Default number of network requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 30;

/// HTTP client with a shared request semaphore and response cache.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
    cache: RequestCache,
    browser: Arc<BrowserFetcher>,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(timeout: Duration, max_concurrent_requests: usize) -> Result<Self, ScrapeError> {
        Self::with_user_agent(timeout, max_concurrent_requests, None)
    }

    /// Create a new HTTP client with custom user agent configuration.
    /// - None: Use default user agent
    /// - Some("impersonate"): Use random real browser user agent
    /// - Some(custom): Use custom user agent string
    pub fn with_user_agent(
        timeout: Duration,
        max_concurrent_requests: usize,
        user_agent_config: Option<&str>,
    ) -> Result<Self, ScrapeError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            cache: RequestCache::new(),
            browser: Arc::new(BrowserFetcher::new(BrowserEngineConfig::default())),
        })
    }

    /// Use a specific browser configuration for `render` requests.
    pub fn with_browser(mut self, config: BrowserEngineConfig) -> Self {
        self.browser = Arc::new(BrowserFetcher::new(config));
        self
    }

    /// Share a semaphore with other clients.
    pub fn with_semaphore(mut self, semaphore: Arc<Semaphore>) -> Self {
        self.semaphore = semaphore;
        self
    }

    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Execute a request, reusing an earlier or in-flight response for an
    /// identical request.
    ///
    /// Responses with a transient status (429 or 5xx) are handed to the
    /// callers waiting on them but not kept, so the next fetch goes back to
    /// the network.
    pub async fn fetch(&self, request: &Request) -> Result<Arc<Response>, ScrapeError> {
        let response = self
            .cache
            .get_or_fetch(request, || self.execute(request))
            .await?;
        if is_transient_status(response.status()) {
            debug!(status = response.status(), "Not caching {}", request);
            self.cache.forget(request);
        }
        Ok(response)
    }

    /// Drop a cached response.
    pub fn forget(&self, request: &Request) {
        self.cache.forget(request);
    }

    /// Close the browser, if one was started.
    pub async fn close(&self) {
        self.browser.close().await;
    }

    async fn execute(&self, request: &Request) -> Result<Response, ScrapeError> {
        if request.method() == Method::Open {
            return open_file(request).await;
        }
        if request.render() {
            return self.render(request).await;
        }

        let _permit = self.permit().await?;

        debug!("Fetching {}", request);

        let url = request.path();
        let mut builder = match request.method() {
            Method::Post => self.client.post(url).form(request.data()),
            Method::Head => self.client.head(url),
            _ if request.data().is_empty() => self.client.get(url),
            _ => self.client.get(url).query(request.data()),
        };
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "Fetched {}", request);

        Ok(Response::new(
            final_url,
            status,
            content_type.as_deref(),
            request.encoding(),
            body,
        ))
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, ScrapeError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| ScrapeError::Config("request semaphore closed".to_string()))
    }

    /// Fetch through the browser. Rendered pages are always reported as
    /// 200 HTML.
    async fn render(&self, request: &Request) -> Result<Response, ScrapeError> {
        let _permit = self.permit().await?;
        let page = self
            .browser
            .render(request.path())
            .await
            .map_err(|e| ScrapeError::Render {
                url: request.path().to_string(),
                message: e.to_string(),
            })?;

        Ok(Response::new(
            page.final_url,
            200,
            Some("text/html"),
            request.encoding(),
            page.html.into_bytes(),
        ))
    }
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => Some("text/html"),
        "pdf" => Some("application/pdf"),
        "json" => Some("application/json"),
        "txt" => Some("text/plain"),
        "xml" => Some("application/xml"),
        "rtf" => Some("application/rtf"),
        "docx" => Some(DOCX),
        _ => None,
    }
}

/// Read a local file. A missing file is reported as status 404.
async fn open_file(request: &Request) -> Result<Response, ScrapeError> {
    let path = Path::new(request.path());
    match tokio::fs::read(path).await {
        Ok(body) => Ok(Response::new(
            request.path(),
            200,
            content_type_for(path),
            request.encoding(),
            body,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::new(
            request.path(),
            404,
            None,
            request.encoding(),
            Vec::new(),
        )),
        Err(e) => Err(ScrapeError::Io(e)),
    }
}
