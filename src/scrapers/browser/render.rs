//! chromiumoxide-backed rendering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::{Handler, HandlerConfig};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserEngineConfig, BrowserError, RenderedPage};

const RENDER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Time given to scripts after the load event before the DOM is read.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

const CHROME_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

const CHROME_COMMANDS: &[&str] = &["chromium", "chromium-browser", "google-chrome"];

struct Running {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
}

/// Lazily started browser shared by all renders of a run.
pub struct BrowserFetcher {
    config: BrowserEngineConfig,
    running: RwLock<Option<Arc<Running>>>,
}

fn find_chrome() -> Result<PathBuf, BrowserError> {
    if let Some(path) = CHROME_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Ok(path);
    }
    CHROME_COMMANDS
        .iter()
        .find_map(|cmd| which::which(cmd).ok())
        .ok_or(BrowserError::NotFound)
}

/// Drive the CDP connection until it closes.
fn spawn_events(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            running: RwLock::new(None),
        }
    }

    async fn launch(&self) -> Result<Running, BrowserError> {
        if let Some(ref url) = self.config.remote_url {
            return self.connect(url).await;
        }

        let chrome = find_chrome()?;
        info!(
            "Launching {} (headless={})",
            chrome.display(),
            self.config.headless
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .request_timeout(Duration::from_secs(self.config.timeout))
            .args([
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--no-first-run",
                "--no-sandbox",
            ]);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        Ok(Running {
            browser: Mutex::new(browser),
            events: spawn_events(handler),
        })
    }

    /// Attach to a browser exposing the DevTools protocol at `url`.
    async fn connect(&self, url: &str) -> Result<Running, BrowserError> {
        info!("Connecting to remote browser at {}", url);
        let remote_err = |message: String| BrowserError::Remote {
            url: url.to_string(),
            message,
        };

        let http_url = url
            .replacen("ws://", "http://", 1)
            .replacen("wss://", "https://", 1);
        let version: serde_json::Value = reqwest::get(format!(
            "{}/json/version",
            http_url.trim_end_matches('/')
        ))
        .await
        .map_err(|e| remote_err(e.to_string()))?
        .json()
        .await
        .map_err(|e| remote_err(e.to_string()))?;
        let ws_url = version["webSocketDebuggerUrl"]
            .as_str()
            .ok_or_else(|| remote_err("no webSocketDebuggerUrl".to_string()))?;

        let handler_config = HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| remote_err(e.to_string()))?;
        Ok(Running {
            browser: Mutex::new(browser),
            events: spawn_events(handler),
        })
    }

    async fn running(&self) -> Result<Arc<Running>, BrowserError> {
        if let Some(running) = self.running.read().await.as_ref() {
            return Ok(Arc::clone(running));
        }

        let mut slot = self.running.write().await;
        if let Some(running) = slot.as_ref() {
            return Ok(Arc::clone(running));
        }
        let running = Arc::new(self.launch().await?);
        *slot = Some(Arc::clone(&running));
        Ok(running)
    }

    /// Load `url` in a new tab and return its DOM once scripts have run.
    pub async fn render(&self, url: &str) -> Result<RenderedPage, BrowserError> {
        let running = self.running().await?;
        let page = running
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        let result = self.load(&page, url).await;
        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }
        result
    }

    async fn load(&self, page: &Page, url: &str) -> Result<RenderedPage, BrowserError> {
        let page_err = |e: chromiumoxide::error::CdpError| BrowserError::Page(e.to_string());
        let timeout = Duration::from_secs(self.config.timeout);

        page.execute(SetUserAgentOverrideParams::new(RENDER_USER_AGENT))
            .await
            .map_err(page_err)?;

        debug!("Rendering {}", url);
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(self.config.timeout))?
            .map_err(page_err)?;
        tokio::time::sleep(SETTLE_DELAY).await;

        if let Some(ref selector) = self.config.wait_for_selector {
            match tokio::time::timeout(timeout, page.find_element(selector.as_str())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("{} has no element matching {}: {}", url, selector, e),
                Err(_) => warn!("Timed out waiting for {} on {}", selector, url),
            }
        }

        let final_url = page
            .url()
            .await
            .map_err(page_err)?
            .unwrap_or_else(|| url.to_string());
        let html = page.content().await.map_err(page_err)?;

        Ok(RenderedPage { final_url, html })
    }

    /// Shut the browser down. A later render starts a new one.
    pub async fn close(&self) {
        let Some(running) = self.running.write().await.take() else {
            return;
        };
        match Arc::try_unwrap(running) {
            Ok(running) => {
                let mut browser = running.browser.into_inner();
                if let Err(e) = browser.close().await {
                    debug!("Browser close failed: {}", e);
                }
                let _ = browser.wait().await;
                running.events.abort();
            }
            Err(running) => running.events.abort(),
        }
    }
}
