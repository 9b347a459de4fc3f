//! Headless browser for pages that only render their content with scripts.
//!
//! One Chrome instance (launched locally or reached over CDP at
//! `remote_url`) is started on first use and shared by every render; each
//! render opens its own tab, so renders run concurrently.

mod config;
#[cfg(feature = "browser")]
mod render;

pub use config::BrowserEngineConfig;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Chrome/Chromium not found; install chromium or set browser.remote_url")]
    NotFound,

    #[error("failed to start browser: {0}")]
    Launch(String),

    #[error("failed to reach remote browser at {url}: {message}")]
    Remote { url: String, message: String },

    #[error("page error: {0}")]
    Page(String),

    #[error("navigation timed out after {0}s")]
    Timeout(u64),

    #[error("browser support not compiled in; rebuild with --features browser")]
    Disabled,
}

/// The DOM of a rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
}

#[cfg(feature = "browser")]
pub use render::BrowserFetcher;

#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    _config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { _config: config }
    }

    pub async fn render(&self, _url: &str) -> Result<RenderedPage, BrowserError> {
        Err(BrowserError::Disabled)
    }

    pub async fn close(&self) {}
}
