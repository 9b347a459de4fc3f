//! Adapter contract and the shared fetch layer.
//!
//! An adapter ([`Scraper`]) knows how one source lists and presents its
//! documents. The engine drives every adapter through the same three calls
//! and hands each one a [`ScraperContext`] holding the run's shared network
//! client and OCR pipeline, so concurrency limits and response reuse apply
//! across all of a source's work.

pub mod browser;
pub mod config;
pub mod configurable;
mod error;
pub mod extract;
mod http_client;
pub mod office;

pub use browser::{BrowserEngineConfig, BrowserError, BrowserFetcher, RenderedPage};
pub use config::{DocumentConfig, IndexConfig, PageRange, PdfMode, ScraperConfig};
pub use configurable::ConfigurableScraper;
pub use error::ScrapeError;
pub use extract::html_to_text;
pub use office::{docx_to_text, rtf_to_text};
pub use http_client::{
    resolve_user_agent, HttpClient, RequestCache, DEFAULT_MAX_CONCURRENT_REQUESTS, USER_AGENT,
};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::{Entry, Request, Scraped};
use crate::ocr::OcrPipeline;

/// Shared resources handed to adapters at construction.
#[derive(Clone)]
pub struct ScraperContext {
    pub client: HttpClient,
    pub ocr: OcrPipeline,
}

impl ScraperContext {
    pub fn new(client: HttpClient, ocr: OcrPipeline) -> Self {
        Self { client, ocr }
    }
}

/// A source of legal documents.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Source id; prefixes every version id this adapter produces.
    fn source(&self) -> &str;

    /// Requests whose responses list documents. May depend on the current
    /// time, e.g. one request per year up to now.
    async fn get_index_reqs(&self) -> Result<HashSet<Request>, ScrapeError>;

    /// Parse one index into entries.
    async fn get_index(&self, request: &Request) -> Result<HashSet<Entry>, ScrapeError>;

    /// Fetch and normalize one entry. `None` means the document is missing
    /// or had no usable text.
    async fn get_doc(&self, entry: &Entry) -> Result<Option<Scraped>, ScrapeError>;
}
