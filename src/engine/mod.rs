//! Fetch engine.
//!
//! Drives one [`Scraper`] through its three phases: discover index requests,
//! expand each index into entries, then fetch every entry not already in the
//! corpus. Index results are persisted per source and reused until their
//! refresh interval passes. Failures on single requests or entries are
//! logged and counted; fatal errors stop the source.

mod gather;
mod logged;
mod retry;
mod state;

pub use gather::gather_ordered;
pub use logged::{logged, logged_sync};
pub use retry::{with_retry, RetryConfig};
pub use state::{IndexPage, IndexStore, RefreshInterval};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Entry, Request};
use crate::ocr::OcrPipeline;
use crate::scrapers::{HttpClient, ScrapeError, Scraper, ScraperContext};
use crate::storage::CorpusWriter;

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";

/// Counts from one source's run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub index_requests: usize,
    /// Index requests that failed and were skipped.
    pub failed_indices: usize,
    /// Distinct entries found across all indices.
    pub entries: usize,
    pub already_included: usize,
    pub scraped: usize,
    /// Entries with no document (missing, or too little text).
    pub missing: usize,
    pub failed: usize,
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} index requests ({} failed), {} entries, {} already included, \
             {} scraped, {} missing, {} failed",
            self.source,
            self.index_requests,
            self.failed_indices,
            self.entries,
            self.already_included,
            self.scraped,
            self.missing,
            self.failed
        )
    }
}

/// Runs scrapers against shared network and OCR resources.
pub struct Engine {
    context: ScraperContext,
    data_dir: PathBuf,
    indices_refresh: RefreshInterval,
    index_refresh: RefreshInterval,
    retry: RetryConfig,
    show_progress: bool,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let client = HttpClient::with_user_agent(
            config.request_timeout(),
            config.max_concurrent_requests,
            config.user_agent.as_deref(),
        )?
        .with_browser(config.browser.clone());
        let ocr = OcrPipeline::new(config.ocr.clone());

        Ok(Self {
            context: ScraperContext::new(client, ocr),
            data_dir: config.data_dir(),
            indices_refresh: config.indices_refresh(),
            index_refresh: config.index_refresh(),
            retry: config.retry.clone(),
            show_progress: true,
        })
    }

    /// Show progress bars on stderr (on by default).
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Resources to hand to scrapers this engine will run.
    pub fn context(&self) -> &ScraperContext {
        &self.context
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Release the browser, if one was started.
    pub async fn close(&self) {
        self.context.client.close().await;
    }

    fn progress(&self, message: String) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(message);
        bar
    }

    /// Scrape every document of one source into the corpus.
    pub async fn run(
        &self,
        scraper: &dyn Scraper,
        corpus: &mut CorpusWriter,
    ) -> Result<SourceReport, ScrapeError> {
        let source = scraper.source();
        let mut report = SourceReport {
            source: source.to_string(),
            ..SourceReport::default()
        };

        let entries = self.index(scraper, &mut report).await?;
        report.entries = entries.len();

        let pending: Vec<Entry> = entries
            .into_values()
            .filter(|entry| !corpus.contains(entry.version_id()))
            .collect();
        report.already_included = report.entries - pending.len();
        info!(
            "{}: {} entries, {} to scrape",
            source,
            report.entries,
            pending.len()
        );

        let bar = self.progress(format!("Scraping {}", source));
        bar.set_length(pending.len() as u64);

        let mut tasks: FuturesUnordered<_> = pending
            .iter()
            .map(|entry| async move {
                let result = logged(
                    "get_doc",
                    entry,
                    with_retry(&self.retry, || scraper.get_doc(entry)),
                )
                .await;
                self.context.client.forget(entry.request());
                (entry, result)
            })
            .collect();

        while let Some((entry, result)) = tasks.next().await {
            bar.inc(1);
            match result {
                Ok(Some(scraped)) if !scraped.is_empty() => {
                    logged_sync("write", entry.version_id(), || corpus.write(&scraped))?;
                    report.scraped += 1;
                }
                Ok(_) => {
                    debug!("No document for {}", entry.version_id());
                    report.missing += 1;
                }
                Err(e) if e.is_fatal() => {
                    bar.abandon();
                    return Err(e);
                }
                Err(_) => report.failed += 1,
            }
        }
        bar.finish_and_clear();

        info!("{}", report);
        Ok(report)
    }

    /// Discover and expand the source's indices, returning its entries keyed
    /// by version id.
    async fn index(
        &self,
        scraper: &dyn Scraper,
        report: &mut SourceReport,
    ) -> Result<BTreeMap<String, Entry>, ScrapeError> {
        let source = scraper.source();
        let now = Utc::now();
        let mut store = IndexStore::load(&self.data_dir, source).await?;

        let requests = match store.requests(self.indices_refresh, now) {
            Some(requests) => {
                debug!("{}: reusing {} index requests", source, requests.len());
                requests
            }
            None => {
                let requests = logged("get_index_reqs", source, scraper.get_index_reqs()).await?;
                store.set_requests(&requests, now);
                requests
            }
        };
        store.retain_pages(&requests);
        report.index_requests = requests.len();

        let mut ordered: Vec<Request> = requests.into_iter().collect();
        ordered.sort();

        let mut pages: Vec<HashSet<Entry>> = Vec::with_capacity(ordered.len());
        let mut stale = Vec::new();
        for request in &ordered {
            match store.page(request, self.index_refresh, now) {
                Some(entries) => pages.push(entries),
                None => stale.push(request),
            }
        }
        info!(
            "{}: {} index requests, {} to fetch",
            source,
            ordered.len(),
            stale.len()
        );

        let bar = self.progress(format!("Indexing {}", source));
        let results = gather_ordered(
            stale
                .iter()
                .map(|request| logged("get_index", *request, scraper.get_index(request))),
            &bar,
        )
        .await;
        bar.finish_and_clear();

        let mut fatal = None;
        for (request, result) in stale.into_iter().zip(results) {
            match result {
                Ok(entries) => {
                    store.set_page(request.clone(), &entries, now);
                    pages.push(entries);
                }
                Err(e) if e.is_fatal() => {
                    fatal.get_or_insert(e);
                }
                Err(_) => report.failed_indices += 1,
            }
        }

        store.save().await?;
        if let Some(e) = fatal {
            return Err(e);
        }

        let mut entries = BTreeMap::new();
        for entry in pages.into_iter().flatten() {
            if let Some(existing) = entries.get(entry.version_id()) {
                if existing != &entry {
                    warn!(
                        "{}: duplicate version id {} from different entries",
                        source,
                        entry.version_id()
                    );
                }
                continue;
            }
            entries.insert(entry.version_id().to_string(), entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = SourceReport {
            source: "example".into(),
            index_requests: 2,
            entries: 10,
            already_included: 3,
            scraped: 5,
            missing: 1,
            failed: 1,
            ..SourceReport::default()
        };
        assert_eq!(
            report.to_string(),
            "example: 2 index requests (0 failed), 10 entries, 3 already included, \
             5 scraped, 1 missing, 1 failed"
        );
    }

    #[test]
    fn test_engine_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().to_string_lossy().into_owned()),
            indices_refresh_secs: 0,
            ..Config::default()
        };
        let engine = Engine::new(&config).unwrap().with_progress(false);
        assert_eq!(engine.data_dir(), dir.path());
        assert_eq!(engine.indices_refresh, RefreshInterval::Always);
        assert_eq!(
            engine.context().client.semaphore().available_permits(),
            config.max_concurrent_requests
        );
    }
}
