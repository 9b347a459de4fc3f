//! Configurable scraper driven by CSS selectors.
//!
//! Covers sources whose indices are plain lists of links and whose documents
//! are an HTML page with the text in one element, a PDF, a DOCX or RTF file,
//! or plain text.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use scraper::Selector;
use tracing::debug;
use url::Url;

use super::config::{PdfMode, ScraperConfig};
use super::extract::html_to_text;
use super::office::{docx_to_text, rtf_to_text, DOCX};
use super::{ScrapeError, Scraper, ScraperContext};
use crate::models::{Entry, Method, Request, Response, Scraped};
use crate::normalize::{abbreviate, make_doc, DocumentDraft};
use crate::ocr::is_sparse_text_layer;

/// Generic adapter built from a [`ScraperConfig`].
pub struct ConfigurableScraper {
    source: String,
    config: ScraperConfig,
    entry_selector: Selector,
    text_selector: Selector,
    drop_selectors: Vec<Selector>,
    id_pattern: Option<Regex>,
    ctx: ScraperContext,
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Config(format!("invalid selector {:?}: {}", selector, e)))
}

impl ConfigurableScraper {
    /// Create a scraper, validating its selectors, pattern and jurisdiction.
    pub fn new(
        source: &str,
        config: ScraperConfig,
        ctx: ScraperContext,
    ) -> Result<Self, ScrapeError> {
        if config.doc_type.is_legislation() && abbreviate(&config.jurisdiction).is_none() {
            return Err(ScrapeError::Config(format!(
                "{}: unknown jurisdiction {}",
                source, config.jurisdiction
            )));
        }
        if config.index.urls.is_empty() {
            return Err(ScrapeError::Config(format!("{}: no index urls", source)));
        }

        let id_pattern = config
            .index
            .id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ScrapeError::Config(format!("{}: invalid id_pattern: {}", source, e)))?;

        Ok(Self {
            source: source.to_string(),
            entry_selector: parse_selector(&config.index.entry_selector)?,
            text_selector: parse_selector(&config.document.text_selector)?,
            drop_selectors: config
                .document
                .drop_selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_, _>>()?,
            id_pattern,
            config,
            ctx,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn index_request(&self, url: String) -> Request {
        let request = if is_local(&url) {
            Request::open(url)
        } else {
            Request::get(url)
        };
        if self.config.index.render {
            request.rendered()
        } else {
            request
        }
    }

    fn document_request(&self, url: &Url) -> Request {
        let request = match url.to_file_path() {
            Ok(path) if url.scheme() == "file" => Request::open(path.to_string_lossy()),
            _ => Request::get(url.as_str()),
        };
        if self.config.document.render {
            request.rendered()
        } else {
            request
        }
    }

    fn base_url(request: &Request, response: &Response) -> Option<Url> {
        if request.method() == Method::Open {
            let path = std::path::absolute(request.path()).ok()?;
            Url::from_file_path(path).ok()
        } else {
            Url::parse(response.url()).ok()
        }
    }

    fn version_id(&self, url: &Url) -> Option<String> {
        match &self.id_pattern {
            Some(pattern) => pattern
                .captures(url.as_str())
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
            None => {
                let path = url.path().trim_matches('/');
                (!path.is_empty()).then(|| path.to_string())
            }
        }
    }

    fn parse_index(
        &self,
        request: &Request,
        response: &Response,
    ) -> Result<HashSet<Entry>, ScrapeError> {
        let base = Self::base_url(request, response).ok_or_else(|| ScrapeError::Parse {
            url: response.url().to_string(),
            message: "index location is not a valid URL".to_string(),
        })?;

        let html = response.html()?;
        let mut entries = HashSet::new();

        for link in html.select(&self.entry_selector) {
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let url = match base.join(href) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Skipping unresolvable link {}: {}", href, e);
                    continue;
                }
            };
            let Some(id) = self.version_id(&url) else {
                debug!("Skipping link without a version id: {}", url);
                continue;
            };

            let title = link.text().collect::<Vec<_>>().join(" ");
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

            let mut entry = Entry::new(
                self.document_request(&url),
                &id,
                &self.source,
                self.config.doc_type,
                &self.config.jurisdiction,
            );
            if !title.is_empty() {
                entry = entry.with_title(title);
            }
            entries.insert(entry);
        }

        Ok(entries)
    }

    fn extract_html(&self, response: &Response) -> Result<String, ScrapeError> {
        let html = response.html()?;
        let element = html
            .select(&self.text_selector)
            .next()
            .ok_or_else(|| ScrapeError::MissingElement {
                url: response.url().to_string(),
                selector: self.config.document.text_selector.clone(),
            })?;
        Ok(html_to_text(element, &self.drop_selectors))
    }

    async fn extract_pdf(&self, response: &Response) -> Result<String, ScrapeError> {
        if self.config.document.pdf == PdfMode::Native {
            let text = self.ctx.ocr.pdf_text_layer(response.bytes()).await?;
            if !is_sparse_text_layer(&text) {
                return Ok(text.replace('\x0c', "\n"));
            }
            debug!("Text layer of {} is sparse; running OCR", response.url());
        }
        Ok(self.ctx.ocr.pdf_to_text(response.bytes()).await?)
    }

    fn extract_docx(response: &Response) -> Result<String, ScrapeError> {
        docx_to_text(response.bytes()).map_err(|message| ScrapeError::Parse {
            url: response.url().to_string(),
            message,
        })
    }
}

fn is_local(url: &str) -> bool {
    !(url.starts_with("http://") || url.starts_with("https://"))
}

fn expand_pages(url: &str, pages: Option<crate::scrapers::PageRange>) -> Vec<String> {
    match pages {
        Some(range) if url.contains("{page}") => (range.first..=range.last)
            .map(|page| url.replace("{page}", &page.to_string()))
            .collect(),
        _ => vec![url.to_string()],
    }
}

#[async_trait]
impl Scraper for ConfigurableScraper {
    fn source(&self) -> &str {
        &self.source
    }

    async fn get_index_reqs(&self) -> Result<HashSet<Request>, ScrapeError> {
        Ok(self
            .config
            .index
            .urls
            .iter()
            .flat_map(|url| expand_pages(url, self.config.index.pages))
            .map(|url| self.index_request(url))
            .collect())
    }

    async fn get_index(&self, request: &Request) -> Result<HashSet<Entry>, ScrapeError> {
        let response = self.ctx.client.fetch(request).await?;
        if !response.is_success() {
            return Err(ScrapeError::Status {
                url: response.url().to_string(),
                status: response.status(),
            });
        }
        self.parse_index(request, &response)
    }

    async fn get_doc(&self, entry: &Entry) -> Result<Option<Scraped>, ScrapeError> {
        let response = self.ctx.client.fetch(entry.request()).await?;

        if self
            .config
            .document
            .missing_statuses
            .contains(&response.status())
        {
            debug!(
                status = response.status(),
                "Document {} is missing",
                entry.version_id()
            );
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ScrapeError::Status {
                url: response.url().to_string(),
                status: response.status(),
            });
        }

        let mime = response.content_type().unwrap_or_default().to_string();
        let text = match mime.as_str() {
            "text/html" | "application/xhtml+xml" => self.extract_html(&response)?,
            "application/pdf" => self.extract_pdf(&response).await?,
            DOCX => Self::extract_docx(&response)?,
            "application/rtf" | "text/rtf" => rtf_to_text(response.bytes()),
            "text/plain" => response.text()?.to_string(),
            _ => {
                return Err(ScrapeError::UnsupportedContentType {
                    url: response.url().to_string(),
                    content_type: if mime.is_empty() {
                        "unknown".to_string()
                    } else {
                        mime
                    },
                })
            }
        };

        let draft = DocumentDraft::from_entry(entry, mime, response.url(), text);
        Ok(make_doc(draft)?.map(Scraped::Document))
    }
}
