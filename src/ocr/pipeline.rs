//! Async OCR pipeline over the blocking pool.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::debug;

use super::tesseract;
use super::{OcrConfig, OcrError};

static PARAGRAPH_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}[^\S\n]*$").unwrap());

/// Minimum average alphabetic characters per page for a PDF text layer to be
/// trusted over OCR.
pub const MIN_CHARS_PER_PAGE: usize = 9;

/// PDF-to-text conversion bounded by its own worker semaphore.
#[derive(Clone)]
pub struct OcrPipeline {
    config: Arc<OcrConfig>,
    semaphore: Arc<Semaphore>,
}

impl OcrPipeline {
    pub fn new(config: OcrConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
        Self::with_semaphore(config, semaphore)
    }

    /// Share an existing semaphore, e.g. across several pipelines.
    pub fn with_semaphore(config: OcrConfig, semaphore: Arc<Semaphore>) -> Self {
        Self {
            config: Arc::new(config),
            semaphore,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn batch_size(&self) -> usize {
        self.config
            .batch_size
            .unwrap_or(self.config.workers)
            .max(1)
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, OcrError>
    where
        F: FnOnce() -> Result<T, OcrError> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| OcrError::PoolClosed)?;
        tokio::task::spawn_blocking(job).await?
    }

    async fn write_pdf(work_dir: &Path, pdf: &[u8]) -> Result<std::path::PathBuf, OcrError> {
        let path = work_dir.join("document.pdf");
        tokio::fs::write(&path, pdf).await?;
        Ok(path)
    }

    /// OCR every page of a PDF, in page order.
    ///
    /// Any page failing fails the whole document.
    pub async fn pdf_to_text(&self, pdf: &[u8]) -> Result<String, OcrError> {
        let work_dir = TempDir::new()?;
        let pdf_path = Self::write_pdf(work_dir.path(), pdf).await?;

        let pages = {
            let path = pdf_path.clone();
            self.run_blocking(move || tesseract::page_count(&path))
                .await?
        };
        debug!(pages, batch_size = self.batch_size(), "Running OCR on PDF");

        let page_numbers: Vec<u32> = (1..=pages).collect();
        let mut texts = Vec::with_capacity(page_numbers.len());

        for batch in page_numbers.chunks(self.batch_size()) {
            let jobs = batch.iter().map(|&page| {
                let pdf_path = pdf_path.clone();
                let dir = work_dir.path().to_path_buf();
                let config = Arc::clone(&self.config);
                self.run_blocking(move || {
                    tesseract::ocr_page(&pdf_path, page, config.dpi, &config.language, &dir)
                })
            });
            texts.extend(futures::future::try_join_all(jobs).await?);
        }

        Ok(strip_paragraph_numbers(&texts.join("\n")))
    }

    /// Extract a PDF's embedded text layer. Pages are separated by form feeds.
    pub async fn pdf_text_layer(&self, pdf: &[u8]) -> Result<String, OcrError> {
        let work_dir = TempDir::new()?;
        let pdf_path = Self::write_pdf(work_dir.path(), pdf).await?;
        self.run_blocking(move || tesseract::text_layer(&pdf_path))
            .await
    }
}

/// Whether a text layer from [`OcrPipeline::pdf_text_layer`] is too sparse to
/// trust, averaging fewer than [`MIN_CHARS_PER_PAGE`] letters per page.
pub fn is_sparse_text_layer(text: &str) -> bool {
    let pages = text.matches('\x0c').count().max(1);
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    letters / pages < MIN_CHARS_PER_PAGE
}

/// Drop lines that hold nothing but a paragraph number of up to four digits.
pub fn strip_paragraph_numbers(text: &str) -> String {
    text.split('\n')
        .filter(|line| !PARAGRAPH_NUMBER.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}
