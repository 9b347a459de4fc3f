//! OCR and PDF text extraction.
//!
//! PDFs are split into pages, rendered with `pdftoppm` and recognised with
//! Tesseract. Pages run on the blocking thread pool; a semaphore sized to the
//! configured worker count bounds how many run at once, independently of the
//! network pool.

mod pipeline;
mod tesseract;

pub use pipeline::{is_sparse_text_layer, strip_paragraph_numbers, OcrPipeline, MIN_CHARS_PER_PAGE};
pub use tesseract::check_binary;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External tools the pipeline shells out to.
pub const TOOLS: &[(&str, &str)] = &[
    ("pdfinfo", "poppler-utils"),
    ("pdftoppm", "poppler-utils"),
    ("pdftotext", "poppler-utils"),
    ("tesseract", "tesseract-ocr"),
];

/// Errors that can occur during OCR.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("External tool not found: {0}")]
    ToolNotFound(&'static str),

    #[error("{tool} failed: {message}")]
    Failed {
        tool: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("OCR worker pool closed")]
    PoolClosed,
}

/// OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Pages recognised at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pages rendered per batch (defaults to `workers`).
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Render resolution.
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Tesseract language code.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn default_dpi() -> u32 {
    300
}

fn default_language() -> String {
    "eng".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: None,
            dpi: default_dpi(),
            language: default_language(),
        }
    }
}

/// Report which external tools are installed.
pub fn check_tools() -> Vec<(&'static str, &'static str, bool)> {
    TOOLS
        .iter()
        .map(|&(tool, package)| (tool, package, check_binary(tool)))
        .collect()
}
