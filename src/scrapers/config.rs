//! Scraper configuration types.
//!
//! These structs define the declarative behaviour of a
//! [`ConfigurableScraper`](super::ConfigurableScraper): where its indices
//! are, how links to documents are found on them and how each document's
//! text is extracted.

use serde::{Deserialize, Serialize};

use crate::models::DocumentType;

/// Scraper configuration from a `[scrapers.<source>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Human-readable name (defaults to the source id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub doc_type: DocumentType,
    /// Jurisdiction key, e.g. `new_south_wales`.
    pub jurisdiction: String,
    pub index: IndexConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

impl ScraperConfig {
    /// Get the effective name, using the provided default if not set.
    pub fn name_or(&self, default: &str) -> String {
        self.name.clone().unwrap_or_else(|| default.to_string())
    }
}

/// Where the indices are and how entries are read from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index URLs. A `{page}` placeholder is expanded over `pages`.
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageRange>,
    /// Fetch indices through the headless browser.
    #[serde(default)]
    pub render: bool,
    /// CSS selector for links to documents.
    pub entry_selector: String,
    /// Regex applied to each resolved link URL; its first capture group is
    /// the raw version id. Without it the URL path is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_pattern: Option<String>,
}

/// Inclusive page range for paginated indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

/// How document bodies are turned into text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// CSS selector for the element holding the document text.
    #[serde(default = "default_text_selector")]
    pub text_selector: String,
    /// Elements removed from the text element before rendering.
    #[serde(default)]
    pub drop_selectors: Vec<String>,
    /// Fetch documents through the headless browser.
    #[serde(default)]
    pub render: bool,
    #[serde(default)]
    pub pdf: PdfMode,
    /// Statuses that mean the document is gone and should be skipped.
    #[serde(default = "default_missing_statuses")]
    pub missing_statuses: Vec<u16>,
}

fn default_text_selector() -> String {
    "body".to_string()
}

fn default_missing_statuses() -> Vec<u16> {
    vec![404]
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            text_selector: default_text_selector(),
            drop_selectors: Vec::new(),
            render: false,
            pdf: PdfMode::default(),
            missing_statuses: default_missing_statuses(),
        }
    }
}

/// Text extraction strategy for PDFs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfMode {
    /// Always OCR.
    #[default]
    Ocr,
    /// Use the embedded text layer, falling back to OCR when it is sparse.
    Native,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let config: ScraperConfig = toml::from_str(
            r#"
            doc_type = "decision"
            jurisdiction = "queensland"

            [index]
            urls = ["https://example.com/judgments?page={page}"]
            pages = { first = 1, last = 3 }
            entry_selector = "a.judgment"
            "#,
        )
        .unwrap();

        assert_eq!(config.doc_type, DocumentType::Decision);
        assert_eq!(config.index.pages, Some(PageRange { first: 1, last: 3 }));
        assert_eq!(config.document.text_selector, "body");
        assert_eq!(config.document.missing_statuses, vec![404]);
        assert_eq!(config.document.pdf, PdfMode::Ocr);
        assert_eq!(config.name_or("qld"), "qld");
    }

    #[test]
    fn test_document_table() {
        let config: ScraperConfig = toml::from_str(
            r##"
            doc_type = "primary_legislation"
            jurisdiction = "tasmania"

            [index]
            urls = ["https://example.com/acts"]
            entry_selector = "a"
            id_pattern = "/act/(\\d+)"

            [document]
            text_selector = "#content"
            drop_selectors = [".toolbar"]
            pdf = "native"
            missing_statuses = [404, 410]
            "##,
        )
        .unwrap();

        assert_eq!(config.document.pdf, PdfMode::Native);
        assert_eq!(config.document.missing_statuses, vec![404, 410]);
        assert_eq!(config.index.id_pattern.as_deref(), Some("/act/(\\d+)"));
    }
}
