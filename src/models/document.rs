//! Document and section models.
//!
//! Neither type has a public constructor. Both are built by
//! [`crate::normalize::make_doc`] and [`crate::normalize::make_section`], so
//! every value in the corpus has gone through the same citation formatting,
//! text cleaning and emptiness check.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of legal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PrimaryLegislation,
    SecondaryLegislation,
    Bill,
    Decision,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryLegislation => "primary_legislation",
            Self::SecondaryLegislation => "secondary_legislation",
            Self::Bill => "bill",
            Self::Decision => "decision",
        }
    }

    pub fn is_legislation(&self) -> bool {
        !matches!(self, Self::Decision)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub(crate) version_id: String,
    #[serde(rename = "type")]
    pub(crate) doc_type: DocumentType,
    pub(crate) jurisdiction: String,
    pub(crate) source: String,
    pub(crate) mime: String,
    pub(crate) date: Option<String>,
    pub(crate) citation: String,
    pub(crate) url: String,
    pub(crate) when_scraped: String,
    pub(crate) text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) other: BTreeMap<String, String>,
}

impl Document {
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn citation(&self) -> &str {
        &self.citation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// RFC 3339 timestamp in local time.
    pub fn when_scraped(&self) -> &str {
        &self.when_scraped
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn other(&self) -> &BTreeMap<String, String> {
        &self.other
    }
}

/// A section of a larger document, keyed as `document_id/citation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub(crate) id: String,
    pub(crate) document_id: String,
    #[serde(rename = "type")]
    pub(crate) doc_type: DocumentType,
    pub(crate) jurisdiction: String,
    pub(crate) source: String,
    pub(crate) mime: String,
    pub(crate) date: Option<String>,
    pub(crate) number: String,
    pub(crate) title: String,
    pub(crate) citation: String,
    pub(crate) url: String,
    pub(crate) when_scraped: String,
    pub(crate) text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) other: BTreeMap<String, String>,
}

impl Section {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version id of the document this section belongs to.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn version_id(&self) -> &str {
        &self.document_id
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn citation(&self) -> &str {
        &self.citation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn when_scraped(&self) -> &str {
        &self.when_scraped
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn other(&self) -> &BTreeMap<String, String> {
        &self.other
    }
}

/// What an adapter produced for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scraped {
    Document(Document),
    Sections(Vec<Section>),
}

impl Scraped {
    /// Version id of the underlying document, if there is anything to store.
    pub fn version_id(&self) -> Option<&str> {
        match self {
            Self::Document(doc) => Some(doc.version_id()),
            Self::Sections(sections) => sections.first().map(Section::version_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Sections(sections) if sections.is_empty())
    }
}

impl From<Document> for Scraped {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<Vec<Section>> for Scraped {
    fn from(sections: Vec<Section>) -> Self {
        Self::Sections(sections)
    }
}
