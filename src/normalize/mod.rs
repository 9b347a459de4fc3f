//! Text and citation normalization.
//!
//! Every document and section stored in the corpus is produced here. Adapters
//! hand over a draft with raw extracted text and an unformatted title; the
//! normalizer formats the citation, cleans the text and rejects drafts whose
//! text is too short to be a real document.

mod citation;
mod date;

pub use citation::{abbreviate, format_citation, JURISDICTIONS};
pub use date::format_date;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::models::{Document, DocumentType, Entry, Section};

/// Drafts with fewer alphabetic characters than this are treated as failed
/// extractions.
pub const MIN_ALPHABETIC_CHARS: usize = 9;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Unable to find an abbreviated form of jurisdiction: {0}")]
    UnknownJurisdiction(String),

    #[error("Unrecognised date: {0}")]
    InvalidDate(String),
}

/// Raw material for a [`Document`].
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub version_id: String,
    pub doc_type: DocumentType,
    pub jurisdiction: String,
    pub source: String,
    pub mime: String,
    pub date: Option<String>,
    /// Title to be formatted into the citation.
    pub citation: String,
    pub url: String,
    pub text: String,
    pub other: BTreeMap<String, String>,
}

impl DocumentDraft {
    /// Start a draft from the entry it was fetched for.
    ///
    /// The entry's title becomes the citation; entries without a title fall
    /// back to their version id.
    pub fn from_entry(
        entry: &Entry,
        mime: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            version_id: entry.version_id().to_string(),
            doc_type: entry.doc_type(),
            jurisdiction: entry.jurisdiction().to_string(),
            source: entry.source().to_string(),
            mime: mime.into(),
            date: entry.date().map(str::to_string),
            citation: entry
                .title()
                .unwrap_or_else(|| entry.version_id())
                .to_string(),
            url: url.into(),
            text: text.into(),
            other: entry.other().clone(),
        }
    }
}

/// Raw material for a [`Section`].
#[derive(Debug, Clone)]
pub struct SectionDraft {
    /// Version id of the parent document.
    pub version_id: String,
    pub doc_type: DocumentType,
    pub jurisdiction: String,
    pub source: String,
    pub mime: String,
    pub date: Option<String>,
    pub number: String,
    pub title: String,
    pub citation: String,
    pub url: String,
    pub text: String,
    pub other: BTreeMap<String, String>,
}

/// Clean extracted text.
///
/// Non-breaking spaces become spaces, line endings become `\n`, lines that
/// hold only whitespace become empty, trailing spaces and tabs are removed
/// from each line and leading and trailing blank lines are dropped. The
/// result is a fixed point: cleaning it again changes nothing.
pub fn clean_text(text: &str) -> String {
    let text = text
        .replace('\u{a0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.trim_end_matches([' ', '\t'])
            }
        })
        .collect();

    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

fn alphabetic_chars(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

fn too_short(text: &str, url: &str) -> bool {
    if alphabetic_chars(text) < MIN_ALPHABETIC_CHARS {
        warn!(
            url,
            text,
            "Extracted text has fewer than {} alphabetic characters; skipping",
            MIN_ALPHABETIC_CHARS
        );
        true
    } else {
        false
    }
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Build a document, or `None` when the cleaned text is too short.
pub fn make_doc(draft: DocumentDraft) -> Result<Option<Document>, NormalizeError> {
    let citation = format_citation(&draft.citation, draft.doc_type, &draft.jurisdiction)?;
    let text = clean_text(&draft.text);

    if too_short(&text, &draft.url) {
        return Ok(None);
    }

    Ok(Some(Document {
        version_id: draft.version_id,
        doc_type: draft.doc_type,
        jurisdiction: draft.jurisdiction,
        source: draft.source,
        mime: draft.mime,
        date: draft.date,
        citation,
        url: draft.url,
        when_scraped: now(),
        text,
        other: draft.other,
    }))
}

/// Build a section, or `None` when the cleaned text is too short.
pub fn make_section(draft: SectionDraft) -> Result<Option<Section>, NormalizeError> {
    let citation = format_citation(&draft.citation, draft.doc_type, &draft.jurisdiction)?;
    let text = clean_text(&draft.text);

    if too_short(&text, &draft.url) {
        return Ok(None);
    }

    Ok(Some(Section {
        id: format!("{}/{}", draft.version_id, citation),
        document_id: draft.version_id,
        doc_type: draft.doc_type,
        jurisdiction: draft.jurisdiction,
        source: draft.source,
        mime: draft.mime,
        date: draft.date,
        number: draft.number,
        title: draft.title,
        citation,
        url: draft.url,
        when_scraped: now(),
        text,
        other: draft.other,
    }))
}
