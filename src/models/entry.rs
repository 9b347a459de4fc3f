//! Index entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DocumentType, Request};

/// One document listed in an index, plus the request that fetches its body.
///
/// The version id is always namespaced by its source (`source:raw-id`).
/// The prefix is applied when an entry is built and again when one is
/// deserialized, so an entry read back from disk cannot lose it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "EntryRepr")]
pub struct Entry {
    request: Request,
    version_id: String,
    source: String,
    #[serde(rename = "type")]
    doc_type: DocumentType,
    jurisdiction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    other: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct EntryRepr {
    request: Request,
    version_id: String,
    source: String,
    #[serde(rename = "type")]
    doc_type: DocumentType,
    jurisdiction: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    other: BTreeMap<String, String>,
}

impl From<EntryRepr> for Entry {
    fn from(repr: EntryRepr) -> Self {
        Self {
            version_id: Entry::format_id(&repr.version_id, &repr.source),
            request: repr.request,
            source: repr.source,
            doc_type: repr.doc_type,
            jurisdiction: repr.jurisdiction,
            date: repr.date,
            title: repr.title,
            other: repr.other,
        }
    }
}

impl Entry {
    pub fn new(
        request: Request,
        version_id: &str,
        source: &str,
        doc_type: DocumentType,
        jurisdiction: &str,
    ) -> Self {
        Self {
            request,
            version_id: Self::format_id(version_id, source),
            source: source.to_string(),
            doc_type,
            jurisdiction: jurisdiction.to_string(),
            date: None,
            title: None,
            other: BTreeMap::new(),
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach an extra metadata value.
    pub fn with_other(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.other.insert(key.into(), value.into());
        self
    }

    /// Prefix `id` with `source:` unless it already carries that prefix.
    pub fn format_id(id: &str, source: &str) -> String {
        match id.strip_prefix(source) {
            Some(rest) if rest.starts_with(':') => id.to_string(),
            _ => format!("{}:{}", source, id),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn other(&self) -> &BTreeMap<String, String> {
        &self.other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id_prefixes() {
        assert_eq!(
            Entry::format_id("abc123", "queensland_caselaw"),
            "queensland_caselaw:abc123"
        );
    }

    #[test]
    fn test_format_id_is_idempotent() {
        let once = Entry::format_id("abc123", "queensland_caselaw");
        assert_eq!(Entry::format_id(&once, "queensland_caselaw"), once);
    }

    #[test]
    fn test_format_id_requires_colon_after_source() {
        // A raw id that merely starts with the source name is still prefixed.
        assert_eq!(
            Entry::format_id("nsw_legislation2020", "nsw_legislation"),
            "nsw_legislation:nsw_legislation2020"
        );
    }

    #[test]
    fn test_new_applies_prefix() {
        let entry = Entry::new(
            Request::get("https://example.com/doc/1"),
            "1",
            "example",
            DocumentType::Decision,
            "commonwealth",
        );
        assert_eq!(entry.version_id(), "example:1");
    }

    #[test]
    fn test_deserialize_applies_prefix() {
        let json = r#"{
            "request": {"path": "https://example.com/doc/1"},
            "version_id": "1",
            "source": "example",
            "type": "bill",
            "jurisdiction": "victoria",
            "title": "A Bill"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.version_id(), "example:1");
        assert_eq!(entry.doc_type(), DocumentType::Bill);
        assert_eq!(entry.title(), Some("A Bill"));
    }

    #[test]
    fn test_serde_keeps_prefixed_id() {
        let entry = Entry::new(
            Request::get("https://example.com/doc/1"),
            "example:1",
            "example",
            DocumentType::PrimaryLegislation,
            "tasmania",
        )
        .with_date("2024-03-12")
        .with_other("court", "TASSC");

        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
