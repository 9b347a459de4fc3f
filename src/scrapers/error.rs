//! Errors raised while fetching and extracting documents.

use thiserror::Error;

use crate::models::UnknownEncoding;
use crate::normalize::NormalizeError;
use crate::ocr::OcrError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Browser render of {url} failed: {message}")]
    Render { url: String, message: String },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("{url} has unsupported content type {content_type}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("{url} has no element matching {selector}")]
    MissingElement { url: String, selector: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Encoding(#[from] UnknownEncoding),

    #[error("Corpus write failed: {0}")]
    Storage(#[from] StorageError),
}

impl ScrapeError {
    /// Errors that would make every other entry from the same source fail
    /// the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Normalize(NormalizeError::UnknownJurisdiction(_))
                | Self::UnsupportedContentType { .. }
                | Self::MissingElement { .. }
                | Self::Config(_)
                | Self::Encoding(_)
                | Self::Storage(_)
        )
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Statuses a server may answer differently on a later attempt.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ScrapeError::Config("bad selector".into()).is_fatal());
        assert!(ScrapeError::Normalize(NormalizeError::UnknownJurisdiction("x".into())).is_fatal());
        assert!(ScrapeError::MissingElement {
            url: "u".into(),
            selector: "#body".into()
        }
        .is_fatal());
        assert!(!ScrapeError::Normalize(NormalizeError::InvalidDate("x".into())).is_fatal());
        assert!(!ScrapeError::Status {
            url: "u".into(),
            status: 500
        }
        .is_fatal());
        assert!(ScrapeError::from(UnknownEncoding("klingon".into())).is_fatal());
    }

    #[test]
    fn test_retryable_statuses() {
        let status = |status| ScrapeError::Status {
            url: "u".into(),
            status,
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!ScrapeError::Config("x".into()).is_retryable());
    }
}
