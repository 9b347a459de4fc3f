//! Response model with lazily computed views over an immutable body.

use std::fmt;
use std::io::Cursor;
use std::sync::OnceLock;

use encoding_rs::Encoding;
use scraper::Html;
use thiserror::Error;

/// The request named an encoding with no known decoder.
#[derive(Debug, Error)]
#[error("Unknown encoding {0:?}")]
pub struct UnknownEncoding(pub String);

/// A completed fetch.
///
/// The body never changes after construction. Decoded text and parsed JSON
/// are computed on first use and kept on the instance, so a response shared
/// between several callers is only decoded once.
pub struct Response {
    url: String,
    status: u16,
    content_type: Option<String>,
    encoding: String,
    body: Vec<u8>,
    text: OnceLock<String>,
    json: OnceLock<serde_json::Value>,
}

impl Response {
    /// Build a response.
    ///
    /// `content_type` may be a raw header value; parameters are dropped and
    /// the MIME essence is lowercased. Without a header the type is sniffed
    /// from the body's magic bytes.
    pub fn new(
        url: impl Into<String>,
        status: u16,
        content_type: Option<&str>,
        encoding: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        let content_type = content_type
            .and_then(mime_essence)
            .or_else(|| infer::get(&body).map(|kind| kind.mime_type().to_string()));

        Self {
            url: url.into(),
            status,
            content_type,
            encoding: encoding.into(),
            body,
            text: OnceLock::new(),
            json: OnceLock::new(),
        }
    }

    /// The URL (or file path) the body was read from, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lowercased MIME essence, e.g. `text/html`.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Body decoded with the request's encoding. Malformed sequences become
    /// U+FFFD; an encoding label with no decoder is an error.
    pub fn text(&self) -> Result<&str, UnknownEncoding> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let text = decode(&self.body, &self.encoding)?;
        Ok(self.text.get_or_init(|| text))
    }

    /// Parsed HTML tree, built from the decoded text on each call.
    pub fn html(&self) -> Result<Html, UnknownEncoding> {
        Ok(Html::parse_document(self.text()?))
    }

    /// Parsed JSON. A parse failure is returned and not remembered.
    pub fn json(&self) -> Result<&serde_json::Value, serde_json::Error> {
        if let Some(value) = self.json.get() {
            return Ok(value);
        }
        let value: serde_json::Value = serde_json::from_slice(&self.body)?;
        Ok(self.json.get_or_init(|| value))
    }

    /// Readable byte stream over the body.
    pub fn stream(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.body)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("len", &self.body.len())
            .finish()
    }
}

fn mime_essence(header: &str) -> Option<String> {
    let essence = header.split(';').next()?.trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

/// Look up a decoder by WHATWG label, also accepting spellings such as
/// `latin-1` or `utf_8`.
fn encoding_for(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.as_bytes()).or_else(|| {
        let compact: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        Encoding::for_label(compact.as_bytes())
    })
}

fn decode(body: &[u8], label: &str) -> Result<String, UnknownEncoding> {
    let encoding = encoding_for(label).ok_or_else(|| UnknownEncoding(label.to_string()))?;
    let (text, _) = encoding.decode_with_bom_removal(body);
    Ok(text.into_owned())
}
