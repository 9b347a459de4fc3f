//! Request model.
//!
//! A `Request` fully describes one fetch. Two requests with the same fields
//! are the same request: they compare and hash equal regardless of the order
//! in which form data or headers were added, which lets the fetch layer
//! collapse them into a single network operation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a request is executed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
    Head,
    /// Read a local file instead of going over the network.
    Open,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
            Self::Open => "OPEN",
        }
    }
}

/// An immutable fetch description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Request {
    path: String,
    #[serde(default)]
    method: Method,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_encoding")]
    encoding: String,
    #[serde(default)]
    render: bool,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            data: BTreeMap::new(),
            headers: BTreeMap::new(),
            encoding: default_encoding(),
            render: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    /// A request that reads a file from disk.
    pub fn open(path: impl Into<String>) -> Self {
        Self::new(Method::Open, path)
    }

    /// Add a form field sent with the request body.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the text encoding used to decode the response body.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Fetch through a headless browser so scripts run before the page is read.
    pub fn rendered(mut self) -> Self {
        self.render = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn render(&self) -> bool {
        self.render
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)?;
        if self.render {
            write!(f, " (rendered)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    fn hash_of(request: &Request) -> u64 {
        let mut hasher = DefaultHasher::new();
        request.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = Request::post("https://example.com/search")
            .with_data("page", "1")
            .with_data("q", "act")
            .with_header("Accept", "text/html")
            .with_header("Referer", "https://example.com");
        let b = Request::post("https://example.com/search")
            .with_header("Referer", "https://example.com")
            .with_data("q", "act")
            .with_header("Accept", "text/html")
            .with_data("page", "1");

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_set_membership_collapses_duplicates() {
        let mut set = HashSet::new();
        set.insert(Request::get("https://example.com/a"));
        set.insert(Request::get("https://example.com/a"));
        set.insert(Request::get("https://example.com/a").rendered());
        set.insert(Request::post("https://example.com/a"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_defaults() {
        let request = Request::get("https://example.com");
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.encoding(), "utf-8");
        assert!(!request.render());
        assert!(request.data().is_empty());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let request: Request = serde_json::from_str(r#"{"path":"https://example.com"}"#).unwrap();
        assert_eq!(request, Request::get("https://example.com"));
    }

    #[test]
    fn test_serialized_method_is_lowercase() {
        let json = serde_json::to_string(&Request::open("/tmp/a.html")).unwrap();
        assert!(json.contains(r#""method":"open""#));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Request::get("https://example.com").rendered().to_string(),
            "GET https://example.com (rendered)"
        );
    }
}
