//! Data models for the corpus creator.

mod document;
mod entry;
mod request;
mod response;

pub use document::{Document, DocumentType, Scraped, Section};
pub use entry::Entry;
pub use request::{Method, Request};
pub use response::{Response, UnknownEncoding};
