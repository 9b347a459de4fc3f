//! Open Australian Legal Corpus creator.
//!
//! Harvests legislation, bills and court decisions from public legal
//! sources into a JSONL corpus. Sources are [`scrapers::Scraper`]
//! adapters driven by the [`engine::Engine`], which bounds network
//! concurrency, reuses responses and index state, and writes normalized
//! documents through [`storage::CorpusWriter`].

pub mod config;
pub mod engine;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod scrapers;
pub mod storage;
