//! Persisted index state.
//!
//! Each source keeps `<data_dir>/indices/<source>.json` with the index
//! requests it last discovered and the entries each index page yielded,
//! stamped with when they were fetched. A later run reuses whatever is
//! younger than its refresh interval.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Entry, Request};
use crate::storage::StorageError;

/// How long indexed data stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshInterval {
    Always,
    Every(Duration),
}

impl RefreshInterval {
    /// `0` means always refresh.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Always
        } else {
            Self::Every(Duration::from_secs(secs))
        }
    }

    pub fn is_stale(&self, when: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Always => true,
            Self::Every(interval) => match chrono::Duration::from_std(*interval) {
                Ok(interval) => now.signed_duration_since(when) >= interval,
                Err(_) => false,
            },
        }
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::Every(Duration::from_secs(86_400))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRequests {
    requests: Vec<Request>,
    when_indexed: DateTime<Utc>,
}

/// Entries read from one index request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPage {
    pub request: Request,
    pub entries: Vec<Entry>,
    pub when_indexed: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexState {
    #[serde(default)]
    requests: Option<IndexRequests>,
    #[serde(default)]
    pages: Vec<IndexPage>,
}

/// Index state for one source.
#[derive(Debug)]
pub struct IndexStore {
    path: PathBuf,
    requests: Option<IndexRequests>,
    pages: HashMap<Request, IndexPage>,
}

impl IndexStore {
    /// Path of a source's state file.
    pub fn path_for(data_dir: &Path, source: &str) -> PathBuf {
        data_dir.join("indices").join(format!("{}.json", source))
    }

    /// Load a source's state. A missing file gives an empty store; an
    /// unreadable one is logged and ignored.
    pub async fn load(data_dir: &Path, source: &str) -> Result<Self, StorageError> {
        let path = Self::path_for(data_dir, source);

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<IndexState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Ignoring unreadable index state {}: {}", path.display(), e);
                    IndexState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexState::default(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        Ok(Self {
            path,
            requests: state.requests,
            pages: state
                .pages
                .into_iter()
                .map(|page| (page.request.clone(), page))
                .collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored index requests, if still fresh.
    pub fn requests(
        &self,
        interval: RefreshInterval,
        now: DateTime<Utc>,
    ) -> Option<HashSet<Request>> {
        self.requests
            .as_ref()
            .filter(|stored| !interval.is_stale(stored.when_indexed, now))
            .map(|stored| stored.requests.iter().cloned().collect())
    }

    pub fn set_requests(&mut self, requests: &HashSet<Request>, now: DateTime<Utc>) {
        let mut requests: Vec<Request> = requests.iter().cloned().collect();
        requests.sort();
        self.requests = Some(IndexRequests {
            requests,
            when_indexed: now,
        });
    }

    /// Stored entries for an index request, if still fresh.
    pub fn page(
        &self,
        request: &Request,
        interval: RefreshInterval,
        now: DateTime<Utc>,
    ) -> Option<HashSet<Entry>> {
        self.pages
            .get(request)
            .filter(|page| !interval.is_stale(page.when_indexed, now))
            .map(|page| page.entries.iter().cloned().collect())
    }

    pub fn set_page(&mut self, request: Request, entries: &HashSet<Entry>, now: DateTime<Utc>) {
        let mut entries: Vec<Entry> = entries.iter().cloned().collect();
        entries.sort_by(|a, b| a.version_id().cmp(b.version_id()));
        self.pages.insert(
            request.clone(),
            IndexPage {
                request,
                entries,
                when_indexed: now,
            },
        );
    }

    /// Drop pages for requests no longer in the index.
    pub fn retain_pages(&mut self, requests: &HashSet<Request>) {
        self.pages.retain(|request, _| requests.contains(request));
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Write the state, replacing the previous file atomically.
    pub async fn save(&self) -> Result<(), StorageError> {
        let mut pages: Vec<IndexPage> = self.pages.values().cloned().collect();
        pages.sort_by(|a, b| a.request.cmp(&b.request));
        let state = IndexState {
            requests: self.requests.clone(),
            pages,
        };
        let json = serde_json::to_vec_pretty(&state)?;

        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!("Saved index state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn entry(id: &str) -> Entry {
        Entry::new(
            Request::get(format!("https://example.com/{}", id)),
            id,
            "example",
            DocumentType::Decision,
            "commonwealth",
        )
    }

    #[test]
    fn test_refresh_interval() {
        let now = Utc::now();
        let hour_ago = now - chrono::Duration::hours(1);

        assert_eq!(RefreshInterval::from_secs(0), RefreshInterval::Always);
        assert!(RefreshInterval::Always.is_stale(now, now));
        assert!(!RefreshInterval::from_secs(86_400).is_stale(hour_ago, now));
        assert!(RefreshInterval::from_secs(60).is_stale(hour_ago, now));
    }

    #[tokio::test]
    async fn test_round_trip_and_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let index = Request::get("https://example.com/index");
        let requests: HashSet<Request> = [index.clone()].into_iter().collect();
        let entries: HashSet<Entry> = [entry("a"), entry("b")].into_iter().collect();

        let mut store = IndexStore::load(dir.path(), "example").await.unwrap();
        assert!(store.requests(RefreshInterval::default(), now).is_none());
        store.set_requests(&requests, now);
        store.set_page(index.clone(), &entries, now);
        store.save().await.unwrap();

        assert!(dir.path().join("indices/example.json").exists());

        let store = IndexStore::load(dir.path(), "example").await.unwrap();
        let later = now + chrono::Duration::hours(2);
        assert_eq!(
            store.requests(RefreshInterval::default(), later),
            Some(requests)
        );
        assert_eq!(
            store.page(&index, RefreshInterval::default(), later),
            Some(entries)
        );
        assert!(store
            .page(&index, RefreshInterval::from_secs(3600), later)
            .is_none());
        assert!(store.requests(RefreshInterval::Always, later).is_none());
    }

    #[tokio::test]
    async fn test_retain_pages() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let keep = Request::get("https://example.com/keep");
        let gone = Request::get("https://example.com/gone");

        let mut store = IndexStore::load(dir.path(), "example").await.unwrap();
        store.set_page(keep.clone(), &HashSet::new(), now);
        store.set_page(gone.clone(), &HashSet::new(), now);
        store.retain_pages(&[keep.clone()].into_iter().collect());

        assert_eq!(store.page_count(), 1);
        assert!(store.page(&gone, RefreshInterval::default(), now).is_none());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = IndexStore::path_for(dir.path(), "example");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = IndexStore::load(dir.path(), "example").await.unwrap();
        assert_eq!(store.page_count(), 0);
    }
}
