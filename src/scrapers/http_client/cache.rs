//! Per-run response cache with in-flight deduplication.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;

use crate::models::{Request, Response};
use crate::scrapers::ScrapeError;

type Slot = Arc<OnceCell<Arc<Response>>>;

/// Responses keyed by request.
///
/// The first caller for a request runs the fetch; concurrent callers for the
/// same request wait on it and share its result. A failed fetch leaves the
/// slot empty so a later caller tries again.
#[derive(Clone, Default)]
pub struct RequestCache {
    slots: Arc<Mutex<HashMap<Request, Slot>>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Request, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        request: &Request,
        fetch: F,
    ) -> Result<Arc<Response>, ScrapeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, ScrapeError>>,
    {
        let slot = Arc::clone(self.slots().entry(request.clone()).or_default());
        let response = slot
            .get_or_try_init(|| async { fetch().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(response))
    }

    /// Drop a cached response so its body can be freed.
    pub fn forget(&self, request: &Request) {
        self.slots().remove(request);
    }

    /// Whether a completed response is held for `request`.
    pub fn contains(&self, request: &Request) -> bool {
        self.slots()
            .get(request)
            .is_some_and(|slot| slot.initialized())
    }

    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok_response() -> Response {
        Response::new("x", 200, Some("text/plain"), "utf-8", b"body".to_vec())
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_fetch_once() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let request = Request::get("https://example.com/a");
        let same = request.clone();

        let fetch = || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(ok_response())
            }
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(&request, fetch),
            cache.get_or_fetch(&request, fetch),
            cache.get_or_fetch(&same, fetch),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert!(c.is_ok());
        assert!(cache.contains(&request));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = RequestCache::new();
        let request = Request::get("https://example.com/a");

        let failed = cache
            .get_or_fetch(&request, || async {
                Err(ScrapeError::Status {
                    url: "https://example.com/a".into(),
                    status: 500,
                })
            })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains(&request));

        let retried = cache
            .get_or_fetch(&request, || async { Ok(ok_response()) })
            .await;
        assert!(retried.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_forget_evicts() {
        let cache = RequestCache::new();
        let request = Request::get("https://example.com/a");
        cache
            .get_or_fetch(&request, || async { Ok(ok_response()) })
            .await
            .unwrap();
        cache.forget(&request);
        assert!(cache.is_empty());
    }
}
