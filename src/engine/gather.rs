//! Concurrent fan-out that keeps input order.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;

/// Run every future concurrently, ticking `progress` as each completes,
/// and return the outputs in the order the futures were given.
pub async fn gather_ordered<I, F, T>(futures: I, progress: &ProgressBar) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(i, fut)| async move { (i, fut.await) })
        .collect();
    progress.set_length(pending.len() as u64);

    let mut results = Vec::with_capacity(pending.len());
    while let Some(result) = pending.next().await {
        progress.inc(1);
        results.push(result);
    }

    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, output)| output).collect()
}
