//! Failure logging with call context.

use std::fmt::{Debug, Display};
use std::future::Future;

use tracing::warn;

/// Await `fut`, logging a failure with the operation name and its
/// arguments before handing the error back to the caller.
pub async fn logged<T, E, A, F>(operation: &str, args: &A, fut: F) -> Result<T, E>
where
    A: Debug + ?Sized,
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let result = fut.await;
    if let Err(ref error) = result {
        warn!(operation, args = ?args, error = %error, "{} failed", operation);
    }
    result
}

/// Synchronous counterpart of [`logged`].
pub fn logged_sync<T, E, A, F>(operation: &str, args: &A, f: F) -> Result<T, E>
where
    A: Debug + ?Sized,
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let result = f();
    if let Err(ref error) = result {
        warn!(operation, args = ?args, error = %error, "{} failed", operation);
    }
    result
}
