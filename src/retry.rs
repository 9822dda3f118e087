//! Retry policy for fallible storage operations
//!
//! A pure classifier decides whether a failure is transient infrastructure
//! trouble, and an executor re-runs the operation on a fixed, bounded
//! schedule. Validation and not-found errors are never retried; re-attempting
//! cannot change their outcome.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use tokio::time;
use tracing::warn;

use crate::storage::{StorageError, StorageResult};

/// Fixed backoff schedule: three attempts, waiting 1s, 3s and 5s after each
/// failed one. No jitter, no exponential growth; worst case adds ~9s of
/// latency to a call.
pub const RETRY_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Classify an error as retriable or not.
///
/// Connection-level database errors and timeouts are retriable, as are the
/// I/O conditions that signal a flaky link (would-block, timed-out,
/// unexpected EOF, dropped connections). Everything else — validation,
/// not-found, bad SQL — is permanent.
pub fn is_retriable(err: &StorageError) -> bool {
    match err {
        StorageError::Connection(_) | StorageError::Timeout(_) => true,
        StorageError::Io(io_err) => matches!(
            io_err.kind(),
            ErrorKind::WouldBlock
                | ErrorKind::TimedOut
                | ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Execute `op`, retrying retriable failures per [`RETRY_SCHEDULE`].
///
/// Non-retriable errors return immediately after a single attempt; the last
/// error is returned once the schedule is exhausted. The inter-attempt sleep
/// is a plain `tokio::time::sleep`, so cancelling (dropping) the returned
/// future aborts the wait immediately.
pub async fn with_retries<T, F, Fut>(mut op: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut last_err = None;

    for backoff in RETRY_SCHEDULE {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) {
                    return Err(err);
                }
                warn!(
                    error = %err,
                    backoff_secs = backoff.as_secs(),
                    "retriable storage error"
                );
                time::sleep(backoff).await;
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => Err(err),
        // empty schedule degenerates to a single attempt
        None => op().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn connection_err() -> StorageError {
        StorageError::Connection("connection refused".to_string())
    }

    #[test]
    fn test_classifier() {
        assert!(is_retriable(&connection_err()));
        assert!(is_retriable(&StorageError::Timeout("deadline".to_string())));
        assert!(is_retriable(&StorageError::Io(io::Error::from(
            io::ErrorKind::UnexpectedEof
        ))));
        assert!(is_retriable(&StorageError::Io(io::Error::from(
            io::ErrorKind::WouldBlock
        ))));

        assert!(!is_retriable(&StorageError::NotFound("x".to_string())));
        assert!(!is_retriable(&StorageError::InvalidName));
        assert!(!is_retriable(&StorageError::KindMismatch("x".to_string())));
        assert!(!is_retriable(&StorageError::QueryFailed("syntax".to_string())));
        assert!(!is_retriable(&StorageError::Io(io::Error::from(
            io::ErrorKind::PermissionDenied
        ))));
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = AtomicUsize::new(0);

        let result = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retriable_not_retried() {
        let calls = AtomicUsize::new(0);

        let result: StorageResult<()> = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::NotFound("missing".to_string())) }
        })
        .await;

        assert_matches!(result, Err(StorageError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriable_exhausts_schedule() {
        let calls = AtomicUsize::new(0);

        let result: StorageResult<()> = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(connection_err()) }
        })
        .await;

        assert_matches!(result, Err(StorageError::Connection(_)));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_SCHEDULE.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);

        let result = with_retries(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(connection_err())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
