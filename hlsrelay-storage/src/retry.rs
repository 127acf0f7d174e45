// Bounded retry for remote writes (via `backon`)
//
// Attempts are numbered from 1. Once `max_attempts` attempts have failed the
// artifact is given up on and the caller gets `StorageError::GivingUp`.

use crate::error::{Result, StorageError};
use backon::{BackoffBuilder, ExponentialBuilder};
use hlsrelay_core::RetryConfig;
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_delay: config.min_delay(),
            max_delay: config.max_delay(),
        }
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .with_jitter()
            .build()
    }
}

/// Check if an I/O error is transient and worth retrying
#[must_use]
pub fn is_transient_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// budget runs out.
///
/// `first_attempt` lets a caller resume a partially spent budget; `op`
/// receives the number of the attempt being made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    path: &Path,
    first_attempt: u32,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut attempt = first_attempt.max(1);
    if attempt > policy.max_attempts {
        tracing::error!(path = %path.display(), attempt, "Giving up: retry budget already spent");
        return Err(StorageError::GivingUp {
            path: path.to_path_buf(),
            attempts: attempt - 1,
            source: io::Error::other("retry budget exhausted"),
        });
    }

    let mut delays = policy.backoff();
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_transient_error(&e) => {
                tracing::error!(path = %path.display(), attempt, error = %e, "Write failed permanently");
                return Err(StorageError::io(path, e));
            }
            Err(e) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(path = %path.display(), attempt, error = %e, "Giving up");
                    return Err(StorageError::GivingUp {
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source: e,
                    });
                }

                let delay = delays.next().unwrap_or(policy.max_delay);
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "Write failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_attempts: 4,
            min_delay_ms: 1,
            max_delay_ms: 2,
        })
    }

    #[test]
    fn test_is_transient_error() {
        assert!(is_transient_error(&io::Error::new(io::ErrorKind::TimedOut, "timeout")));
        assert!(is_transient_error(&io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        assert!(is_transient_error(&io::Error::new(io::ErrorKind::BrokenPipe, "pipe")));

        assert!(!is_transient_error(&io::Error::new(io::ErrorKind::NotFound, "not found")));
        assert!(!is_transient_error(&io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        assert!(!is_transient_error(&io::Error::other("unexpected response")));
    }

    #[tokio::test]
    async fn test_gives_up_after_four_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_policy(), Path::new("hls/0/seg1.ts"), 1, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(StorageError::GivingUp { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected GivingUp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failure() {
        let seen = parking_lot::Mutex::new(Vec::new());

        let result = with_retry(&fast_policy(), Path::new("hls/0/seg1.ts"), 1, |attempt| {
            seen.lock().push(attempt);
            async move {
                if attempt < 3 {
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
                } else {
                    Ok("hls/0/seg1.ts")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "hls/0/seg1.ts");
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_policy(), Path::new("hls/0/seg1.ts"), 1, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn test_unclassified_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_policy(), Path::new("hls/0/seg1.ts"), 1, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::other("unexpected response")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn test_resumed_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_policy(), Path::new("a/b.ts"), 3, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().is_terminal());

        let result: Result<()> = with_retry(&fast_policy(), Path::new("a/b.ts"), 5, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().is_terminal());
    }
}
