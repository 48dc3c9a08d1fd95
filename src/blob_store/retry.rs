/// Bounded retry with exponential backoff
///
/// Kept separate from the backend adapters so the call sites stay plain
/// business logic. Only the adapter decides which of its errors are
/// transient.
use std::future::Future;
use std::time::Duration;

/// Retry policy: attempt count and backoff base
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of one attempt, as judged by the caller
pub enum Attempt<T, E> {
    Done(Result<T, E>),
    /// Transient failure worth retrying
    Again(E),
}

/// Run `op` up to `policy.max_attempts` times, doubling the delay between
/// attempts from `policy.base_delay`. The final transient error is
/// surfaced when attempts run out.
pub async fn with_backoff<T, E, F, Fut>(label: &str, policy: BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1;

    loop {
        match op().await {
            Attempt::Done(result) => return result,
            Attempt::Again(err) => {
                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        "{}: giving up after {} attempts: {}",
                        label,
                        attempt,
                        err
                    );
                    return Err(err);
                }
                tracing::debug!(
                    "{}: attempt {} failed ({}), retrying in {:?}",
                    label,
                    attempt,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Done(Ok(7)) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Attempt::Again("flaky".to_string())
                } else {
                    Attempt::Done(Ok(42))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Again("still down".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Done(Err("bad request".to_string())) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "bad request");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
