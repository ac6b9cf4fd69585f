//! # Status Update Retry
//!
//! Exponential backoff for the kitchen/bar status calls. No other call is
//! retried.
//!
//! With the defaults (3 attempts, 1s initial delay, 4s cap):
//!
//! ```text
//! attempt 1 ──✗──► wait 1s ──► attempt 2 ──✗──► wait 2s ──► attempt 3 ──✗──► NETWORK_ERROR
//! ```
//!
//! The delay doubles before every further attempt and never exceeds
//! `max_delay_ms`, so raising `max_attempts` to 5 waits 1s, 2s, 4s, 4s.
//!
//! Errors that cannot succeed on a retry (validation, auth, 404) stop at
//! the first attempt and are returned as they are.

use std::future::Future;

use backoff::ExponentialBackoff;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::{ApiError, ApiResult, ErrorCode};

fn policy(settings: &RetrySettings) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: settings.initial_delay(),
        current_interval: settings.initial_delay(),
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: settings.max_delay(),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// Runs `op` up to `settings.max_attempts` times.
///
/// When every attempt fails with a retryable error the result is a
/// `NETWORK_ERROR` whose details carry the last error.
pub async fn with_retry<T, F, Fut>(settings: &RetrySettings, operation: &str, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 0u32;

    let result = backoff::future::retry(policy(settings), || {
        attempt += 1;
        let current = attempt;
        let call = op();
        async move {
            match call.await {
                Ok(value) => {
                    if current > 1 {
                        debug!(operation, attempt = current, "Succeeded after retry");
                    }
                    Ok(value)
                }
                Err(e) if e.is_retryable() && current < max_attempts => {
                    warn!(operation, attempt = current, error = %e, "Attempt failed, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await;

    result.map_err(|e| {
        if e.is_retryable() {
            warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
            ApiError::new(
                ErrorCode::NetworkError,
                format!("{operation} failed after {attempt} attempts"),
            )
            .with_details(json!({
                "attempts": attempt,
                "last_error": e,
            }))
        } else {
            e
        }
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_delays_double() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let result: ApiResult<()> = with_retry(&RetrySettings::default(), "change_status", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::network("down"))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert_eq!(err.details.as_ref().unwrap()["attempts"], 3);
        assert_eq!(err.details.as_ref().unwrap()["last_error"]["code"], "NETWORK_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s between the three attempts.
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_stops_growing_at_cap() {
        let settings = RetrySettings {
            max_attempts: 5,
            ..RetrySettings::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let err = with_retry(&settings, "change_status", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ApiError::network("down"))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.details.as_ref().unwrap()["attempts"], 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // 1s + 2s + 4s + 4s
        assert_eq!(started.elapsed().as_secs(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let value = with_retry(&RetrySettings::default(), "change_status", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::network("blip"))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let err = with_retry(&RetrySettings::default(), "change_status", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ApiError::not_found("Order", 1))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
