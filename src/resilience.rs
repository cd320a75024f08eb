//! Generic timeout and retry primitives shared by all provider adapters.
//!
//! `retry` is deliberately policy-free: it does not distinguish
//! retryable from non-retryable errors, so callers decide what to wrap
//! (a 4xx validation error should be surfaced before retrying, a 5xx or
//! network failure is worth another attempt).

use crate::errors::AppError;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// A response plus how long the upstream took to produce it.
#[derive(Debug)]
pub struct TimedResponse {
    pub response: reqwest::Response,
    pub elapsed_ms: u64,
}

/// Sends a request, aborting after `timeout`.
///
/// Timeouts and transport failures both surface as `ProviderDown`; the
/// elapsed time is measured around the full send so provider logs get a
/// realistic latency figure.
pub async fn fetch_with_timeout(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<TimedResponse, AppError> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, builder.send()).await {
        Ok(Ok(response)) => Ok(TimedResponse {
            response,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
        Ok(Err(e)) => Err(AppError::ProviderDown(format!("request failed: {}", e))),
        Err(_) => Err(AppError::ProviderDown(format!(
            "request timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Calls `f` up to `tries` times with linearly increasing backoff
/// (`delay * attempt_index` between attempts, no jitter).
///
/// Returns the first success, or the last error once all attempts are
/// exhausted.
pub async fn retry<T, E, F, Fut>(mut f: F, tries: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let tries = tries.max(1);
    let mut last_err = None;

    for attempt in 1..=tries {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < tries {
                    let backoff = delay * attempt;
                    tracing::warn!(
                        "Attempt {}/{} failed ({}), retrying in {}ms",
                        attempt,
                        tries,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                } else {
                    tracing::error!("All {} attempts failed: {}", tries, e);
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("at least one attempt was made"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn retry_calls_at_most_n_times_and_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), String> = retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("failure #{}", n))
                }
            },
            3,
            Duration::from_millis(1000),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err(), "failure #3");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32, String> = retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err("not yet".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_with_zero_tries_still_calls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), String> = retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("nope".to_string())
                }
            },
            0,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
