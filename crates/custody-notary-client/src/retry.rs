//! Retry logic with exponential backoff for notary HTTP calls.
//!
//! Retries only on transport errors (connection failures, timeouts).
//! Responses of any status are returned to the caller untouched.

use std::time::Duration;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Send an HTTP request with exponential backoff retry on transport errors.
///
/// The closure `f` is called up to `MAX_RETRIES + 1` times and must build a
/// fresh request each time; multipart bodies cannot be replayed.
pub(crate) async fn retry_send<F, Fut>(endpoint: &str, f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "notary request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}
