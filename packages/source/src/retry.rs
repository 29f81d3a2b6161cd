//! HTTP retry helpers for opening remote datasets.
//!
//! Only the request/response handshake is retried. Once the response
//! headers arrive the body is streamed as-is; an error mid-body ends the
//! source rather than re-downloading gigabytes from the start.

use std::time::Duration;

use crate::SourceError;

/// Maximum number of retry attempts for transient HTTP errors
/// (connection failures, timeouts, server errors).
///
/// With exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait
/// before giving up is 62 seconds.
pub const MAX_RETRIES: u32 = 5;

/// Sends the request built by `build_request` and returns the response
/// once a non-error status arrives.
///
/// The closure is called on each attempt since builders are consumed by
/// `.send()`. Connection errors, timeouts, HTTP 429 and HTTP 5xx are
/// retried up to `max_retries` times with exponential backoff. Other 4xx
/// statuses are permanent.
///
/// # Errors
///
/// Returns [`SourceError::Unavailable`] for a non-retryable status or when
/// all retries are exhausted, and [`SourceError::Http`] for a permanent
/// transport error.
#[allow(clippy::future_not_send)]
pub async fn send_with_retry<F>(
    location: &str,
    build_request: F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} for {location} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from {location}");
                        last_error = Some(unavailable(location, format!("HTTP {status}")));
                        continue;
                    }
                    return Err(unavailable(
                        location,
                        format!("HTTP {status} after {max_retries} retries"),
                    ));
                }

                if status.is_client_error() {
                    return Err(unavailable(location, format!("HTTP {status}")));
                }

                return Ok(response);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| unavailable(location, "request failed after all retries".to_string())))
}

fn unavailable(location: &str, message: String) -> SourceError {
    SourceError::Unavailable {
        location: location.to_string(),
        message,
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}
