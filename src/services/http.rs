use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::{AppError, AppResult};

const MAX_RETRIES: usize = 5;
const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;

/// Which remote API a request goes to. Drives error classification and log text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    YouTube,
    Calendar,
    GoogleAuth,
}

impl Upstream {
    pub fn name(self) -> &'static str {
        match self {
            Upstream::YouTube => "YouTube",
            Upstream::Calendar => "Google Calendar",
            Upstream::GoogleAuth => "Google OAuth",
        }
    }

    pub fn error(self, message: String) -> AppError {
        match self {
            Upstream::YouTube => AppError::YouTubeApi(message),
            Upstream::Calendar => AppError::CalendarApi(message),
            Upstream::GoogleAuth => AppError::Auth(message),
        }
    }
}

pub fn build_client(timeout_seconds: u64) -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(AppError::from)
}

/// Send a request, retrying on 429, 5xx and network errors with exponential
/// backoff.
///
/// The closure is called once per attempt because a `RequestBuilder` cannot
/// be reused. Any other status (including 4xx) is returned to the caller.
pub async fn send_with_backoff<F>(upstream: Upstream, make_request: F) -> AppResult<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut backoff_secs = INITIAL_BACKOFF_SECS;

    for attempt in 0..MAX_RETRIES {
        match (make_request)().send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    let wait_secs = retry_after_secs(resp.headers())
                        .unwrap_or(backoff_secs)
                        .min(MAX_BACKOFF_SECS);

                    if attempt + 1 >= MAX_RETRIES {
                        let err_text = resp.text().await.unwrap_or_default();
                        return Err(upstream.error(format!(
                            "Failed after {} attempts ({}): {}",
                            attempt + 1,
                            status,
                            err_text
                        )));
                    }

                    tracing::warn!(
                        "Transient {} error (status: {}). Retrying in {}s (attempt {}/{})",
                        upstream.name(),
                        status,
                        wait_secs,
                        attempt + 1,
                        MAX_RETRIES
                    );

                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    backoff_secs = std::cmp::min(backoff_secs * 2, MAX_BACKOFF_SECS);
                    continue;
                }

                return Ok(resp);
            }
            Err(e) => {
                if attempt + 1 >= MAX_RETRIES {
                    return Err(e.into());
                }
                tracing::warn!(
                    "{} request failed: {}. Retrying in {}s (attempt {}/{})",
                    upstream.name(),
                    e,
                    backoff_secs,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = std::cmp::min(backoff_secs * 2, MAX_BACKOFF_SECS);
            }
        }
    }

    Err(upstream.error("Exceeded retry attempts".to_string()))
}

/// Turn a non-success response into a typed error carrying the response body.
pub async fn error_from_response(upstream: Upstream, context: &str, response: Response) -> AppError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    upstream.error(format!("{} ({}): {}", context, status, error_text))
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
