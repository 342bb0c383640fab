//! HTTP fetching with bounded retry.
//!
//! All HTTP error classification lives here: callers get a body or a typed
//! [`FetchError`] and never look at reqwest internals. Only timeouts and 5xx
//! responses are retried; every 4xx (including 404) and any DNS/protocol
//! failure is fatal on the first attempt.

use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::utils::fmt_duration;

/// Retries after the base attempt; a fetch makes at most `MAX_RETRIES + 1`
/// attempts in total.
pub const MAX_RETRIES: usize = 3;

/// Fixed backoff before each retry.
pub const BACKOFF_SCHEDULE: [Duration; MAX_RETRIES] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(20),
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {attempts} attempts")]
    Timeout { attempts: usize },
    #[error("server returned {status} after {attempts} attempts")]
    Status { status: StatusCode, attempts: usize },
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("fetch cancelled")]
    Cancelled,
}

/// A successfully fetched page.
#[derive(Debug)]
pub struct FetchedPage {
    pub body: String,
    pub status: StatusCode,
}

/// Outcome of a single attempt, before retry policy is applied.
enum AttemptError {
    TimedOut,
    ServerError(StatusCode),
    ClientError(StatusCode),
    Fatal(FetchError),
}

/// Whether an HTTP status is worth retrying.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}

pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher with the configured user-agent and per-attempt timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// GET a URL, retrying timeouts and 5xx responses with fixed backoff.
    ///
    /// Cancellation aborts the in-flight request and any backoff sleep; a
    /// cancelled attempt is reported as [`FetchError::Cancelled`], not
    /// retried.
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<FetchedPage, FetchError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.attempt(url) => outcome,
            };

            let error = match outcome {
                Ok(page) => {
                    debug!(url = %url, status = %page.status, attempts, "fetched");
                    return Ok(page);
                }
                Err(e) => e,
            };

            match error {
                AttemptError::Fatal(e) => return Err(e),
                AttemptError::ClientError(status) => {
                    return Err(FetchError::Status { status, attempts });
                }
                AttemptError::TimedOut if attempts > MAX_RETRIES => {
                    return Err(FetchError::Timeout { attempts });
                }
                AttemptError::ServerError(status) if attempts > MAX_RETRIES => {
                    return Err(FetchError::Status { status, attempts });
                }
                AttemptError::TimedOut | AttemptError::ServerError(_) => {
                    let delay = BACKOFF_SCHEDULE[attempts - 1];
                    warn!(
                        url = %url,
                        attempt = attempts,
                        backoff = fmt_duration(delay),
                        "transient fetch error, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&self, url: &Url) -> Result<FetchedPage, AttemptError> {
        let response = match self.http.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(AttemptError::TimedOut),
            Err(e) => return Err(AttemptError::Fatal(FetchError::Network(e))),
        };

        let status = response.status();
        if !status.is_success() {
            if is_retryable_status(status) {
                return Err(AttemptError::ServerError(status));
            }
            return Err(AttemptError::ClientError(status));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) if e.is_timeout() => return Err(AttemptError::TimedOut),
            Err(e) => return Err(AttemptError::Fatal(FetchError::Network(e))),
        };

        Ok(FetchedPage { body, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_fixed() {
        assert_eq!(BACKOFF_SCHEDULE.len(), MAX_RETRIES);
        assert_eq!(BACKOFF_SCHEDULE[0], Duration::from_secs(5));
        assert_eq!(BACKOFF_SCHEDULE[1], Duration::from_secs(10));
        assert_eq!(BACKOFF_SCHEDULE[2], Duration::from_secs(20));
    }

    #[test]
    fn only_5xx_is_retryable() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    }
}
