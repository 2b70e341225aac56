//! Fetcher abstraction and fetch error classification
//!
//! A fetcher turns a [`Request`](crate::engine::Request) into a
//! [`Response`](crate::engine::Response), honoring the shared cancellation
//! token and the per-request timeout. Errors carry a classification that
//! the scheduler uses to decide between retry and drop.

mod http;

pub use http::HttpFetcher;

use crate::engine::{Request, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lower bound applied to `Retry-After` values
pub const RETRY_AFTER_MIN: Duration = Duration::from_secs(1);
/// Upper bound applied to `Retry-After` values
pub const RETRY_AFTER_MAX: Duration = Duration::from_secs(120);
/// Back-off used when a 429 carries no parseable `Retry-After`
const RETRY_AFTER_DEFAULT: Duration = Duration::from_secs(5);

/// What went wrong during a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request or body read timed out
    Timeout,
    /// Connection refused, reset, or could not be established
    Connect,
    /// HTTP 429 with optional Retry-After
    RateLimited,
    /// HTTP 5xx
    ServerError,
    /// HTTP 4xx other than 429
    ClientError,
    /// Redirect loop or too many redirects
    Redirect,
    /// Body read or decode failure mid-stream
    Body,
    /// The shared cancellation token fired
    Cancelled,
    /// The request could not be constructed (bad method, header, URL)
    InvalidRequest,
}

/// A classified fetch failure
#[derive(Debug, Clone)]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub retryable: bool,
    /// Populated from the Retry-After header on HTTP 429
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            FetchErrorKind::Timeout
                | FetchErrorKind::Connect
                | FetchErrorKind::RateLimited
                | FetchErrorKind::ServerError
                | FetchErrorKind::Body
        );
        Self {
            url: url.into(),
            kind,
            status: None,
            retryable,
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::new(url, FetchErrorKind::Cancelled, "fetch cancelled")
    }

    pub fn rate_limited(url: impl Into<String>, retry_after: Duration) -> Self {
        let mut err = Self::new(url, FetchErrorKind::RateLimited, "HTTP 429: rate limited")
            .with_status(429);
        err.retry_after = Some(retry_after);
        err
    }

    /// True if the scheduler may re-enqueue the request
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// True if the fetch was aborted by cancellation
    ///
    /// Cancelled fetches are terminal but are not counted as failures.
    pub fn is_cancelled(&self) -> bool {
        self.kind == FetchErrorKind::Cancelled
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "fetch error for {} (status {}): {}",
                self.url, status, self.message
            ),
            None => write!(f, "fetch error for {}: {}", self.url, self.message),
        }
    }
}

impl std::error::Error for FetchError {}

/// The fetcher contract
///
/// Implementations must deliver decompressed bodies, preserve the final URL
/// after redirects, surface 429 with its Retry-After value attached, and
/// abort promptly when the cancellation token fires.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError>;
}

/// Parses a `Retry-After` header value into a bounded duration
///
/// Accepts integer seconds or an HTTP-date; the result is clamped to
/// [`RETRY_AFTER_MIN`, `RETRY_AFTER_MAX`]. Missing or unparseable values
/// fall back to a short default back-off.
pub fn parse_retry_after(header: Option<&str>) -> Duration {
    let Some(value) = header.map(str::trim).filter(|v| !v.is_empty()) else {
        return RETRY_AFTER_DEFAULT;
    };

    if let Ok(secs) = value.parse::<u64>() {
        return clamp_retry_after(Duration::from_secs(secs));
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        let until = date.with_timezone(&Utc) - Utc::now();
        let duration = until.to_std().unwrap_or(Duration::ZERO);
        return clamp_retry_after(duration);
    }

    RETRY_AFTER_DEFAULT
}

fn clamp_retry_after(duration: Duration) -> Duration {
    duration.clamp(RETRY_AFTER_MIN, RETRY_AFTER_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(FetchError::new("u", FetchErrorKind::Timeout, "m").is_retryable());
        assert!(FetchError::new("u", FetchErrorKind::Connect, "m").is_retryable());
        assert!(FetchError::new("u", FetchErrorKind::ServerError, "m").is_retryable());
        assert!(FetchError::new("u", FetchErrorKind::RateLimited, "m").is_retryable());
        assert!(FetchError::new("u", FetchErrorKind::Body, "m").is_retryable());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(!FetchError::new("u", FetchErrorKind::ClientError, "m").is_retryable());
        assert!(!FetchError::new("u", FetchErrorKind::Redirect, "m").is_retryable());
        assert!(!FetchError::new("u", FetchErrorKind::Cancelled, "m").is_retryable());
        assert!(!FetchError::new("u", FetchErrorKind::InvalidRequest, "m").is_retryable());
    }

    #[test]
    fn test_cancelled_detection() {
        let err = FetchError::cancelled("http://example.com/");
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_with_status() {
        let err = FetchError::new("http://h/x", FetchErrorKind::ServerError, "HTTP 503")
            .with_status(503);
        assert_eq!(err.to_string(), "fetch error for http://h/x (status 503): HTTP 503");
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after(Some("30")), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_clamped_high() {
        assert_eq!(parse_retry_after(Some("600")), RETRY_AFTER_MAX);
    }

    #[test]
    fn test_retry_after_clamped_low() {
        assert_eq!(parse_retry_after(Some("0")), RETRY_AFTER_MIN);
    }

    #[test]
    fn test_retry_after_missing_uses_default() {
        assert_eq!(parse_retry_after(None), Duration::from_secs(5));
        assert_eq!(parse_retry_after(Some("")), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_garbage_uses_default() {
        assert_eq!(parse_retry_after(Some("soonish")), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_http_date() {
        let future = Utc::now() + chrono::Duration::seconds(40);
        let header = future.to_rfc2822();
        let parsed = parse_retry_after(Some(&header));
        assert!(parsed >= Duration::from_secs(35) && parsed <= Duration::from_secs(45));
    }

    #[test]
    fn test_retry_after_past_http_date_clamps_to_min() {
        let past = Utc::now() - chrono::Duration::seconds(60);
        let header = past.to_rfc2822();
        assert_eq!(parse_retry_after(Some(&header)), RETRY_AFTER_MIN);
    }
}
