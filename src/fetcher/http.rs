//! HTTP fetcher built on reqwest
//!
//! Handles redirect policy, gzip/deflate/brotli decompression (delegated to
//! reqwest), round-robin User-Agent rotation, per-request timeouts, bounded
//! body reads, and mapping transport failures onto the retry classification.

use crate::config::Config;
use crate::engine::{Request, Response};
use crate::fetcher::{parse_retry_after, Fetch, FetchError, FetchErrorKind};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderValue, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Fetches requests over HTTP(S) with a shared connection pool
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    ua_index: AtomicUsize,
    default_timeout: Duration,
    max_body_size: usize,
}

impl HttpFetcher {
    /// Builds a fetcher from the crawler configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let redirect = if config.fetcher.follow_redirects {
            Policy::limited(config.fetcher.max_redirects as usize)
        } else {
            Policy::none()
        };

        let client = Client::builder()
            .redirect(redirect)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            user_agents: config.engine.user_agents.clone(),
            ua_index: AtomicUsize::new(0),
            default_timeout: config.engine.request_timeout(),
            max_body_size: config.fetcher.max_body_size,
        })
    }

    /// Returns the next User-Agent in round-robin order
    fn next_user_agent(&self) -> &str {
        if self.user_agents.is_empty() {
            return concat!("kumo/", env!("CARGO_PKG_VERSION"));
        }
        let idx = self.ua_index.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[idx]
    }

    /// Reads the response body up to `max_body_size`, honoring cancellation
    async fn read_body(
        &self,
        url: &str,
        response: &mut reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        let mut body: Vec<u8> = Vec::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
                chunk = response.chunk() => chunk,
            };
            match chunk {
                Ok(Some(bytes)) => {
                    let remaining = self.max_body_size.saturating_sub(body.len());
                    if bytes.len() >= remaining {
                        body.extend_from_slice(&bytes[..remaining]);
                        return Ok(body);
                    }
                    body.extend_from_slice(&bytes);
                }
                Ok(None) => return Ok(body),
                Err(e) => return Err(classify_transport_error(url, e)),
            }
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let url = request.url_str().to_string();

        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            FetchError::new(
                &url,
                FetchErrorKind::InvalidRequest,
                format!("invalid method {:?}", request.method),
            )
        })?;

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let mut builder = self
            .client
            .request(method, request.url.clone())
            .timeout(timeout)
            .header(USER_AGENT, self.next_user_agent())
            .header(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT))
            .header(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let http_response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled(&url)),
            result = builder.send() => result.map_err(|e| classify_transport_error(&url, e))?,
        };

        let status = http_response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                http_response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(FetchError::rate_limited(&url, retry_after));
        }

        if status.is_server_error() {
            return Err(FetchError::new(
                &url,
                FetchErrorKind::ServerError,
                format!("HTTP {}", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        if status.is_client_error() {
            return Err(FetchError::new(
                &url,
                FetchErrorKind::ClientError,
                format!("HTTP {}", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        let final_url = http_response.url().clone();
        let headers: HashMap<String, String> = http_response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let mut http_response = http_response;
        let body = self.read_body(&url, &mut http_response, cancel).await?;
        let fetch_duration = started.elapsed();

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            ?fetch_duration,
            "fetch complete"
        );

        Ok(Response {
            status: status.as_u16(),
            headers,
            body,
            final_url,
            fetch_duration,
            fetched_at: Utc::now(),
            request: request.clone(),
        })
    }
}

/// Maps a reqwest transport error onto the retry classification
fn classify_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_connect() {
        FetchErrorKind::Connect
    } else if error.is_redirect() {
        FetchErrorKind::Redirect
    } else if error.is_body() || error.is_decode() {
        // Reset or unexpected EOF mid-stream
        FetchErrorKind::Body
    } else {
        FetchErrorKind::InvalidRequest
    };

    let mut fetch_error = FetchError::new(url, kind, error.to_string());
    if let Some(status) = error.status() {
        fetch_error = fetch_error.with_status(status.as_u16());
    }
    fetch_error
}
