use crate::UrlError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Priority classes for request scheduling (lower = earlier)
pub const PRIORITY_HIGHEST: i32 = 0;
pub const PRIORITY_HIGH: i32 = 1;
pub const PRIORITY_NORMAL: i32 = 2;
pub const PRIORITY_LOW: i32 = 3;
pub const PRIORITY_LOWEST: i32 = 4;

static NEXT_REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// A single crawl unit
///
/// A request is owned by whichever component currently holds it: admission
/// until it is pushed, the frontier while queued, and a worker from dequeue
/// until it either emits records or releases the request for retry.
#[derive(Debug, Clone)]
pub struct Request {
    /// Target URL (validated http/https)
    pub url: Url,

    /// HTTP method, `GET` by default
    pub method: String,

    /// Custom headers to send with the request
    pub headers: HashMap<String, String>,

    /// Optional request body
    pub body: Option<Vec<u8>>,

    /// Crawl depth from the seed (0 for seeds)
    pub depth: u32,

    /// Scheduling priority (lower value dispatches first)
    pub priority: i32,

    /// Current retry attempt
    pub retry_count: u32,

    /// Maximum number of retries before the request is dropped
    pub max_retries: u32,

    /// Per-request timeout override
    pub timeout: Option<Duration>,

    /// URL of the page this request was discovered on
    pub parent_url: Option<String>,

    /// Arbitrary metadata attached to this request
    pub meta: HashMap<String, Value>,

    /// Stable identifier derived from (canonical URL, monotonic counter)
    pub id: String,
}

impl Request {
    /// Creates a new GET request with default priority and no retries used
    ///
    /// # Errors
    ///
    /// Returns `UrlError` if the URL does not parse or is not http/https.
    pub fn new(raw_url: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        let seq = NEXT_REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}#{}", crate::url::canonicalize(raw_url), seq);

        Ok(Self {
            url,
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            depth: 0,
            priority: PRIORITY_NORMAL,
            retry_count: 0,
            max_retries: 3,
            timeout: None,
            parent_url: None,
            meta: HashMap::new(),
            id,
        })
    }

    /// Sets the crawl depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the scheduling priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the maximum retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the parent URL
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_url = Some(parent.into());
        self
    }

    /// Returns the authority (`host[:port]`) of the request URL
    pub fn authority(&self) -> String {
        crate::url::authority(&self.url).unwrap_or_default()
    }

    /// Returns the request URL as a string
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}
