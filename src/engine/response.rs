use crate::engine::Request;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// The result of fetching a request
///
/// Constructed by a fetcher, consumed by extractor callbacks. Never mutated
/// after construction. The body has already been decompressed and is capped
/// at the fetcher's configured maximum size.
#[derive(Debug)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response headers (header names lowercased)
    pub headers: HashMap<String, String>,

    /// Decoded body bytes
    pub body: Vec<u8>,

    /// Resolved URL after any redirects
    pub final_url: Url,

    /// How long the fetch took
    pub fetch_duration: Duration,

    /// When the response arrived
    pub fetched_at: DateTime<Utc>,

    /// The request that produced this response
    pub request: Request,
}

impl Response {
    /// Returns true if the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns a response header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Returns the Content-Type header, if any
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns true if the response looks like an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            // No Content-Type header: assume HTML and let the parser decide
            .unwrap_or(true)
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
