//! URL handling for Kumo
//!
//! This module provides URL canonicalization, fingerprinting for
//! deduplication, and authority/origin extraction helpers.

mod canonical;

pub use canonical::{canonicalize, fingerprint, Fingerprint};

use url::Url;

/// Extracts the authority (`host[:port]`) from a URL
///
/// The authority is the unit of politeness throttling. The host is
/// lowercased; the port is included only when it is not the scheme default.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kumo::url::authority;
///
/// let url = Url::parse("https://Example.COM/path").unwrap();
/// assert_eq!(authority(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://example.com:8080/").unwrap();
/// assert_eq!(authority(&url), Some("example.com:8080".to_string()));
/// ```
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Extracts the origin (`scheme://authority`) from a URL
///
/// The origin is the unit of robots.txt caching.
pub fn origin(url: &Url) -> Option<String> {
    let auth = authority(url)?;
    Some(format!("{}://{}", url.scheme(), auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_simple() {
        let url = Url::parse("https://example.com/path").unwrap();
        assert_eq!(authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_authority_with_port() {
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(authority(&url), Some("example.com:8080".to_string()));
    }

    #[test]
    fn test_authority_drops_default_port() {
        // The url crate normalizes default ports away at parse time
        let url = Url::parse("http://example.com:80/").unwrap();
        assert_eq!(authority(&url), Some("example.com".to_string()));

        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_authority_lowercases_host() {
        let url = Url::parse("https://EXAMPLE.com/").unwrap();
        assert_eq!(authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_origin() {
        let url = Url::parse("https://example.com/a/b?c=d").unwrap();
        assert_eq!(origin(&url), Some("https://example.com".to_string()));
    }

    #[test]
    fn test_origin_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:9001/page").unwrap();
        assert_eq!(origin(&url), Some("http://127.0.0.1:9001".to_string()));
    }
}
