use sha2::{Digest, Sha256};
use url::form_urlencoded;
use url::Url;

/// A 128-bit URL fingerprint: the first 16 bytes of SHA-256 over the
/// canonical URL string.
pub type Fingerprint = [u8; 16];

/// Produces the canonical form of a URL, used as the deduplication key
///
/// # Canonicalization Steps
///
/// 1. Lowercase the scheme and host
/// 2. Drop the fragment
/// 3. Drop default ports (80 for http, 443 for https)
/// 4. Sort query parameters: keys ascending, then values ascending within a
///    key, re-encoded
/// 5. Trim trailing slashes from the path (unless the path is `/`)
/// 6. Force an empty path to `/`
///
/// Parsing is fail-open: if the input is not a parseable URL the original
/// string is returned unchanged, so the caller's later HTTP validation can
/// reject it.
///
/// # Examples
///
/// ```
/// use kumo::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("HTTP://Example.COM:80/page/?b=2&a=1#frag"),
///     "http://example.com/page?a=1&b=2"
/// );
/// ```
pub fn canonicalize(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };

    // The url crate already lowercases scheme and host and strips default
    // ports for http/https at parse time.
    url.set_fragment(None);

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish();
            url.set_query(Some(&encoded));
        }
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&trimmed);
        }
    }

    url.to_string()
}

/// Computes the 128-bit fingerprint of a URL's canonical form
///
/// Truncating SHA-256 to 16 bytes is fine for dedup: per-crawl cardinality
/// stays far below the birthday bound for a 128-bit space.
pub fn fingerprint(raw: &str) -> Fingerprint {
    let canonical = canonicalize(raw);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
