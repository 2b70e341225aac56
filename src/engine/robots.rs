//! robots.txt fetching, parsing, and enforcement
//!
//! Rules are fetched lazily per origin (`scheme://authority`) with a short
//! bounded timeout and a bounded body, then cached for the rest of the run.
//! Any fetch or parse failure caches an allow-all entry so the crawler keeps
//! making progress on sites that serve broken robots files.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const ROBOTS_MAX_BODY: usize = 512 * 1024;

/// Parsed robots.txt rules for one origin
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// `Allow` patterns that applied to this crawler's section
    pub allow: Vec<String>,

    /// `Disallow` patterns that applied to this crawler's section
    pub disallow: Vec<String>,

    /// `Crawl-delay` for this crawler, if specified
    pub crawl_delay: Option<Duration>,

    /// All `Sitemap` URLs, recorded regardless of section
    pub sitemaps: Vec<String>,

    /// When the rules were fetched
    pub fetched_at: DateTime<Utc>,
}

impl RobotsPolicy {
    /// Parses robots.txt content, keeping only directives that apply to the
    /// given crawler token
    ///
    /// A directive applies iff the most recent `User-agent:` line was `*` or
    /// contained the token (case-insensitive). Comments are stripped;
    /// `Sitemap` lines are always recorded.
    pub fn parse(content: &str, agent_token: &str) -> Self {
        let token = agent_token.to_lowercase();
        let mut policy = Self {
            allow: Vec::new(),
            disallow: Vec::new(),
            crawl_delay: None,
            sitemaps: Vec::new(),
            fetched_at: Utc::now(),
        };

        let mut in_our_section = false;
        for raw_line in content.lines() {
            let mut line = raw_line.trim();
            if let Some(idx) = line.find('#') {
                line = line[..idx].trim_end();
            }
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    let agent = value.to_lowercase();
                    in_our_section = agent == "*" || agent.contains(&token);
                }
                "disallow" => {
                    if in_our_section && !value.is_empty() {
                        policy.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if in_our_section && !value.is_empty() {
                        policy.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    if in_our_section {
                        if let Ok(secs) = value.parse::<f64>() {
                            if secs.is_finite() && secs >= 0.0 {
                                policy.crawl_delay = Some(Duration::from_secs_f64(secs));
                            }
                        }
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        policy.sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        policy
    }

    /// Checks whether a URL path is allowed by these rules
    ///
    /// When both an allow and a disallow pattern could apply, allow wins.
    pub fn is_path_allowed(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };

        for pattern in &self.allow {
            if pattern_matches(pattern, path) {
                return true;
            }
        }
        for pattern in &self.disallow {
            if pattern_matches(pattern, path) {
                return false;
            }
        }
        true
    }
}

/// Matches a robots.txt pattern against a URL path
///
/// A pattern is a literal path prefix; `*` matches any (possibly empty)
/// sequence and `$` anchors the match at the end of the path. An empty
/// pattern matches nothing.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    if !pattern.contains('*') {
        return if anchored {
            path == pattern
        } else {
            path.starts_with(pattern)
        };
    }

    // Wildcard walk: each literal part must appear in order, the first at
    // the start of the path.
    let mut pos = 0;
    for (i, part) in pattern.split('*').enumerate() {
        if part.is_empty() {
            continue;
        }
        match path[pos..].find(part) {
            Some(idx) => {
                if i == 0 && idx != 0 {
                    return false;
                }
                pos += idx + part.len();
            }
            None => return false,
        }
    }

    if anchored {
        // The pattern must consume the path up to its end. A trailing `*`
        // before `$` can absorb the remainder.
        pattern.ends_with('*') || pos == path.len()
    } else {
        true
    }
}

type CacheEntry = Arc<OnceCell<Option<RobotsPolicy>>>;

/// Per-origin robots.txt cache
///
/// `is_allowed` / `crawl_delay` trigger at most one fetch per origin; the
/// per-entry `OnceCell` serializes concurrent first-callers so the slow
/// fetch never happens under the cache-wide lock.
pub struct RobotsCache {
    enabled: bool,
    agent_token: String,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl RobotsCache {
    /// Creates a robots cache
    ///
    /// `user_agent` is used both as the User-Agent header on robots fetches
    /// and (its product token) to select the matching robots.txt section.
    pub fn new(enabled: bool, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(ROBOTS_FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            enabled,
            agent_token: agent_token(user_agent),
            client,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Checks whether a URL may be fetched under its origin's robots rules
    ///
    /// Always true when robots respect is disabled, when the URL has no
    /// origin, or when the origin's robots.txt could not be fetched.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(origin) = crate::url::origin(url) else {
            return true;
        };

        match self.policy_for(&origin).await {
            Some(policy) => policy.is_path_allowed(url.path()),
            None => true,
        }
    }

    /// Returns the origin's crawl delay, or zero
    pub async fn crawl_delay(&self, url: &Url) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let Some(origin) = crate::url::origin(url) else {
            return Duration::ZERO;
        };

        match self.policy_for(&origin).await {
            Some(policy) => policy.crawl_delay.unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// Returns the sitemap URLs listed in the origin's robots.txt
    pub async fn sitemaps(&self, url: &Url) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let Some(origin) = crate::url::origin(url) else {
            return Vec::new();
        };

        match self.policy_for(&origin).await {
            Some(policy) => policy.sitemaps.clone(),
            None => Vec::new(),
        }
    }

    async fn policy_for(&self, origin: &str) -> Option<RobotsPolicy> {
        let entry = self.entry(origin);
        entry
            .get_or_init(|| self.fetch_policy(origin.to_string()))
            .await
            .clone()
    }

    fn entry(&self, origin: &str) -> CacheEntry {
        if let Some(entry) = self.cache.read().unwrap().get(origin) {
            return Arc::clone(entry);
        }
        let mut cache = self.cache.write().unwrap();
        Arc::clone(
            cache
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Fetches and parses `<origin>/robots.txt`; `None` means allow-all
    async fn fetch_policy(&self, origin: String) -> Option<RobotsPolicy> {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("fetching robots.txt from {}", robots_url);

        let response = match self.client.get(&robots_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("robots.txt fetch failed for {}: {}, allowing all", origin, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "robots.txt unavailable for {} (status {}), allowing all",
                origin,
                response.status()
            );
            return None;
        }

        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > ROBOTS_MAX_BODY {
                        body.extend_from_slice(&chunk[..ROBOTS_MAX_BODY - body.len()]);
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("robots.txt body read failed for {}: {}", origin, e);
                    return None;
                }
            }
        }

        let content = String::from_utf8_lossy(&body);
        Some(RobotsPolicy::parse(&content, &self.agent_token))
    }
}

/// Extracts the product token from a User-Agent string
///
/// `"kumo/0.1 (+https://...)"` becomes `"kumo"`: the portion before the
/// first `/` or whitespace, lowercased.
fn agent_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or(user_agent)
        .to_lowercase()
}
