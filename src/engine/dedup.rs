//! URL deduplication over canonical fingerprints
//!
//! Membership is monotonic for the lifetime of a crawl: once a URL is
//! marked seen it is never removed. `export`/`import` exist for checkpoint
//! serialization and restore.

use crate::url::{fingerprint, Fingerprint};
use std::collections::HashSet;
use std::sync::RwLock;

/// Remembers which canonical URLs have been admitted
pub struct DedupSet {
    seen: RwLock<HashSet<Fingerprint>>,
}

impl DedupSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self {
            seen: RwLock::new(HashSet::new()),
        }
    }

    /// Returns true if a URL with the same canonical form has been marked
    pub fn is_seen(&self, url: &str) -> bool {
        let fp = fingerprint(url);
        self.seen.read().unwrap().contains(&fp)
    }

    /// Marks a URL as seen. Idempotent.
    pub fn mark_seen(&self, url: &str) {
        let fp = fingerprint(url);
        self.seen.write().unwrap().insert(fp);
    }

    /// Returns the number of unique canonical URLs seen
    pub fn len(&self) -> usize {
        self.seen.read().unwrap().len()
    }

    /// Returns true if nothing has been marked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all fingerprints, for checkpoint serialization
    pub fn export(&self) -> Vec<Fingerprint> {
        self.seen.read().unwrap().iter().copied().collect()
    }

    /// Merges fingerprints into the set, for checkpoint restore
    pub fn import(&self, fingerprints: impl IntoIterator<Item = Fingerprint>) {
        let mut seen = self.seen.write().unwrap();
        for fp in fingerprints {
            seen.insert(fp);
        }
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_initially() {
        let dedup = DedupSet::new();
        assert!(!dedup.is_seen("http://example.com/a"));
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_mark_then_seen() {
        let dedup = DedupSet::new();
        dedup.mark_seen("http://example.com/a");
        assert!(dedup.is_seen("http://example.com/a"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_mark_idempotent() {
        let dedup = DedupSet::new();
        dedup.mark_seen("http://example.com/a");
        dedup.mark_seen("http://example.com/a");
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_canonical_variants_collide() {
        let dedup = DedupSet::new();
        dedup.mark_seen("http://example.com/p?b=2&a=1");
        assert!(dedup.is_seen("http://EXAMPLE.com/p/?a=1&b=2"));
        assert!(dedup.is_seen("http://example.com:80/p?a=1&b=2#frag"));
        assert!(!dedup.is_seen("http://example.com/p?a=1&b=3"));
    }

    #[test]
    fn test_monotonic_membership() {
        let dedup = DedupSet::new();
        let urls: Vec<String> = (0..50)
            .map(|i| format!("http://example.com/{}", i))
            .collect();
        for u in &urls {
            dedup.mark_seen(u);
        }
        for u in &urls {
            assert!(dedup.is_seen(u));
        }
        assert_eq!(dedup.len(), 50);
    }

    #[test]
    fn test_export_import_round_trip() {
        let a = DedupSet::new();
        a.mark_seen("http://example.com/1");
        a.mark_seen("http://example.com/2");

        let b = DedupSet::new();
        b.mark_seen("http://example.com/3");
        b.import(a.export());

        assert_eq!(b.len(), 3);
        assert!(b.is_seen("http://example.com/1"));
        assert!(b.is_seen("http://example.com/2"));
        assert!(b.is_seen("http://example.com/3"));
    }

    #[test]
    fn test_concurrent_checkers_and_inserters() {
        use std::sync::Arc;

        let dedup = Arc::new(DedupSet::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let d = Arc::clone(&dedup);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let url = format!("http://example.com/{}/{}", t, i);
                    d.mark_seen(&url);
                    assert!(d.is_seen(&url));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(dedup.len(), 400);
    }
}
