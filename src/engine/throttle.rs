//! Per-authority politeness throttling
//!
//! `gate` blocks the calling worker until the politeness delay has elapsed
//! since the last gated call for that authority. Entries are created lazily
//! and each holds its own async lock, so waiting on one slow authority never
//! blocks workers fetching from other hosts, and never touches the frontier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct ThrottleEntry {
    last_fetch: Option<Instant>,
}

/// Enforces a minimum inter-request gap per authority (`host[:port]`)
pub struct DomainThrottle {
    delay: Duration,
    entries: Mutex<HashMap<String, Arc<tokio::sync::Mutex<ThrottleEntry>>>>,
}

impl DomainThrottle {
    /// Creates a throttle with the configured politeness delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until the authority may be fetched again, then records now as
    /// its last-fetch time
    ///
    /// The effective delay is the larger of the configured politeness delay
    /// and `extra_delay` (the origin's robots crawl-delay). Callers gate
    /// after dequeue and before fetching.
    pub async fn gate(&self, authority: &str, extra_delay: Duration) {
        let delay = self.delay.max(extra_delay);
        if delay.is_zero() {
            return;
        }

        let entry = self.entry(authority);
        // Holding the entry lock across the sleep serializes callers for
        // this one authority, which is exactly the politeness contract.
        let mut guard = entry.lock().await;
        if let Some(last) = guard.last_fetch {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        guard.last_fetch = Some(Instant::now());
    }

    fn entry(&self, authority: &str) -> Arc<tokio::sync::Mutex<ThrottleEntry>> {
        let mut entries = self.entries.lock().unwrap();
        Arc::clone(
            entries
                .entry(authority.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(ThrottleEntry::default()))),
        )
    }

    /// Number of authorities seen so far
    pub fn tracked_authorities(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_delay_never_blocks() {
        let throttle = DomainThrottle::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            throttle.gate("example.com", Duration::ZERO).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        // Zero-delay gating records nothing
        assert_eq!(throttle.tracked_authorities(), 0);
    }

    #[tokio::test]
    async fn test_gate_enforces_minimum_gap() {
        let throttle = DomainThrottle::new(Duration::from_millis(100));
        let start = Instant::now();
        throttle.gate("example.com", Duration::ZERO).await;
        throttle.gate("example.com", Duration::ZERO).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_different_authorities_independent() {
        let throttle = DomainThrottle::new(Duration::from_millis(200));
        let start = Instant::now();
        throttle.gate("a.example.com", Duration::ZERO).await;
        throttle.gate("b.example.com", Duration::ZERO).await;
        // Second authority is not delayed by the first
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(throttle.tracked_authorities(), 2);
    }

    #[tokio::test]
    async fn test_robots_delay_extends_gap() {
        let throttle = DomainThrottle::new(Duration::from_millis(10));
        let start = Instant::now();
        throttle.gate("example.com", Duration::from_millis(120)).await;
        throttle.gate("example.com", Duration::from_millis(120)).await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_serialized() {
        let throttle = Arc::new(DomainThrottle::new(Duration::from_millis(50)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let t = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                t.gate("example.com", Duration::ZERO).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Three gated fetches to one authority take at least two gaps
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
