//! Crawl statistics counters
//!
//! All counters are lock-free atomics. `snapshot` takes independent loads,
//! so values observed together may be mutually skewed by a few operations;
//! each counter on its own is monotonic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Atomic counters for a single crawl run
#[derive(Debug, Default)]
pub struct Stats {
    pub requests_sent: AtomicU64,
    pub requests_failed: AtomicU64,
    pub responses_ok: AtomicU64,
    pub responses_error: AtomicU64,
    pub items_scraped: AtomicU64,
    pub items_dropped: AtomicU64,
    pub urls_enqueued: AtomicU64,
    pub urls_filtered: AtomicU64,
    pub bytes_downloaded: AtomicU64,
    pub active_workers: AtomicUsize,
    started_at: OnceLock<Instant>,
}

/// A point-in-time copy of the counters, also the checkpoint `stats` field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub responses_ok: u64,
    pub responses_error: u64,
    pub items_scraped: u64,
    pub items_dropped: u64,
    pub urls_enqueued: u64,
    pub urls_filtered: u64,
    pub bytes_downloaded: u64,
    #[serde(default)]
    pub active_workers: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the crawl start instant. Later calls are no-ops.
    pub fn mark_started(&self) {
        let _ = self.started_at.set(Instant::now());
    }

    /// Time since `mark_started`, or zero if the crawl never started
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            responses_ok: self.responses_ok.load(Ordering::Relaxed),
            responses_error: self.responses_error.load(Ordering::Relaxed),
            items_scraped: self.items_scraped.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            urls_enqueued: self.urls_enqueued.load(Ordering::Relaxed),
            urls_filtered: self.urls_filtered.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed) as u64,
        }
    }

    /// Restores counters from a checkpoint snapshot
    ///
    /// `active_workers` is transient state and is not restored.
    pub fn restore(&self, snapshot: &StatsSnapshot) {
        self.requests_sent
            .store(snapshot.requests_sent, Ordering::Relaxed);
        self.requests_failed
            .store(snapshot.requests_failed, Ordering::Relaxed);
        self.responses_ok
            .store(snapshot.responses_ok, Ordering::Relaxed);
        self.responses_error
            .store(snapshot.responses_error, Ordering::Relaxed);
        self.items_scraped
            .store(snapshot.items_scraped, Ordering::Relaxed);
        self.items_dropped
            .store(snapshot.items_dropped, Ordering::Relaxed);
        self.urls_enqueued
            .store(snapshot.urls_enqueued, Ordering::Relaxed);
        self.urls_filtered
            .store(snapshot.urls_filtered, Ordering::Relaxed);
        self.bytes_downloaded
            .store(snapshot.bytes_downloaded, Ordering::Relaxed);
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sent={} ok={} err={} failed={} items={} dropped={} enqueued={} filtered={} bytes={}",
            self.requests_sent,
            self.responses_ok,
            self.responses_error,
            self.requests_failed,
            self.items_scraped,
            self.items_dropped,
            self.urls_enqueued,
            self.urls_filtered,
            self.bytes_downloaded,
        )
    }
}
