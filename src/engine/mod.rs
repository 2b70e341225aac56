//! The crawl engine
//!
//! The engine owns the frontier, dedup set, robots cache, domain throttle,
//! and statistics, and runs the worker pool plus the item pipeline and
//! storage tasks. It is an explicit value constructed from configuration;
//! there is no process-wide singleton.
//!
//! Lifecycle is a small state machine driven by compare-and-swap on an
//! atomic cell:
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Stopping -> Stopped
//! ```

pub mod checkpoint;
mod dedup;
mod frontier;
pub mod request;
mod response;
mod robots;
mod scheduler;
mod stats;
mod throttle;

pub use checkpoint::{Checkpointer, DEFAULT_CHECKPOINT_DIR};
pub use dedup::DedupSet;
pub use frontier::Frontier;
pub use request::Request;
pub use response::Response;
pub use robots::{RobotsCache, RobotsPolicy};
pub use stats::{Stats, StatsSnapshot};
pub use throttle::DomainThrottle;

use crate::config::Config;
use crate::fetcher::{Fetch, HttpFetcher};
use crate::pipeline::{Item, Pipeline};
use crate::storage::Storage;
use crate::{KumoError, Result};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Stopping = 3,
    Stopped = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why admission rejected a URL
///
/// These are expected control flow, not failures: each increments the
/// `urls_filtered` counter and drops the URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("duplicate URL: {0}")]
    Duplicate(String),

    #[error("blocked by robots.txt: {0}")]
    BlockedByRobots(String),

    #[error("max depth exceeded: {depth} > {max_depth}")]
    MaxDepthExceeded { depth: u32, max_depth: u32 },

    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl AdmissionError {
    /// Stable error kind string for the CLI / SDK surface
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate",
            Self::BlockedByRobots(_) => "blocked-by-robots",
            Self::MaxDepthExceeded { .. } => "max-depth-exceeded",
            Self::DomainNotAllowed(_) => "domain-not-allowed",
            Self::InvalidUrl(_) => "invalid-url",
        }
    }
}

/// What a response callback produced
#[derive(Debug, Default)]
pub struct CallbackOutcome {
    pub items: Vec<Item>,
    pub requests: Vec<Request>,
}

/// Error type returned by response callbacks
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// A response processing stage
///
/// Every registered callback runs on every successful response. Items and
/// discovered requests accumulate across callbacks; callback errors are
/// logged and never abort the crawl.
pub trait ResponseCallback: Send + Sync {
    fn on_response(&self, response: &Response) -> std::result::Result<CallbackOutcome, CallbackError>;
}

impl<F> ResponseCallback for F
where
    F: Fn(&Response) -> std::result::Result<CallbackOutcome, CallbackError> + Send + Sync,
{
    fn on_response(&self, response: &Response) -> std::result::Result<CallbackOutcome, CallbackError> {
        self(response)
    }
}

/// State shared between the engine facade, its workers, and handles
pub(crate) struct EngineShared {
    pub(crate) config: Config,
    pub(crate) frontier: Frontier,
    pub(crate) dedup: DedupSet,
    pub(crate) robots: RobotsCache,
    pub(crate) throttle: DomainThrottle,
    pub(crate) stats: Stats,
    pub(crate) callbacks: RwLock<Vec<(String, Arc<dyn ResponseCallback>)>>,
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) cancel: CancellationToken,
    pub(crate) paused: AtomicBool,
    state: AtomicU8,
}

impl EngineShared {
    pub(crate) fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set_state(&self, to: EngineState) {
        self.state.store(to as u8, Ordering::SeqCst);
    }

    /// Transitions to Stopping, closes the frontier, and cancels in-flight
    /// fetches. No-op unless the engine is Running or Paused.
    pub(crate) fn stop(&self) {
        let stopping = self.transition(EngineState::Running, EngineState::Stopping)
            || self.transition(EngineState::Paused, EngineState::Stopping);
        if !stopping {
            return;
        }
        tracing::info!("engine stopping");
        // Close the frontier first so workers holding no request observe
        // closure and exit, then abort whatever is in flight
        self.frontier.close();
        self.cancel.cancel();
    }

    /// Admission: depth, dedup, robots, domain filter, in that order
    pub(crate) async fn admit(&self, request: Request) -> std::result::Result<(), AdmissionError> {
        let engine_cfg = &self.config.engine;

        if request.depth > engine_cfg.max_depth {
            self.filtered(&request, "max-depth-exceeded");
            return Err(AdmissionError::MaxDepthExceeded {
                depth: request.depth,
                max_depth: engine_cfg.max_depth,
            });
        }

        if self.dedup.is_seen(request.url_str()) {
            self.filtered(&request, "duplicate");
            return Err(AdmissionError::Duplicate(request.url_str().to_string()));
        }

        if engine_cfg.respect_robots && !self.robots.is_allowed(&request.url).await {
            self.filtered(&request, "blocked-by-robots");
            return Err(AdmissionError::BlockedByRobots(request.url_str().to_string()));
        }

        let authority = request.authority();
        if !self.is_domain_allowed(&authority) {
            self.filtered(&request, "domain-not-allowed");
            return Err(AdmissionError::DomainNotAllowed(authority));
        }

        self.dedup.mark_seen(request.url_str());
        self.stats.urls_enqueued.fetch_add(1, Ordering::Relaxed);
        self.frontier.push(request);
        Ok(())
    }

    fn filtered(&self, request: &Request, reason: &'static str) {
        self.stats.urls_filtered.fetch_add(1, Ordering::Relaxed);
        tracing::info!(url = %request.url, reason, "url filtered");
    }

    fn is_domain_allowed(&self, authority: &str) -> bool {
        let engine_cfg = &self.config.engine;
        if !engine_cfg.allowed_domains.is_empty() {
            return engine_cfg.allowed_domains.iter().any(|d| d == authority);
        }
        !engine_cfg.disallowed_domains.iter().any(|d| d == authority)
    }
}

/// A cloneable control handle onto a running engine
///
/// Handles expose lifecycle control and statistics without owning the
/// engine, e.g. for signal handlers.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn pause(&self) {
        if self.shared.transition(EngineState::Running, EngineState::Paused) {
            self.shared.paused.store(true, Ordering::SeqCst);
            tracing::info!("engine paused");
        }
    }

    pub fn resume(&self) {
        if self.shared.transition(EngineState::Paused, EngineState::Running) {
            self.shared.paused.store(false, Ordering::SeqCst);
            tracing::info!("engine resumed");
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

/// The core crawler orchestrator
pub struct Engine {
    shared: Arc<EngineShared>,
    checkpointer: Checkpointer,
    pipeline: Mutex<Option<Pipeline>>,
    storage: Mutex<Option<Box<dyn Storage>>>,
    item_tx: Mutex<Option<mpsc::Sender<Item>>>,
    crawl_handles: Mutex<Vec<JoinHandle<()>>>,
    checkpoint_handle: Mutex<Option<JoinHandle<()>>>,
    processing_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Creates an engine with the default HTTP fetcher
    pub fn new(config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Creates an engine with a custom fetcher implementation
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let robots = RobotsCache::new(
            config.engine.respect_robots,
            config.engine.primary_user_agent(),
        )?;
        let throttle = DomainThrottle::new(config.engine.politeness_delay());
        let checkpointer = Checkpointer::new(&config.engine.checkpoint_dir);

        let shared = Arc::new(EngineShared {
            frontier: Frontier::new(),
            dedup: DedupSet::new(),
            robots,
            throttle,
            stats: Stats::new(),
            callbacks: RwLock::new(Vec::new()),
            fetcher,
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            state: AtomicU8::new(EngineState::Idle as u8),
            config,
        });

        Ok(Self {
            shared,
            checkpointer,
            pipeline: Mutex::new(None),
            storage: Mutex::new(None),
            item_tx: Mutex::new(None),
            crawl_handles: Mutex::new(Vec::new()),
            checkpoint_handle: Mutex::new(None),
            processing_handles: Mutex::new(Vec::new()),
        })
    }

    /// Returns a cloneable control handle
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Sets the item pipeline. Takes effect at `start`.
    pub fn set_pipeline(&self, pipeline: Pipeline) {
        *self.pipeline.lock().unwrap() = Some(pipeline);
    }

    /// Sets the storage backend. Takes effect at `start`.
    pub fn set_storage(&self, storage: Box<dyn Storage>) {
        *self.storage.lock().unwrap() = Some(storage);
    }

    /// Registers a named response callback
    ///
    /// Callbacks run on every response in registration order. Registering
    /// under an existing name replaces that callback in place; in-flight
    /// responses may still see the old one.
    pub fn on_response(&self, name: impl Into<String>, callback: Arc<dyn ResponseCallback>) {
        let name = name.into();
        let mut callbacks = self.shared.callbacks.write().unwrap();
        match callbacks.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = callback,
            None => callbacks.push((name, callback)),
        }
    }

    /// Admits a seed URL at depth 0 with highest priority
    pub async fn add_seed(&self, url: &str) -> std::result::Result<(), AdmissionError> {
        let request = match Request::new(url) {
            Ok(r) => r
                .with_priority(request::PRIORITY_HIGHEST)
                .with_max_retries(self.shared.config.engine.max_retries),
            Err(error) => {
                self.shared.stats.urls_filtered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(url, reason = "invalid-url", "seed rejected");
                return Err(AdmissionError::InvalidUrl(format!("{}: {}", url, error)));
            }
        };
        self.shared.admit(request).await
    }

    /// Admits an arbitrary request
    pub async fn add_request(&self, request: Request) -> std::result::Result<(), AdmissionError> {
        self.shared.admit(request).await
    }

    /// Starts the crawl: worker pool, pipeline, storage, and checkpointing
    ///
    /// Fails if the engine is not Idle or if admission rejected every seed.
    pub fn start(&self) -> Result<()> {
        if !self.shared.transition(EngineState::Idle, EngineState::Running) {
            return Err(KumoError::InvalidState {
                state: self.shared.state(),
                operation: "start",
            });
        }

        if self.shared.frontier.is_empty() {
            self.shared.set_state(EngineState::Idle);
            return Err(KumoError::NoSeeds);
        }

        let engine_cfg = &self.shared.config.engine;
        let concurrency = engine_cfg.concurrency;
        tracing::info!(
            concurrency,
            max_depth = engine_cfg.max_depth,
            respect_robots = engine_cfg.respect_robots,
            seeds = self.shared.frontier.len(),
            "engine starting"
        );

        self.shared.stats.mark_started();

        let buffer = concurrency * 10;
        let (item_tx, item_rx) = mpsc::channel::<Item>(buffer);
        let (result_tx, result_rx) = mpsc::channel::<Item>(buffer);

        let pipeline = self.pipeline.lock().unwrap().take();
        let storage = self.storage.lock().unwrap().take();
        let batch_size = self.shared.config.storage.batch_size;

        {
            let mut processing = self.processing_handles.lock().unwrap();
            processing.push(tokio::spawn(process_items(
                pipeline,
                item_rx,
                result_tx,
                Arc::clone(&self.shared),
            )));
            processing.push(tokio::spawn(store_results(storage, result_rx, batch_size)));
        }

        let idle_workers = Arc::new(AtomicUsize::new(0));
        {
            let mut crawl = self.crawl_handles.lock().unwrap();
            for worker_id in 0..concurrency {
                crawl.push(tokio::spawn(scheduler::worker(
                    Arc::clone(&self.shared),
                    item_tx.clone(),
                    Arc::clone(&idle_workers),
                    worker_id,
                )));
            }
            crawl.push(tokio::spawn(scheduler::idle_monitor(
                Arc::clone(&self.shared),
                idle_workers,
                concurrency,
            )));
        }

        if let Some(interval) = engine_cfg.checkpoint_interval() {
            let checkpointer = Checkpointer::new(self.checkpointer.dir());
            *self.checkpoint_handle.lock().unwrap() = Some(tokio::spawn(checkpoint_loop(
                Arc::clone(&self.shared),
                checkpointer,
                interval,
            )));
        }

        *self.item_tx.lock().unwrap() = Some(item_tx);
        Ok(())
    }

    /// Blocks until the crawl has fully drained, then reports statistics
    ///
    /// Join order matters: workers first, then the checkpoint task, then the
    /// item channel is closed so the pipeline and storage tasks can flush.
    /// A final checkpoint is written after everything has settled.
    pub async fn wait(&self) -> StatsSnapshot {
        if self.shared.state() == EngineState::Idle {
            return self.shared.stats.snapshot();
        }

        let crawl_handles: Vec<_> = std::mem::take(&mut *self.crawl_handles.lock().unwrap());
        for handle in crawl_handles {
            let _ = handle.await;
        }

        // Workers are done; stop the checkpoint ticker and anything else
        // still listening on the token
        self.shared.cancel.cancel();
        let checkpoint_handle = self.checkpoint_handle.lock().unwrap().take();
        if let Some(handle) = checkpoint_handle {
            let _ = handle.await;
        }

        // Dropping the engine's sender closes the item channel once the
        // last worker clone is gone, letting the pipeline drain
        *self.item_tx.lock().unwrap() = None;
        let processing_handles: Vec<_> =
            std::mem::take(&mut *self.processing_handles.lock().unwrap());
        for handle in processing_handles {
            let _ = handle.await;
        }

        if self.shared.config.engine.checkpoint_interval().is_some() {
            if let Err(error) = self.save_checkpoint() {
                tracing::error!(%error, "final checkpoint save failed");
            }
        }

        self.shared.set_state(EngineState::Stopped);
        let snapshot = self.shared.stats.snapshot();
        tracing::info!(stats = %snapshot, elapsed = ?self.shared.stats.elapsed(), "engine stopped");
        snapshot
    }

    /// Requests a graceful stop; no-op unless Running or Paused
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Pauses dispatch; no-op unless Running
    pub fn pause(&self) {
        self.handle().pause();
    }

    /// Resumes dispatch; no-op unless Paused
    pub fn resume(&self) {
        self.handle().resume();
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Writes a checkpoint of the current crawl state
    pub fn save_checkpoint(&self) -> Result<()> {
        self.checkpointer
            .save(&self.shared.frontier, &self.shared.dedup, &self.shared.stats)
    }

    /// Restores frontier, dedup set, and counters from the checkpoint file
    ///
    /// Returns false when no checkpoint exists. Meant to be called before
    /// `start` on a fresh engine.
    pub fn restore_checkpoint(&self) -> Result<bool> {
        let Some(data) = self.checkpointer.load()? else {
            return Ok(false);
        };

        self.shared.dedup.import(
            data.seen_hashes
                .iter()
                .filter_map(|h| checkpoint::decode_fingerprint(h)),
        );

        let max_retries = self.shared.config.engine.max_retries;
        let mut requests = Vec::with_capacity(data.frontier_urls.len());
        for entry in data.frontier_urls {
            let Ok(request) = Request::new(&entry.url) else {
                tracing::warn!(url = %entry.url, "skipping malformed checkpoint entry");
                continue;
            };
            let mut request = request
                .with_depth(entry.depth)
                .with_priority(entry.priority)
                .with_max_retries(max_retries);
            request.parent_url = entry.parent_url;
            requests.push(request);
        }

        let restored = requests.len();
        self.shared.frontier.restore_all(requests);
        self.shared.stats.restore(&data.stats);

        tracing::info!(
            frontier = restored,
            seen = data.seen_hashes.len(),
            saved_at = %data.timestamp,
            "checkpoint restored"
        );
        Ok(true)
    }

    /// Number of requests currently queued in the frontier
    pub fn frontier_len(&self) -> usize {
        self.shared.frontier.len()
    }

    /// Number of unique canonical URLs marked seen
    pub fn seen_count(&self) -> usize {
        self.shared.dedup.len()
    }

    /// True if a checkpoint file exists in the configured directory
    pub fn has_checkpoint(&self) -> bool {
        self.checkpointer.has_checkpoint()
    }

    /// Removes any existing checkpoint file
    pub fn clean_checkpoint(&self) -> Result<()> {
        self.checkpointer.clean()
    }
}

/// Funnels items through the pipeline one at a time in arrival order
async fn process_items(
    pipeline: Option<Pipeline>,
    mut item_rx: mpsc::Receiver<Item>,
    result_tx: mpsc::Sender<Item>,
    shared: Arc<EngineShared>,
) {
    while let Some(item) = item_rx.recv().await {
        let processed = match &pipeline {
            Some(pipeline) => match pipeline.process(item) {
                Ok(Some(item)) => item,
                Ok(None) => {
                    shared.stats.items_dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                Err(error) => {
                    shared.stats.items_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%error, "pipeline dropped item");
                    continue;
                }
            },
            None => item,
        };

        shared.stats.items_scraped.fetch_add(1, Ordering::Relaxed);
        if result_tx.send(processed).await.is_err() {
            break;
        }
    }
}

/// Batches processed items into the storage backend
async fn store_results(
    mut storage: Option<Box<dyn Storage>>,
    mut result_rx: mpsc::Receiver<Item>,
    batch_size: usize,
) {
    let mut batch: Vec<Item> = Vec::with_capacity(batch_size);

    while let Some(item) = result_rx.recv().await {
        batch.push(item);
        if batch.len() >= batch_size {
            flush_batch(&mut storage, &mut batch);
        }
    }
    flush_batch(&mut storage, &mut batch);

    if let Some(storage) = storage.as_mut() {
        if let Err(error) = storage.close() {
            tracing::error!(%error, backend = storage.name(), "storage close error");
        }
    }
}

fn flush_batch(storage: &mut Option<Box<dyn Storage>>, batch: &mut Vec<Item>) {
    if batch.is_empty() {
        return;
    }
    if let Some(storage) = storage.as_mut() {
        if let Err(error) = storage.store(batch) {
            tracing::error!(%error, batch = batch.len(), "storage error");
        }
    }
    batch.clear();
}

/// Periodically saves crawl state until cancelled
async fn checkpoint_loop(
    shared: Arc<EngineShared>,
    checkpointer: Checkpointer,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match checkpointer.save(&shared.frontier, &shared.dedup, &shared.stats) {
            Ok(()) => tracing::debug!("checkpoint saved"),
            Err(error) => tracing::error!(%error, "checkpoint save failed"),
        }
    }
}
