//! Worker pool and idle detection
//!
//! Each worker polls the frontier, gates on the domain throttle, fetches,
//! and feeds extraction results back into admission. A separate monitor
//! closes the frontier once every worker has been idle over an empty
//! frontier for a sustained window, which is what ends a finished crawl.

use crate::engine::request::PRIORITY_LOWEST;
use crate::engine::{EngineShared, Request, Response};
use crate::extract::extract_page;
use crate::fetcher::FetchError;
use crate::pipeline::Item;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sleep between empty-frontier poll attempts
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Idle monitor tick
const IDLE_TICK: Duration = Duration::from_millis(200);

/// Consecutive idle observations required before the frontier is closed.
/// The debounce avoids closing while a worker is transiently between
/// dequeue and bookkeeping.
const IDLE_STREAK: u32 = 3;

/// A single crawl worker task
pub(crate) async fn worker(
    shared: Arc<EngineShared>,
    item_tx: mpsc::Sender<Item>,
    idle_workers: Arc<AtomicUsize>,
    worker_id: usize,
) {
    loop {
        // Paused workers hold no request and burn nothing but the poll
        while shared.paused.load(Ordering::Relaxed) {
            if shared.cancel.is_cancelled() {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        idle_workers.fetch_add(1, Ordering::SeqCst);
        let request = loop {
            if let Some(request) = shared.frontier.try_pop() {
                break Some(request);
            }
            if shared.frontier.is_closed() || shared.cancel.is_cancelled() {
                break None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };
        idle_workers.fetch_sub(1, Ordering::SeqCst);

        let Some(request) = request else {
            tracing::debug!(worker = worker_id, "worker exiting");
            return;
        };

        // Politeness gate sits between dequeue and fetch so a slow domain
        // never blocks the frontier
        let authority = request.authority();
        let robots_delay = shared.robots.crawl_delay(&request.url).await;
        shared.throttle.gate(&authority, robots_delay).await;

        shared.stats.active_workers.fetch_add(1, Ordering::Relaxed);
        process_request(&shared, &item_tx, request).await;
        shared.stats.active_workers.fetch_sub(1, Ordering::Relaxed);

        let max_requests = shared.config.engine.max_requests;
        if max_requests > 0 && shared.stats.requests_sent.load(Ordering::Relaxed) >= max_requests {
            tracing::info!(worker = worker_id, "max requests reached, stopping");
            shared.stop();
            return;
        }
    }
}

/// Fetches one request and routes the outcome
async fn process_request(
    shared: &Arc<EngineShared>,
    item_tx: &mpsc::Sender<Item>,
    request: Request,
) {
    shared
        .stats
        .requests_sent
        .fetch_add(1, Ordering::Relaxed);

    match shared.fetcher.fetch(&request, &shared.cancel).await {
        Ok(response) => handle_response(shared, item_tx, response).await,
        Err(error) => handle_fetch_error(shared, request, error).await,
    }
}

/// Runs callbacks (or the default extractor) over a successful response
async fn handle_response(
    shared: &Arc<EngineShared>,
    item_tx: &mpsc::Sender<Item>,
    response: Response,
) {
    shared.stats.responses_ok.fetch_add(1, Ordering::Relaxed);
    shared
        .stats
        .bytes_downloaded
        .fetch_add(response.body.len() as u64, Ordering::Relaxed);

    tracing::debug!(
        url = %response.request.url,
        status = response.status,
        bytes = response.body.len(),
        depth = response.request.depth,
        "fetched"
    );

    // Callbacks are cloned out of the registry so registration during a
    // running crawl never blocks response handling
    let callbacks = shared.callbacks.read().unwrap().clone();

    if callbacks.is_empty() {
        let page = extract_page(&response);
        for item in page.items {
            let _ = item_tx.send(item).await;
        }
        for link in &page.links {
            admit_discovered(shared, &response, link).await;
        }
        return;
    }

    for (name, callback) in &callbacks {
        match callback.on_response(&response) {
            Ok(outcome) => {
                for mut item in outcome.items {
                    item.source = name.clone();
                    item.depth = response.request.depth;
                    let _ = item_tx.send(item).await;
                }
                for mut discovered in outcome.requests {
                    discovered.depth = response.request.depth + 1;
                    discovered.parent_url = Some(response.request.url_str().to_string());
                    if let Err(err) = shared.admit(discovered).await {
                        tracing::debug!(callback = %name, error = %err, "discovered request filtered");
                    }
                }
            }
            Err(error) => {
                tracing::warn!(callback = %name, error = %error, "callback error");
            }
        }
    }
}

/// Builds and admits a request for a link found by the default extractor
async fn admit_discovered(shared: &Arc<EngineShared>, response: &Response, link: &str) {
    let request = match Request::new(link) {
        Ok(r) => r
            .with_depth(response.request.depth + 1)
            .with_parent(response.request.url_str())
            .with_max_retries(shared.config.engine.max_retries),
        Err(error) => {
            shared.stats.urls_filtered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(link = %link, error = %error, "discovered link is not a crawlable URL");
            return;
        }
    };

    if let Err(err) = shared.admit(request).await {
        tracing::debug!(link = %link, reason = err.kind(), "discovered link filtered");
    }
}

/// Applies the retry policy to a failed fetch
async fn handle_fetch_error(shared: &Arc<EngineShared>, request: Request, error: FetchError) {
    if error.is_cancelled() {
        // Shutdown races are expected control flow, not failures
        tracing::debug!(url = %request.url, "fetch cancelled");
        return;
    }

    shared.stats.requests_failed.fetch_add(1, Ordering::Relaxed);

    if error.is_retryable() && request.retry_count < request.max_retries {
        let mut request = request;
        request.retry_count += 1;
        request.priority = PRIORITY_LOWEST;

        tracing::warn!(
            url = %request.url,
            retry = request.retry_count,
            max_retries = request.max_retries,
            error = %error,
            "retrying request"
        );

        // 429: honor Retry-After before the request re-enters the frontier
        if let Some(after) = error.retry_after {
            tokio::select! {
                _ = shared.cancel.cancelled() => {}
                _ = tokio::time::sleep(after) => {}
            }
        }

        shared.frontier.push(request);
        return;
    }

    shared.stats.responses_error.fetch_add(1, Ordering::Relaxed);
    tracing::error!(
        url = %request.url,
        retries = request.retry_count,
        error = %error,
        "fetch failed permanently"
    );
}

/// Closes the frontier once the crawl has quiesced
pub(crate) async fn idle_monitor(
    shared: Arc<EngineShared>,
    idle_workers: Arc<AtomicUsize>,
    worker_count: usize,
) {
    let mut ticker = tokio::time::interval(IDLE_TICK);
    // The first tick of a tokio interval fires immediately
    ticker.tick().await;

    let mut streak = 0;
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                shared.frontier.close();
                return;
            }
            _ = ticker.tick() => {}
        }

        if idle_workers.load(Ordering::SeqCst) >= worker_count && shared.frontier.is_empty() {
            streak += 1;
            if streak >= IDLE_STREAK {
                tracing::info!("all workers idle and frontier empty, crawl complete");
                shared.frontier.close();
                return;
            }
        } else {
            streak = 0;
        }
    }
}
