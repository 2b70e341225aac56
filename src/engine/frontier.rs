//! The crawl frontier: a priority queue of admitted requests
//!
//! The frontier is keyed on (priority, insertion order): lower priority
//! values pop first, and within one priority class requests pop in the order
//! they were pushed. A closed frontier silently drops further pushes, which
//! is how shutdown quiesces workers without losing already-queued requests
//! from checkpoints.

use crate::engine::Request;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// A frontier entry carrying the tie-breaking sequence number
#[derive(Debug)]
struct QueuedRequest {
    priority: i32,
    seq: u64,
    request: Request,
}

// Reverse comparison so the BinaryHeap (a max-heap) pops the lowest
// (priority, seq) pair first.
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedRequest {}

struct FrontierInner {
    heap: BinaryHeap<QueuedRequest>,
    next_seq: u64,
    closed: bool,
}

/// Thread-safe priority queue of crawl requests
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    /// Creates an empty, open frontier
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                heap: BinaryHeap::with_capacity(1024),
                next_seq: 0,
                closed: false,
            }),
        }
    }

    /// Inserts a request. No-op if the frontier is closed.
    pub fn push(&self, request: Request) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(QueuedRequest {
            priority: request.priority,
            seq,
            request,
        });
    }

    /// Non-blocking dequeue of the highest-priority request
    pub fn try_pop(&self) -> Option<Request> {
        let mut inner = self.inner.lock().unwrap();
        inner.heap.pop().map(|entry| entry.request)
    }

    /// Returns the number of queued requests
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    /// Returns true if no requests are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the frontier closed. Irreversible.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    /// Returns true if the frontier has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Returns a copy of all queued requests without removing them
    ///
    /// Safe to call during a running crawl; used by the checkpointer.
    pub fn snapshot(&self) -> Vec<Request> {
        let inner = self.inner.lock().unwrap();
        inner.heap.iter().map(|e| e.request.clone()).collect()
    }

    /// Removes and returns all queued requests in pop order
    pub fn drain(&self) -> Vec<Request> {
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(inner.heap.len());
        while let Some(entry) = inner.heap.pop() {
            out.push(entry.request);
        }
        out
    }

    /// Bulk insert, used for checkpoint restore
    ///
    /// Unlike `push`, restore succeeds even on a closed frontier so state
    /// can be loaded into a fresh engine before `start`.
    pub fn restore_all(&self, requests: Vec<Request>) {
        let mut inner = self.inner.lock().unwrap();
        for request in requests {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(QueuedRequest {
                priority: request.priority,
                seq,
                request,
            });
        }
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::request::{PRIORITY_HIGHEST, PRIORITY_LOW, PRIORITY_NORMAL};

    fn req(url: &str, priority: i32) -> Request {
        Request::new(url).unwrap().with_priority(priority)
    }

    #[test]
    fn test_push_pop_single() {
        let frontier = Frontier::new();
        frontier.push(req("http://example.com/a", PRIORITY_NORMAL));

        assert_eq!(frontier.len(), 1);
        let popped = frontier.try_pop().unwrap();
        assert_eq!(popped.url_str(), "http://example.com/a");
        assert!(frontier.try_pop().is_none());
    }

    #[test]
    fn test_priority_ordering() {
        let frontier = Frontier::new();
        frontier.push(req("http://example.com/low", PRIORITY_LOW));
        frontier.push(req("http://example.com/high", PRIORITY_HIGHEST));
        frontier.push(req("http://example.com/normal", PRIORITY_NORMAL));

        assert_eq!(frontier.try_pop().unwrap().url_str(), "http://example.com/high");
        assert_eq!(
            frontier.try_pop().unwrap().url_str(),
            "http://example.com/normal"
        );
        assert_eq!(frontier.try_pop().unwrap().url_str(), "http://example.com/low");
    }

    #[test]
    fn test_fifo_within_priority_class() {
        let frontier = Frontier::new();
        for i in 0..20 {
            frontier.push(req(&format!("http://example.com/{}", i), PRIORITY_NORMAL));
        }
        for i in 0..20 {
            let popped = frontier.try_pop().unwrap();
            assert_eq!(popped.url_str(), format!("http://example.com/{}", i));
        }
    }

    #[test]
    fn test_pop_sequence_sorted() {
        // Popping N requests yields a sequence sorted ascending by priority
        // with ties broken by insertion order.
        let frontier = Frontier::new();
        let priorities = [3, 0, 2, 0, 4, 1, 2, 3, 0, 1];
        for (i, p) in priorities.iter().enumerate() {
            frontier.push(req(&format!("http://example.com/{}", i), *p));
        }

        let mut last: Option<(i32, usize)> = None;
        while let Some(popped) = frontier.try_pop() {
            let idx: usize = popped
                .url
                .path()
                .trim_start_matches('/')
                .parse()
                .unwrap();
            if let Some((prev_priority, prev_idx)) = last {
                assert!(popped.priority >= prev_priority);
                if popped.priority == prev_priority {
                    assert!(idx > prev_idx, "FIFO violated within priority class");
                }
            }
            last = Some((popped.priority, idx));
        }
    }

    #[test]
    fn test_push_after_close_dropped() {
        let frontier = Frontier::new();
        frontier.close();
        assert!(frontier.is_closed());

        frontier.push(req("http://example.com/a", PRIORITY_NORMAL));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_pop_after_close_drains_remaining() {
        let frontier = Frontier::new();
        frontier.push(req("http://example.com/a", PRIORITY_NORMAL));
        frontier.close();

        // Close stops pushes, not pops: already-queued work is still handed out
        assert!(frontier.try_pop().is_some());
        assert!(frontier.try_pop().is_none());
    }

    #[test]
    fn test_snapshot_leaves_queue_intact() {
        let frontier = Frontier::new();
        frontier.push(req("http://example.com/a", PRIORITY_NORMAL));
        frontier.push(req("http://example.com/b", PRIORITY_NORMAL));

        let snap = frontier.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_drain_removes_everything() {
        let frontier = Frontier::new();
        frontier.push(req("http://example.com/b", PRIORITY_LOW));
        frontier.push(req("http://example.com/a", PRIORITY_HIGHEST));

        let drained = frontier.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].url_str(), "http://example.com/a");
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_restore_all() {
        let frontier = Frontier::new();
        let requests = vec![
            req("http://example.com/a", PRIORITY_NORMAL),
            req("http://example.com/b", PRIORITY_HIGHEST),
        ];
        frontier.restore_all(requests);

        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.try_pop().unwrap().url_str(), "http://example.com/b");
    }

    #[test]
    fn test_concurrent_push_pop() {
        use std::sync::Arc;

        let frontier = Arc::new(Frontier::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let f = Arc::clone(&frontier);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    f.push(req(
                        &format!("http://example.com/{}/{}", t, i),
                        PRIORITY_NORMAL,
                    ));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut count = 0;
        while frontier.try_pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 400);
    }
}
