//! The frontier: a deterministic, concurrency-safe priority queue of
//! pending `WorkItem`s, ordered ascending by `OrderKey`.
//!
//! Backed by a `BinaryHeap` (a max-heap) wrapped so it behaves as a
//! min-heap over `OrderKey` — the standard `Reverse` idiom. Enqueue is
//! synchronous (a short `std::sync::Mutex` critical section) followed by an
//! async notification send that applies backpressure; dequeue is async and
//! cancellation-aware so workers can be woken by either "work arrived" or
//! "the run is shutting down".

use crate::error::{EngineError, Result};
use crate::work_item::WorkItem;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct HeapEntry<S>(WorkItem<S>);

impl<S> PartialEq for HeapEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        self.0.order_key == other.0.order_key
    }
}
impl<S> Eq for HeapEntry<S> {}

impl<S> PartialOrd for HeapEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for HeapEntry<S> {
    /// Reversed: `BinaryHeap` pops the greatest element, and we want the
    /// smallest `OrderKey` out first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.order_key.cmp(&self.0.order_key)
    }
}

/// Deterministic priority queue of pending work, shared across the worker
/// pool via `Arc<Frontier<S>>`.
pub struct Frontier<S> {
    heap: Mutex<BinaryHeap<HeapEntry<S>>>,
    notify_tx: mpsc::Sender<()>,
    notify_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
    backpressure_timeout: std::time::Duration,
}

impl<S> Frontier<S> {
    pub fn new(queue_depth: usize, backpressure_timeout: std::time::Duration) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(queue_depth);
        Frontier {
            heap: Mutex::new(BinaryHeap::new()),
            notify_tx,
            notify_rx: tokio::sync::Mutex::new(notify_rx),
            backpressure_timeout,
        }
    }

    /// Pushes `item` onto the heap, then sends a wake-up notification. The
    /// notification send respects `backpressure_timeout`, giving producers
    /// (the reducer pipeline expanding successors) a bounded wait rather
    /// than unbounded blocking when the worker pool is saturated.
    pub async fn enqueue(&self, item: WorkItem<S>) -> Result<()> {
        let node_id = item.node_id.clone();
        {
            let mut heap = self.heap.lock().expect("frontier heap mutex poisoned");
            heap.push(HeapEntry(item));
        }
        match timeout(self.backpressure_timeout, self.notify_tx.send(())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(EngineError::Canceled),
            Err(_) => Err(EngineError::Backpressure(node_id)),
        }
    }

    /// Blocks until either a token arrives or `cancel` fires, then pops the
    /// heap minimum. Receiving before popping (never the reverse) is what
    /// keeps `|heap| ≥ |pending notifications|`: a pop that ran ahead of its
    /// token would let the channel's pending-token count outlive the heap
    /// entries it's supposed to track, and under sustained throughput
    /// (heap rarely empty) unconsumed tokens would pile up until
    /// `notify_tx` saturates and unrelated enqueues start timing out with a
    /// spurious `ErrBackpressure`.
    /// Returns `None` on cancellation with nothing left to dequeue.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<WorkItem<S>> {
        let mut rx = self.notify_rx.lock().await;
        let notified = tokio::select! {
            _ = cancel.cancelled() => return None,
            notified = rx.recv() => notified,
        };
        if notified.is_none() {
            return None;
        }
        drop(rx);

        let mut heap = self.heap.lock().expect("frontier heap mutex poisoned");
        Some(
            heap.pop()
                .expect("frontier invariant violated: token received but heap was empty")
                .0,
        )
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("frontier heap mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Clone> Frontier<S> {
    /// Read-only, ascending-`OrderKey` copy of everything currently queued,
    /// for checkpoint commits. Does not pop — callers never observe fewer
    /// items than are actually in the heap.
    pub fn snapshot(&self) -> Vec<WorkItem<S>> {
        let heap = self.heap.lock().expect("frontier heap mutex poisoned");
        let mut items: Vec<WorkItem<S>> = heap.iter().map(|entry| entry.0.clone()).collect();
        items.sort_by_key(|item| item.order_key);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfgraph_checkpoint::{OrderKey, StepId};

    fn item(order_key: u64) -> WorkItem<i32> {
        WorkItem {
            seq: StepId(order_key),
            order_key: OrderKey(order_key),
            path_hash: [0u8; 32],
            node_id: "n".to_string(),
            state: 0,
            attempt: 1,
            parent_node_id: None,
            edge_index: 0,
        }
    }

    #[tokio::test]
    async fn dequeues_in_ascending_order_key_order() {
        let frontier = Frontier::new(16, std::time::Duration::from_secs(1));
        frontier.enqueue(item(5)).await.unwrap();
        frontier.enqueue(item(1)).await.unwrap();
        frontier.enqueue(item(3)).await.unwrap();

        let cancel = CancellationToken::new();
        let first = frontier.dequeue(&cancel).await.unwrap();
        let second = frontier.dequeue(&cancel).await.unwrap();
        let third = frontier.dequeue(&cancel).await.unwrap();

        assert_eq!(first.order_key, OrderKey(1));
        assert_eq!(second.order_key, OrderKey(3));
        assert_eq!(third.order_key, OrderKey(5));
    }

    #[tokio::test]
    async fn dequeue_returns_none_on_cancellation_when_empty() {
        let frontier: Frontier<i32> = Frontier::new(16, std::time::Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(frontier.dequeue(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn len_reflects_pending_items() {
        let frontier = Frontier::new(16, std::time::Duration::from_secs(1));
        assert_eq!(frontier.len(), 0);
        frontier.enqueue(item(1)).await.unwrap();
        assert_eq!(frontier.len(), 1);
        let cancel = CancellationToken::new();
        frontier.dequeue(&cancel).await.unwrap();
        assert_eq!(frontier.len(), 0);
    }
}
