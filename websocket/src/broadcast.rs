//! Publish/subscribe registry for verdicts.

use kiosk_types::Verdict;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Why a subscriber could not take a verdict.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("subscriber is gone")]
    Closed,

    #[error("subscriber is not keeping up")]
    Lagging,
}

/// A handle that receives verdicts.
///
/// `notify` must not block; implementations queue and return.
pub trait Subscriber: Send + Sync {
    fn notify(&self, verdict: &Verdict) -> Result<(), DeliveryError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Outcome of one broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Subscribers that accepted the verdict.
    pub sent: usize,
    /// Subscribers that failed and were pruned.
    pub failed: usize,
}

/// Registry of subscribers.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Mutex<Vec<(SubscriberId, Arc<dyn Subscriber>)>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `verdict` to every subscriber, pruning those that fail.
    pub fn broadcast(&self, verdict: &Verdict) -> BroadcastResult {
        // Snapshot so notify() runs without holding the registry lock.
        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self.lock().clone();

        let mut result = BroadcastResult::default();
        let mut failed = Vec::new();
        for (id, subscriber) in snapshot {
            match subscriber.notify(verdict) {
                Ok(()) => result.sent += 1,
                Err(e) => {
                    debug!(subscriber = id.0, "pruning subscriber: {e}");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            result.failed = failed.len();
            self.lock().retain(|(id, _)| !failed.contains(id));
        }
        result
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriberId, Arc<dyn Subscriber>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
