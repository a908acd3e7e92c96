//! Subscriber fan-out.
//!
//! [`SubscriberHub`] is the list of live consumers attached to the shared
//! snapshot producer. Every subscriber owns a single-slot `watch` channel: a
//! consumer that falls behind has stale batches overwritten and only ever sees
//! the newest one, so publishing never blocks on a slow client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use rp_types::{Batch, SubscriberError};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

type Slot = watch::Sender<Option<Arc<Batch>>>;

#[derive(Debug, Default)]
struct HubInner {
    subscribers: DashMap<Uuid, Slot>,
    latest: RwLock<Option<Arc<Batch>>>,
    closed: AtomicBool,
}

/// Cloneable handle to the fan-out list.
#[derive(Debug, Clone, Default)]
pub struct SubscriberHub {
    inner: Arc<HubInner>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new consumer. The most recent batch, if any, is handed out
    /// first so a fresh client does not wait a whole tick for data.
    pub fn subscribe(&self) -> Result<Subscription, SubscriberError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(SubscriberError::HubClosed);
        }

        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(None);
        self.inner.subscribers.insert(id, tx);

        // Registered before reading `latest`, so a concurrent publish is seen
        // either here or through the channel (duplicates are filtered by tick).
        let pending = self.inner.latest.read().clone();

        info!(subscriber = %id, total = self.len(), "subscriber attached");

        Ok(Subscription {
            id,
            rx,
            pending,
            last_tick: 0,
            skipped: 0,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Push a batch to every registered subscriber and return how many
    /// received it. Subscribers whose receiving side is gone are removed.
    pub fn publish(&self, batch: Arc<Batch>) -> usize {
        if self.inner.closed.load(Ordering::Acquire) {
            return 0;
        }
        *self.inner.latest.write() = Some(Arc::clone(&batch));

        let mut delivered = 0;
        let mut disconnected = Vec::new();
        for entry in self.inner.subscribers.iter() {
            match entry.value().send(Some(Arc::clone(&batch))) {
                Ok(()) => delivered += 1,
                Err(_) => disconnected.push(*entry.key()),
            }
        }

        for id in disconnected {
            if self.inner.subscribers.remove(&id).is_some() {
                info!(subscriber = %id, "subscriber disconnected; removed");
            }
        }

        delivered
    }

    /// Detach a subscriber explicitly. Dropping its [`Subscription`] has the
    /// same effect.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        remove_subscriber(&self.inner, id)
    }

    /// Stop accepting subscribers and close every open subscription. Clients
    /// drain whatever they hold and then observe end-of-stream.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let count = self.inner.subscribers.len();
        self.inner.subscribers.clear();
        info!(closed = count, "subscriber hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.subscribers.is_empty()
    }
}

fn remove_subscriber(inner: &HubInner, id: &Uuid) -> bool {
    let removed = inner.subscribers.remove(id).is_some();
    if removed {
        info!(subscriber = %id, total = inner.subscribers.len(), "subscriber detached");
    }
    removed
}

/// One consumer's registration. Deregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: watch::Receiver<Option<Arc<Batch>>>,
    pending: Option<Arc<Batch>>,
    last_tick: u64,
    skipped: u64,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of batches overwritten before this subscriber read them.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Wait for the next batch newer than the last one returned. `None` once
    /// the hub has been closed.
    pub async fn next(&mut self) -> Option<Arc<Batch>> {
        if let Some(batch) = self.pending.take() {
            if self.accept(&batch) {
                return Some(batch);
            }
        }

        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let current = self.rx.borrow_and_update().clone();
            if let Some(batch) = current {
                if self.accept(&batch) {
                    return Some(batch);
                }
            }
        }
    }

    fn accept(&mut self, batch: &Batch) -> bool {
        if batch.tick <= self.last_tick {
            return false;
        }
        if self.last_tick > 0 && batch.tick > self.last_tick + 1 {
            let gap = batch.tick - self.last_tick - 1;
            self.skipped += gap;
            debug!(subscriber = %self.id, gap, "slow subscriber; stale batches dropped");
        }
        self.last_tick = batch.tick;
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            remove_subscriber(&inner, &self.id);
        }
    }
}
