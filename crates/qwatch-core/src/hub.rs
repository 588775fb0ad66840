// ── Broadcast hub ──
//
// Fan-out of snapshots and error events to every live subscriber. Each
// subscriber owns a bounded queue; `publish` never waits on a slow one.
// A subscriber whose queue is full or closed is evicted, which drops its
// sender and ends its connection task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::model::Snapshot;
use crate::store::SnapshotCache;

pub type SubscriberId = u64;

// ── Events & wire messages ───────────────────────────────────────────

/// What the poll loop publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Snapshot(Arc<Snapshot>),
    Error { message: String, timestamp: i64 },
}

impl FeedEvent {
    /// Error event stamped with the current time.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn to_message(&self) -> ServerMessage {
        match self {
            Self::Snapshot(snapshot) => ServerMessage::QueueUpdate {
                data: Arc::clone(snapshot),
            },
            Self::Error { message, timestamp } => ServerMessage::Error {
                message: message.clone(),
                timestamp: *timestamp,
            },
        }
    }
}

/// Messages pushed to viewers, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    QueueUpdate { data: Arc<Snapshot> },
    Error { message: String, timestamp: i64 },
    Pong { timestamp: i64 },
}

/// Messages viewers may send. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

// ── BroadcastHub ─────────────────────────────────────────────────────

struct Registration {
    tx: mpsc::Sender<FeedEvent>,
    /// Snapshot enqueued at subscribe time. A publish of the same `Arc`
    /// is skipped once so the subscriber never sees it twice.
    bootstrap: Option<Arc<Snapshot>>,
}

pub struct BroadcastHub {
    cache: Arc<SnapshotCache>,
    /// Subscribe and publish both run under this one lock.
    subscribers: Mutex<HashMap<SubscriberId, Registration>>,
    next_id: AtomicU64,
    buffer: usize,
    /// Set by `close_all` under the registry lock; later subscribers get
    /// an already-ended feed.
    closed: AtomicBool,
}

impl BroadcastHub {
    /// `buffer` is the per-subscriber queue depth (at least 1).
    pub fn new(cache: Arc<SnapshotCache>, buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            cache,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            closed: AtomicBool::new(false),
        })
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriberId, Registration>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber. The cached snapshot, if any, is queued as
    /// its first event.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);

        let active = {
            let mut registry = self.registry();
            if self.closed.load(Ordering::Acquire) {
                drop(tx);
                debug!(subscriber = id, "hub closed, subscriber refused");
                return Subscription {
                    id,
                    rx,
                    hub: Weak::new(),
                };
            }
            let bootstrap = self.cache.load();
            if let Some(snapshot) = &bootstrap {
                // Fresh queue with capacity >= 1: cannot be full.
                let _ = tx.try_send(FeedEvent::Snapshot(Arc::clone(snapshot)));
            }
            registry.insert(id, Registration { tx, bootstrap });
            registry.len()
        };

        debug!(subscriber = id, active, "subscriber joined");
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry().remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "subscriber left");
        }
        removed
    }

    /// Enqueue `event` for every subscriber without blocking. Returns how
    /// many subscribers it was delivered to.
    pub fn publish(&self, event: &FeedEvent) -> usize {
        let mut registry = self.registry();
        let mut delivered = 0;
        let mut evicted = Vec::new();

        for (&id, registration) in registry.iter_mut() {
            let bootstrap = registration.bootstrap.take();
            if let (FeedEvent::Snapshot(snapshot), Some(seen)) = (event, &bootstrap) {
                if Arc::ptr_eq(snapshot, seen) {
                    continue;
                }
            }

            match registration.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, "subscriber queue full, evicting");
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = id, "subscriber gone, evicting");
                    evicted.push(id);
                }
            }
        }

        for id in evicted {
            registry.remove(&id);
        }
        delivered
    }

    /// Answer a viewer message. Only `ping` gets a reply.
    pub fn handle_client_message(&self, text: &str) -> Option<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Ping) => Some(ServerMessage::Pong {
                timestamp: Utc::now().timestamp(),
            }),
            Err(_) => None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    /// Drop every registration, ending all subscriber feeds. Subscribers
    /// that join afterwards see an ended feed.
    pub fn close_all(&self) -> usize {
        let mut registry = self.registry();
        self.closed.store(true, Ordering::Release);
        let closed = registry.len();
        registry.clear();
        closed
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// A live feed of [`FeedEvent`]s. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<FeedEvent>,
    hub: Weak<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the hub has evicted or closed this
    /// subscriber.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
