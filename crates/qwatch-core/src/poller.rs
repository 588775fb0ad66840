// ── Poll loop ──
//
// Timer-driven pipeline: session → deriver → cache → hub. Cancellation
// is observed between ticks, so a tick in flight always completes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DirectionTokens;
use crate::derive::build_snapshot;
use crate::error::CoreError;
use crate::hub::{BroadcastHub, FeedEvent};
use crate::model::Snapshot;
use crate::session::{Connector, DeviceSession};
use crate::store::SnapshotCache;

/// Message published when the device is unreachable and reconnecting fails.
pub const CONNECTION_LOST: &str = "connection lost";

pub struct Poller<C: Connector> {
    session: Arc<DeviceSession<C>>,
    cache: Arc<SnapshotCache>,
    hub: Arc<BroadcastHub>,
    tokens: DirectionTokens,
}

impl<C: Connector> Poller<C> {
    pub fn new(
        session: Arc<DeviceSession<C>>,
        cache: Arc<SnapshotCache>,
        hub: Arc<BroadcastHub>,
        tokens: DirectionTokens,
    ) -> Self {
        Self {
            session,
            cache,
            hub,
            tokens,
        }
    }

    /// Run one poll cycle.
    ///
    /// On success the new snapshot is cached and published. On failure an
    /// error event is published instead and the cache is left alone.
    pub async fn tick(&self) -> Result<Arc<Snapshot>, CoreError> {
        if !self.session.is_alive().await {
            info!("device connection down, reconnecting");
            if let Err(e) = self.session.reconnect().await {
                warn!(error = %e, "reconnect failed");
                self.hub.publish(&FeedEvent::error(CONNECTION_LOST));
                return Err(e);
            }
            info!("reconnected to device");
        }

        let records = match self.session.query_queue_tree().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "queue-tree query failed");
                self.hub.publish(&FeedEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let snapshot = Arc::new(build_snapshot(
            records,
            &self.tokens,
            Utc::now().timestamp(),
        ));
        self.cache.store(Arc::clone(&snapshot));
        let delivered = self.hub.publish(&FeedEvent::Snapshot(Arc::clone(&snapshot)));
        debug!(
            queues = snapshot.queues.len(),
            subscribers = delivered,
            "published snapshot"
        );
        Ok(snapshot)
    }

    /// Spawn the loop on the runtime. It stops once `cancel` fires.
    pub fn spawn(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(interval, cancel))
    }

    async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // Failures are already logged and published.
                    let _ = self.tick().await;
                }
            }
        }
        debug!("poll loop stopped");
    }
}
