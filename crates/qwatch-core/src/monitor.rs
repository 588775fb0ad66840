// ── Queue monitor ──
//
// Facade owning the device session, snapshot cache, broadcast hub and
// poll task. The HTTP layer only ever talks to this type.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::derive::build_snapshot;
use crate::error::CoreError;
use crate::hub::{BroadcastHub, Subscription};
use crate::model::Snapshot;
use crate::poller::Poller;
use crate::session::{Connector, DeviceSession, RouterOsConnector, SessionState};
use crate::store::SnapshotCache;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Manages the connection
/// lifecycle, the background poll loop and subscriber fan-out.
pub struct QueueMonitor<C: Connector = RouterOsConnector> {
    inner: Arc<MonitorInner<C>>,
}

struct MonitorInner<C: Connector> {
    config: MonitorConfig,
    session: Arc<DeviceSession<C>>,
    cache: Arc<SnapshotCache>,
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> Clone for QueueMonitor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl QueueMonitor<RouterOsConnector> {
    /// Monitor for a real RouterOS device. Does NOT connect; call
    /// [`connect()`](Self::connect) first.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_connector(RouterOsConnector, config)
    }
}

impl<C: Connector> QueueMonitor<C> {
    pub fn with_connector(connector: C, config: MonitorConfig) -> Self {
        let session = Arc::new(DeviceSession::new(connector, &config));
        let cache = Arc::new(SnapshotCache::new());
        let hub = BroadcastHub::new(Arc::clone(&cache), config.subscriber_buffer);

        Self {
            inner: Arc::new(MonitorInner {
                config,
                session,
                cache,
                hub,
                cancel: CancellationToken::new(),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Connect, fetch one snapshot, and close. Nothing is cached or spawned.
    pub async fn oneshot(connector: C, config: MonitorConfig) -> Result<Snapshot, CoreError> {
        let monitor = Self::with_connector(connector, config);
        monitor.connect().await?;
        let result = monitor.fetch_snapshot().await;
        monitor.inner.session.close().await;
        result
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the device connection.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.session.connect().await
    }

    /// Spawn the poll loop. A second call while it runs is a no-op.
    pub async fn start(&self) {
        let mut task = self.inner.poll_task.lock().await;
        if task.is_some() {
            return;
        }

        let poller = Poller::new(
            Arc::clone(&self.inner.session),
            Arc::clone(&self.inner.cache),
            Arc::clone(&self.inner.hub),
            self.inner.config.tokens.clone(),
        );
        let interval = self.inner.config.poll_interval;
        *task = Some(poller.spawn(interval, self.inner.cancel.child_token()));
        info!(interval_secs = interval.as_secs(), "poll loop started");
    }

    /// Stop polling, end every subscriber feed, and close the session.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.poll_task.lock().await.take() {
            let _ = handle.await;
        }

        let closed = self.inner.hub.close_all();
        self.inner.session.close().await;
        debug!(subscribers = closed, "monitor shut down");
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Cached snapshot, or an on-demand fetch when nothing has been
    /// polled yet. The on-demand result is not cached.
    pub async fn latest_snapshot(&self) -> Result<Arc<Snapshot>, CoreError> {
        if let Some(snapshot) = self.inner.cache.load() {
            return Ok(snapshot);
        }
        debug!("cache empty, fetching on demand");
        self.fetch_snapshot().await.map(Arc::new)
    }

    /// Query the device now and derive a snapshot.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, CoreError> {
        let records = self.inner.session.query_queue_tree().await?;
        Ok(build_snapshot(
            records,
            &self.inner.config.tokens,
            Utc::now().timestamp(),
        ))
    }

    // ── Feed ─────────────────────────────────────────────────────

    pub fn subscribe(&self) -> Subscription {
        self.inner.hub.subscribe()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.inner.hub
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.subscriber_count()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }
}
