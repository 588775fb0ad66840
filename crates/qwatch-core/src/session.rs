// ── Device session ──
//
// Owns the single connection to the device. Every use of the handle goes
// through one async mutex, so an on-demand query from the request path
// never interleaves with a poll tick on the wire.

use std::future::Future;

use qwatch_api::{Record, RouterOsClient, TransportConfig};
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::{Credentials, DeviceEndpoint, MonitorConfig};
use crate::error::CoreError;
use crate::model::QueueRecord;

pub const QUEUE_TREE_PRINT: &str = "/queue/tree/print";
pub const IDENTITY_PRINT: &str = "/system/identity/print";

// ── Driver seams ─────────────────────────────────────────────────────

/// An open, authenticated connection to a device.
pub trait DeviceConnection: Send + 'static {
    fn run(
        &mut self,
        command: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Record>, qwatch_api::Error>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens [`DeviceConnection`]s.
pub trait Connector: Send + Sync + 'static {
    type Conn: DeviceConnection;

    fn connect(
        &self,
        endpoint: &DeviceEndpoint,
        credentials: &Credentials,
        transport: TransportConfig,
    ) -> impl Future<Output = Result<Self::Conn, qwatch_api::Error>> + Send;
}

/// Production connector: RouterOS API over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOsConnector;

impl Connector for RouterOsConnector {
    type Conn = RouterOsClient;

    async fn connect(
        &self,
        endpoint: &DeviceEndpoint,
        credentials: &Credentials,
        transport: TransportConfig,
    ) -> Result<RouterOsClient, qwatch_api::Error> {
        RouterOsClient::connect(
            &endpoint.address(),
            &credentials.username,
            &credentials.password,
            transport,
        )
        .await
    }
}

impl DeviceConnection for RouterOsClient {
    async fn run(
        &mut self,
        command: &str,
        params: &[&str],
    ) -> Result<Vec<Record>, qwatch_api::Error> {
        RouterOsClient::run(self, command, params).await
    }

    async fn close(&mut self) {
        RouterOsClient::close(self).await;
    }
}

// ── SessionState ─────────────────────────────────────────────────────

/// Whether the session currently holds a usable connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

// ── DeviceSession ────────────────────────────────────────────────────

pub struct DeviceSession<C: Connector> {
    connector: C,
    endpoint: DeviceEndpoint,
    credentials: Credentials,
    transport: TransportConfig,
    conn: Mutex<Option<C::Conn>>,
    state: watch::Sender<SessionState>,
}

impl<C: Connector> DeviceSession<C> {
    /// Create a disconnected session. Call [`connect`](Self::connect) to
    /// open the transport.
    pub fn new(connector: C, config: &MonitorConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            endpoint: config.endpoint.clone(),
            credentials: config.credentials.clone(),
            transport: config.transport,
            conn: Mutex::new(None),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Open a fresh connection, replacing any existing handle.
    ///
    /// On failure the session is left Disconnected.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(mut stale) = guard.take() {
            stale.close().await;
        }

        match self
            .connector
            .connect(&self.endpoint, &self.credentials, self.transport)
            .await
        {
            Ok(conn) => {
                *guard = Some(conn);
                self.state.send_replace(SessionState::Connected);
                info!(address = %self.endpoint.address(), "connected to device");
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Close the current handle (errors ignored) and connect again.
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        debug!(address = %self.endpoint.address(), "reconnecting to device");
        self.close().await;
        self.connect().await
    }

    /// Release the transport if present. Idempotent.
    pub async fn close(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(mut conn) = guard.take() {
            conn.close().await;
            debug!("device session closed");
        }
        self.state.send_replace(SessionState::Disconnected);
    }

    /// Fetch queue-tree entries with live counters, in device order.
    pub async fn query_queue_tree(&self) -> Result<Vec<QueueRecord>, CoreError> {
        let records = self.run(QUEUE_TREE_PRINT, &["=stats"]).await?;
        Ok(records.iter().map(QueueRecord::from_record).collect())
    }

    /// Cheap liveness probe. Any failure drops the handle and marks the
    /// session Disconnected.
    pub async fn is_alive(&self) -> bool {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return false;
        };

        match conn.run(IDENTITY_PRINT, &[]).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "liveness probe failed");
                if let Some(mut conn) = guard.take() {
                    conn.close().await;
                }
                self.state.send_replace(SessionState::Disconnected);
                false
            }
        }
    }

    async fn run(&self, command: &str, params: &[&str]) -> Result<Vec<Record>, CoreError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(CoreError::NotConnected)?;

        match conn.run(command, params).await {
            Ok(records) => Ok(records),
            Err(e) => {
                if e.is_connection_lost() {
                    warn!(error = %e, command, "device connection lost");
                    if let Some(mut conn) = guard.take() {
                        conn.close().await;
                    }
                    self.state.send_replace(SessionState::Disconnected);
                }
                Err(e.into())
            }
        }
    }
}
