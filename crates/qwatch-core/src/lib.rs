// qwatch-core: Queue-tree telemetry pipeline between qwatch-api and viewers (HTTP/WebSocket).

pub mod config;
pub mod derive;
pub mod error;
pub mod hub;
pub mod model;
pub mod monitor;
pub mod poller;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credentials, DeviceEndpoint, DirectionTokens, MonitorConfig, NameMatch};
pub use error::CoreError;
pub use hub::{BroadcastHub, ClientMessage, FeedEvent, ServerMessage, Subscription};
pub use model::{QueueRecord, QueueStat, QueueStatus, Snapshot, SystemStat};
pub use monitor::QueueMonitor;
pub use session::{Connector, DeviceConnection, DeviceSession, RouterOsConnector, SessionState};
pub use store::SnapshotCache;
