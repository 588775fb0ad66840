// Shared transport configuration for RouterOS API sessions.
//
// Connect and per-command deadlines live here so the client and its
// callers agree on how long a device may stall before giving up.

use std::future::Future;
use std::time::Duration;

use crate::error::Error;

/// Default RouterOS API port (plain TCP).
pub const DEFAULT_API_PORT: u16 = 8728;

/// Timeouts applied to every RouterOS API session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for the TCP connect plus login exchange.
    pub connect_timeout: Duration,
    /// Deadline for a single command, from write until `!done`.
    pub command_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// Run `fut` under `limit`, mapping expiry into [`Error::Timeout`].
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: limit.as_secs(),
        })?
}
