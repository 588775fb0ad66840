use thiserror::Error;

/// Top-level error type for the `qwatch-api` crate.
///
/// Covers every failure mode of a RouterOS API session: establishing
/// the TCP transport, logging in, framing violations, and command-level
/// rejections reported by the device. `qwatch-core` maps these into
/// connection and query failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// TCP connect failed (refused, unreachable, DNS failure, etc.)
    #[error("Cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Read or write on an established connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or command did not complete in time.
    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The device closed the stream before the reply was complete.
    #[error("Connection closed by device")]
    ConnectionClosed,

    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, disabled API user, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Device replies ──────────────────────────────────────────────
    /// `!trap`: the device rejected the command. The session stays usable.
    #[error("Device rejected command: {message}")]
    Trap { message: String },

    /// `!fatal`: the device is closing the session.
    #[error("Device closed the session: {message}")]
    Fatal { message: String },

    // ── Framing ─────────────────────────────────────────────────────
    /// Malformed length prefix or an unexpected reply word.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns `true` if the underlying connection can no longer be used.
    pub fn is_connection_lost(&self) -> bool {
        !matches!(self, Self::Trap { .. } | Self::Authentication { .. })
    }
}
