// ── Core error types ──
//
// Errors surfaced by the telemetry pipeline. Consumers never see raw
// framing or reply-word failures; the `From<qwatch_api::Error>` impl
// folds transport-layer errors into connection and query variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected to device")]
    NotConnected,

    #[error("Device did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Query errors ─────────────────────────────────────────────────
    #[error("Query failed: {message}")]
    QueryFailed { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<qwatch_api::Error> for CoreError {
    fn from(err: qwatch_api::Error) -> Self {
        match err {
            qwatch_api::Error::Connect { address, source } => CoreError::ConnectionFailed {
                address,
                reason: source.to_string(),
            },
            qwatch_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            qwatch_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            qwatch_api::Error::Trap { message } => CoreError::QueryFailed { message },
            qwatch_api::Error::Fatal { message } => CoreError::QueryFailed {
                message: format!("device closed the session: {message}"),
            },
            qwatch_api::Error::ConnectionClosed => CoreError::QueryFailed {
                message: "connection closed by device".into(),
            },
            qwatch_api::Error::Io(e) => CoreError::QueryFailed {
                message: format!("I/O error: {e}"),
            },
            qwatch_api::Error::Protocol(message) => CoreError::QueryFailed {
                message: format!("protocol error: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_maps_to_query_failure() {
        let err: CoreError = qwatch_api::Error::Trap {
            message: "no such command prefix".into(),
        }
        .into();
        assert!(matches!(err, CoreError::QueryFailed { ref message } if message == "no such command prefix"));
    }

    #[test]
    fn connect_keeps_address() {
        let err: CoreError = qwatch_api::Error::Connect {
            address: "10.0.0.1:8728".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        }
        .into();
        assert!(err.to_string().starts_with("Cannot connect to device at 10.0.0.1:8728"));
    }
}
