//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use qwatch_config::ConfigError;
use qwatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────

    #[error("Could not connect to device at {address}")]
    #[diagnostic(
        code(qwatch::connection_failed),
        help(
            "Check that the device is reachable and its API service is enabled.\n\
             Reason: {reason}\n\
             On the device: /ip service enable api"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Device rejected the login")]
    #[diagnostic(
        code(qwatch::auth_failed),
        help(
            "{message}\n\
             Verify device.username and device.password. The user's group\n\
             needs the `api` and `read` policies."
        )
    )]
    AuthFailed { message: String },

    #[error("Device did not answer within {seconds}s")]
    #[diagnostic(
        code(qwatch::timeout),
        help("Raise device.connect_timeout_secs or device.command_timeout_secs.")
    )]
    Timeout { seconds: u64 },

    #[error("Queue-tree query failed: {message}")]
    #[diagnostic(code(qwatch::query_failed))]
    QueryFailed { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(qwatch::config),
        help("Inspect the effective configuration with: qwatch config")
    )]
    Config(#[from] ConfigError),

    // ── Server ───────────────────────────────────────────────────────

    #[error("Cannot listen on {address}")]
    #[diagnostic(
        code(qwatch::bind_failed),
        help("Is another process using the port? Choose one with --port.")
    )]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(qwatch::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON output")]
    #[diagnostic(code(qwatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Config(_) => exit_code::CONFIG,
            Self::QueryFailed { .. }
            | Self::Bind { .. }
            | Self::Io(_)
            | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                Self::ConnectionFailed { address, reason }
            }
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::QueryFailed { message } => Self::QueryFailed { message },
            CoreError::NotConnected => Self::ConnectionFailed {
                address: "device".into(),
                reason: "not connected".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    address: "10.0.0.1:8728".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::AuthenticationFailed {
                    message: "invalid user name or password".into(),
                },
                exit_code::AUTH,
            ),
            (CoreError::Timeout { timeout_secs: 10 }, exit_code::TIMEOUT),
            (
                CoreError::QueryFailed {
                    message: "no such command".into(),
                },
                exit_code::GENERAL,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn config_errors_use_config_exit_code() {
        let validation = CliError::from(ConfigError::Validation {
            field: "server.port".into(),
            reason: "must be non-zero".into(),
        });
        assert_eq!(validation.exit_code(), exit_code::CONFIG);

        let missing = CliError::from(ConfigError::NotFound {
            path: "/nope/qwatch.toml".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::CONFIG);
        assert!(missing.to_string().contains("/nope/qwatch.toml"));
    }
}
