// ── Runtime monitor configuration ──
//
// These types describe *what* to poll and *how* to classify it. They
// carry credentials and tuning but never touch disk: the binary builds a
// `MonitorConfig` (via qwatch-config) and hands it in.

use std::time::Duration;

use qwatch_api::TransportConfig;
use qwatch_api::transport::DEFAULT_API_PORT;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where the device's API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
}

impl DeviceEndpoint {
    /// `host:port`, bracketing bare IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// API user credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// How a queue name is tested against a direction token.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NameMatch {
    /// Token at either end of the name (`A_OUT` and `OUT_A` both match `_OUT`).
    #[default]
    SuffixOrPrefix,
    /// Token only at the end of the name.
    Suffix,
}

/// Name tokens that assign a queue to the upload or download total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionTokens {
    pub upload: String,
    pub download: String,
    pub match_mode: NameMatch,
}

impl Default for DirectionTokens {
    fn default() -> Self {
        Self {
            upload: "_OUT".into(),
            download: "_IN".into(),
            match_mode: NameMatch::default(),
        }
    }
}

/// Everything the monitor needs to run against one device.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub endpoint: DeviceEndpoint,
    pub credentials: Credentials,
    /// Poll cadence. Must be non-zero.
    pub poll_interval: Duration,
    pub transport: TransportConfig,
    pub tokens: DirectionTokens,
    /// Per-subscriber outbound queue depth before eviction.
    pub subscriber_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: DeviceEndpoint {
                host: "192.168.1.1".into(),
                port: DEFAULT_API_PORT,
            },
            credentials: Credentials {
                username: "admin".into(),
                password: SecretString::from("password"),
            },
            poll_interval: Duration::from_secs(2),
            transport: TransportConfig::default(),
            tokens: DirectionTokens::default(),
            subscriber_buffer: 64,
        }
    }
}
