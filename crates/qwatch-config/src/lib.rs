//! Configuration for the qwatch service.
//!
//! Layered loading (defaults, TOML file, `QWATCH_` environment, legacy
//! flat variables, command-line overrides), validation, and translation
//! into [`qwatch_core::MonitorConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use qwatch_api::TransportConfig;
use qwatch_api::transport::DEFAULT_API_PORT;
use qwatch_core::{Credentials, DeviceEndpoint, DirectionTokens, MonitorConfig, NameMatch};

/// Printed in place of secrets.
pub const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub monitor: MonitorSection,
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `bind:port` for the listener.
    pub fn listen_address(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

/// The monitored RouterOS device.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "lenient_string")]
    pub username: String,
    /// Never serialized in clear text.
    #[serde(deserialize_with = "lenient_secret", serialize_with = "redact")]
    pub password: SecretString,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".into(),
            port: DEFAULT_API_PORT,
            username: "admin".into(),
            password: SecretString::from("password"),
            connect_timeout_secs: 10,
            command_timeout_secs: 10,
        }
    }
}

/// Polling and fan-out tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSection {
    pub interval_secs: u64,
    pub upload_token: String,
    pub download_token: String,
    pub name_match: NameMatch,
    pub subscriber_buffer: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let tokens = DirectionTokens::default();
        Self {
            interval_secs: 2,
            upload_token: tokens.upload,
            download_token: tokens.download,
            name_match: tokens.match_mode,
            subscriber_buffer: 64,
        }
    }
}

// Environment values arrive type-inferred ("12345" becomes a number), so
// string fields accept any scalar.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::UInt(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

fn lenient_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    lenient_string(deserializer).map(SecretString::from)
}

fn redact<S: Serializer>(_: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(REDACTED)
}

// ── Command-line overrides ──────────────────────────────────────────

/// Highest-precedence values from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub device_host: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "qwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("qwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Flat variables older deployments set, mapped onto nested keys.
fn legacy_env() -> Env {
    Env::raw()
        .only(&[
            "SERVER_PORT",
            "ROS_HOST",
            "ROS_PORT",
            "ROS_USERNAME",
            "ROS_PASSWORD",
        ])
        .map(|key| {
            let path = match key.as_str().to_ascii_uppercase().as_str() {
                "SERVER_PORT" => "server.port",
                "ROS_HOST" => "device.host",
                "ROS_PORT" => "device.port",
                "ROS_USERNAME" => "device.username",
                "ROS_PASSWORD" => "device.password",
                _ => return key.as_str().to_owned().into(),
            };
            path.into()
        })
}

/// Build the layered figment.
///
/// An explicit `path` must exist; the default platform path is optional.
pub fn figment(path: Option<&Path>, overrides: &Overrides) -> Result<Figment, ConfigError> {
    let file = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let mut figment = Figment::new()
        .merge(Toml::file(file))
        .merge(Env::prefixed("QWATCH_").split("__"))
        .merge(legacy_env());

    if let Some(bind) = &overrides.bind {
        figment = figment.merge(Serialized::default("server.bind", bind));
    }
    if let Some(port) = overrides.port {
        figment = figment.merge(Serialized::default("server.port", port));
    }
    if let Some(host) = &overrides.device_host {
        figment = figment.merge(Serialized::default("device.host", host));
    }

    Ok(figment)
}

/// Load and validate the effective configuration.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
    let config: Config = figment(path, overrides)?.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation & translation ────────────────────────────────────────

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be non-zero"));
        }
        if self.device.host.trim().is_empty() {
            return Err(invalid("device.host", "must not be empty"));
        }
        if self.device.port == 0 {
            return Err(invalid("device.port", "must be non-zero"));
        }
        if self.device.username.trim().is_empty() {
            return Err(invalid("device.username", "must not be empty"));
        }
        if self.device.connect_timeout_secs == 0 || self.device.command_timeout_secs == 0 {
            return Err(invalid("device timeouts", "must be at least 1 second"));
        }
        if self.monitor.interval_secs == 0 {
            return Err(invalid("monitor.interval_secs", "must be at least 1 second"));
        }
        if self.monitor.subscriber_buffer == 0 {
            return Err(invalid("monitor.subscriber_buffer", "must be at least 1"));
        }
        if self.monitor.upload_token.is_empty() || self.monitor.download_token.is_empty() {
            return Err(invalid("monitor tokens", "must not be empty"));
        }
        Ok(())
    }

    /// Effective configuration as TOML, password redacted.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            endpoint: DeviceEndpoint {
                host: self.device.host.trim().to_owned(),
                port: self.device.port,
            },
            credentials: Credentials {
                username: self.device.username.clone(),
                password: self.device.password.clone(),
            },
            poll_interval: Duration::from_secs(self.monitor.interval_secs),
            transport: TransportConfig {
                connect_timeout: Duration::from_secs(self.device.connect_timeout_secs),
                command_timeout: Duration::from_secs(self.device.command_timeout_secs),
            },
            tokens: DirectionTokens {
                upload: self.monitor.upload_token.clone(),
                download: self.monitor.download_token.clone(),
                match_mode: self.monitor.name_match,
            },
            subscriber_buffer: self.monitor.subscriber_buffer,
        }
    }
}
