//! Clap derive structures for the `qwatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use qwatch_config::Overrides;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// qwatch -- live queue-tree telemetry for RouterOS devices
#[derive(Debug, Parser)]
#[command(
    name = "qwatch",
    version,
    about = "Serve live RouterOS queue-tree statistics over HTTP and WebSocket",
    long_about = "Polls the queue tree of a RouterOS device through its API service,\n\
        derives utilization and status per queue, and serves snapshots at\n\
        /api/queue-stats with a live feed at /api/ws.\n\n\
        Without a subcommand, `serve` is assumed.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "QWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[arg(long, global = true)]
    pub bind: Option<String>,

    /// Port the HTTP server listens on
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    /// RouterOS device host
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, env = "QWATCH_LOG_JSON", global = true)]
    pub log_json: bool,
}

impl GlobalOpts {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind.clone(),
            port: self.port,
            device_host: self.host.clone(),
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the device and serve the HTTP API (default)
    Serve,

    /// Fetch one snapshot and print it as JSON
    Snapshot(SnapshotArgs),

    /// Print the effective configuration (password redacted)
    Config,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}
