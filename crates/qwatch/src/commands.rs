//! Subcommand handlers.

use tokio::net::TcpListener;
use tracing::{error, info};

use qwatch_config::{Config, load_config};
use qwatch_core::{QueueMonitor, RouterOsConnector};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::server;

fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config(global.config.as_deref(), &global.overrides())?)
}

/// Connect, start polling, and serve HTTP until Ctrl-C.
///
/// The initial connection is fatal; later outages are retried by the
/// poll loop.
pub async fn serve(global: &GlobalOpts) -> Result<(), CliError> {
    let config = load(global)?;
    let monitor = QueueMonitor::new(config.to_monitor_config());

    monitor.connect().await?;

    let address = config.server.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| CliError::Bind {
            address: address.clone(),
            source,
        })?;

    monitor.start().await;

    let shutdown = {
        let monitor = monitor.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
            monitor.shutdown().await;
        }
    };

    server::serve(listener, monitor, shutdown).await?;
    Ok(())
}

/// Fetch one snapshot and print it.
pub async fn snapshot(global: &GlobalOpts, args: &SnapshotArgs) -> Result<(), CliError> {
    let config = load(global)?;
    let snapshot = QueueMonitor::oneshot(RouterOsConnector, config.to_monitor_config()).await?;

    let json = if args.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{json}");
    Ok(())
}

/// Print the effective configuration.
pub fn config(global: &GlobalOpts) -> Result<(), CliError> {
    let config = load(global)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
