//! HTTP surface: the snapshot endpoint, the live feed upgrade, and a
//! health probe. Every route reads through [`QueueMonitor`].

use std::future::Future;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use qwatch_core::{Connector, QueueMonitor, SessionState};

use crate::ws;

pub const QUEUE_STATS_PATH: &str = "/api/queue-stats";
pub const WS_PATH: &str = "/api/ws";
pub const HEALTH_PATH: &str = "/api/health";

/// Body `error` field when the snapshot endpoint cannot produce data.
pub const FETCH_FAILED: &str = "failed to fetch queue statistics";

// ── Router ───────────────────────────────────────────────────────────

pub fn router<C: Connector>(monitor: QueueMonitor<C>) -> Router {
    Router::new()
        .route(QUEUE_STATS_PATH, get(queue_stats::<C>))
        .route(WS_PATH, get(ws::ws_handler::<C>))
        .route(HEALTH_PATH, get(health::<C>))
        .layer(CorsLayer::permissive())
        .with_state(monitor)
}

/// Serve until `shutdown` resolves, then drain open connections.
///
/// Feed connections only end once their subscription closes, so the
/// shutdown future should call [`QueueMonitor::shutdown`] before it
/// returns.
pub async fn serve<C, F>(
    listener: TcpListener,
    monitor: QueueMonitor<C>,
    shutdown: F,
) -> std::io::Result<()>
where
    C: Connector,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!(%address, "http server listening");
    }
    axum::serve(listener, router(monitor))
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Handlers ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct FetchError {
    error: &'static str,
    detail: String,
}

async fn queue_stats<C: Connector>(State(monitor): State<QueueMonitor<C>>) -> Response {
    match monitor.latest_snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            warn!(error = %e, "snapshot request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FetchError {
                    error: FETCH_FAILED,
                    detail: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    device: SessionState,
    subscribers: usize,
}

async fn health<C: Connector>(State(monitor): State<QueueMonitor<C>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        device: monitor.session_state(),
        subscribers: monitor.subscriber_count(),
    })
}
