//! Live feed endpoint.
//!
//! Each upgraded socket gets its own hub subscription. Hub events are
//! forwarded as JSON text frames; incoming text frames go through
//! [`BroadcastHub::handle_client_message`].

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use qwatch_core::{BroadcastHub, Connector, QueueMonitor, ServerMessage};

pub async fn ws_handler<C: Connector>(
    ws: WebSocketUpgrade,
    State(monitor): State<QueueMonitor<C>>,
) -> Response {
    let hub = Arc::clone(monitor.hub());
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Drive one connection until either side goes away.
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let mut subscription = hub.subscribe();
    let id = subscription.id();
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            event = subscription.recv() => {
                let Some(event) = event else {
                    // Evicted or hub closed.
                    debug!(subscriber = id, "feed ended, closing socket");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if send_json(&mut ws_tx, &event.to_message()).await.is_err() {
                    break;
                }
            }

            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = hub.handle_client_message(&text) {
                        if send_json(&mut ws_tx, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = id, error = %e, "websocket receive failed");
                    break;
                }
            },
        }
    }

    debug!(subscriber = id, "websocket closed");
}

async fn send_json(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode feed message");
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(text)).await
}
