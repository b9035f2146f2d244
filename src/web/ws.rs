// src/web/ws.rs - Live roast stream over WebSocket
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;

use super::api::AppState;

/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| roast_ws_loop(state, socket))
}

/// Forward every roast event as a JSON text frame until the client leaves or
/// the roaster shuts down.
async fn roast_ws_loop(state: AppState, mut socket: WebSocket) {
    let mut events = state.roaster.subscribe();
    let mut shutdown = state.shutdown.subscribe();
    tracing::info!("WebSocket client connected");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Failed to encode roast event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("WebSocket client lagging, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    tracing::info!("WebSocket client disconnected");
}
