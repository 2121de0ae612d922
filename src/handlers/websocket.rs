//! WebSocket channel glue: upgrades the connection and drives one
//! [`ChannelHandler`] per socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::protocol::{ServerMessage, SYSTEM_SESSION_ID};
use crate::service::ChannelHandler;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One select loop per channel: inbound frames are dispatched through the
/// handler, PTY events come back on the aggregated stream, and both produce
/// outbound frames on the same socket. On loop exit every session the channel
/// created is torn down.
pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (mut handler, mut events_rx) = ChannelHandler::new(state.registry.clone());
    info!("terminal channel opened");

    loop {
        tokio::select! {
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handler.handle_raw(&text).await {
                            if send_message(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // The protocol is JSON text frames only.
                        let reply = ServerMessage::error(
                            SYSTEM_SESSION_ID,
                            "Invalid message format",
                        );
                        if send_message(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("channel closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "channel receive error");
                        break;
                    }
                }
            }
            Some((session_id, event)) = events_rx.recv() => {
                if let Some(outbound) = handler.handle_event(session_id, event).await {
                    if send_message(&mut socket, &outbound).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    handler.close().await;
    info!("terminal channel closed");
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(text) => socket.send(Message::Text(text)).await,
        Err(e) => {
            error!(error = %e, "failed to encode outbound message");
            Ok(())
        }
    }
}
