//! WebSocket streaming of telemetry, with echo of inbound messages.
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use drone_core::fanout::SINK_BUFFER;
use std::sync::Arc;

/// Handler for WebSocket connections. The newest connection is the sink.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn echo(text: &str) -> String {
    format!("Your message is: {}. Time received : {}", text, Utc::now().to_rfc3339())
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut sink = state.sink.attach(SINK_BUFFER);
    let mut shutdown = state.subscribe_shutdown();
    tracing::info!("Realtime monitor {} connected", sink.id);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        tracing::info!("Monitor {} says: {}", sink.id, text);
                        if socket.send(Message::Text(echo(&text))).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let reply = echo(&String::from_utf8_lossy(&bytes));
                        if socket.send(Message::Binary(reply.into_bytes())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        tracing::warn!("Monitor {} read failed: {}", sink.id, err);
                        break;
                    }
                    None => break,
                }
            }
            tick = sink.rx.recv() => {
                match tick {
                    Some(payload) => {
                        if let Err(err) = socket.send(Message::Text(payload)).await {
                            tracing::warn!("Monitor {} write failed: {}", sink.id, err);
                            break;
                        }
                    }
                    None => {
                        // Replaced by a newer connection.
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.sink.detach(sink.id);
    tracing::info!("Realtime monitor {} disconnected", sink.id);
}
