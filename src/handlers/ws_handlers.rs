//! Websocket endpoint feeding the notification fan-out.
//!
//! Each connected user gets one outbound channel registered in the
//! `ConnectionRegistry`; events queued by the state machines are forwarded to
//! the socket here. Inbound frames are only kept for liveness, the client has
//! nothing to say.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{auth::CurrentUser, models::UserId, notify::ConnectionRegistry, state::AppState};

/// GET `/ws/connect`: upgrade to a notification stream for the caller.
pub async fn connect(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, user, registry))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, registry: Arc<ConnectionRegistry>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    registry.register(user_id, tx.clone());

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(payload) => {
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                // our channel was replaced by a reconnect
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(other)) => {
                    tracing::debug!("received frame from user {user_id}: {other:?}");
                }
                Some(Err(err)) => {
                    tracing::warn!("websocket error for user {user_id}: {err}");
                    break;
                }
            },
        }
    }

    registry.deregister_channel(user_id, &tx);
    tracing::info!("websocket closed for user {user_id}");
}
