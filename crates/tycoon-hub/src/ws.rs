//! `WebSocket` connection lifecycle on `GET /ws`.
//!
//! 1. Accept, register unauthenticated, send `connected`.
//! 2. Wait for `auth`. On success attach the identity and push
//!    `auth_success` followed by the latest tick. On failure reply
//!    `auth_error` and keep the connection open for another attempt.
//! 3. Until either side closes: answer `ping` and `subscribe`, record
//!    pongs for the heartbeat, and let the relay push broadcasts.
//!
//! Every outbound frame goes through the registry. Once the heartbeat
//! prunes a connection the writer task sees its queue close, sends a close
//! frame and exits, which in turn ends the reader loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{
    ClientMessage, INVALID_TOKEN, NO_TOKEN, NOT_AUTHENTICATED, ServerMessage,
};
use crate::registry::{ConnectionId, Identity};
use crate::state::HubState;

/// Upgrade an HTTP request to a hub connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel(state.outbound_buffer);
    let id = state.registry.register(tx).await;
    debug!(connection = %id, "WebSocket client connected");

    let mut writer = tokio::spawn(write_loop(sink, rx));
    reply(
        &state,
        id,
        &ServerMessage::Connected {
            message: "WebSocket connection established",
        },
    )
    .await;

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(connection = %id, "Writer finished, closing connection");
                break;
            }
            frame = stream.next() => {
                let keep_going = match frame {
                    Some(Ok(message)) => handle_frame(&state, id, message).await,
                    Some(Err(e)) => {
                        debug!(connection = %id, error = %e, "WebSocket error");
                        false
                    }
                    None => false,
                };
                if !keep_going {
                    break;
                }
            }
        }
    }

    // Dropping the registry's sender lets a still-running writer drain
    // and close.
    state.registry.remove(id).await;
    debug!(connection = %id, "WebSocket client disconnected");
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        if sink.send(message).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Returns `false` when the connection should end.
async fn handle_frame(state: &HubState, id: ConnectionId, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            handle_text(state, id, text.as_str()).await;
            true
        }
        Message::Pong(_) => {
            state.registry.mark_alive(id).await;
            true
        }
        Message::Close(_) => false,
        // axum answers pings itself; binary frames are not part of the protocol.
        Message::Ping(_) | Message::Binary(_) => true,
    }
}

async fn handle_text(state: &HubState, id: ConnectionId, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(connection = %id, error = %e, "Rejected client message");
            reply(state, id, &ServerMessage::Error { message: e.reply() }).await;
            return;
        }
    };

    match message {
        ClientMessage::Auth { token } => authenticate(state, id, token.as_deref()).await,
        ClientMessage::Subscribe { channel } => {
            let answer = if state.registry.identity(id).await.is_some() {
                ServerMessage::Subscribed { channel: &channel }
            } else {
                ServerMessage::Error {
                    message: NOT_AUTHENTICATED,
                }
            };
            reply(state, id, &answer).await;
        }
        ClientMessage::Ping => {
            let pong = ServerMessage::Pong {
                timestamp: Utc::now().timestamp_millis(),
            };
            reply(state, id, &pong).await;
        }
    }
}

async fn authenticate(state: &HubState, id: ConnectionId, token: Option<&str>) {
    let Some(token) = token else {
        reply(state, id, &ServerMessage::AuthError { message: NO_TOKEN }).await;
        return;
    };
    let claims = match state.verifier.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(connection = %id, error = %e, "Authentication failed");
            reply(
                state,
                id,
                &ServerMessage::AuthError {
                    message: INVALID_TOKEN,
                },
            )
            .await;
            return;
        }
    };

    let identity = Identity {
        user_id: claims.user_id,
        company_id: claims.company_id,
    };
    let mut greeting = Vec::with_capacity(2);
    let success = ServerMessage::AuthSuccess {
        user_id: identity.user_id,
        company_id: identity.company_id,
    };
    match success.encode() {
        Ok(text) => greeting.push(text),
        Err(e) => warn!(connection = %id, error = %e, "Failed to encode auth_success"),
    }
    let mut greeting_tick = None;
    if let Some(latest) = state.publisher.latest() {
        match ServerMessage::TickUpdate(&latest).encode() {
            Ok(text) => {
                greeting.push(text);
                greeting_tick = Some(latest.tick_number);
            }
            Err(e) => warn!(connection = %id, error = %e, "Failed to encode tick update"),
        }
    }

    if state
        .registry
        .authenticate(id, identity, &greeting, greeting_tick)
        .await
    {
        info!(
            connection = %id,
            user_id = %identity.user_id,
            company_id = ?identity.company_id,
            "Client authenticated"
        );
    }
}

async fn reply(state: &HubState, id: ConnectionId, message: &ServerMessage<'_>) {
    match message.encode() {
        Ok(text) => {
            state.registry.send_to(id, Message::Text(text)).await;
        }
        Err(e) => warn!(connection = %id, error = %e, "Failed to encode reply"),
    }
}
