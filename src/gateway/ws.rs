//! WebSocket admission and the per-connection read/write loop.
//!
//! Admission happens after the HTTP upgrade completes, because only then can
//! the engine send a close frame carrying a reason code: `4001` for a
//! malformed session code, `4002` for a malformed user id, `4004` for a
//! session that does not exist or has expired (an extension beyond the
//! minimum close-code set, since the two cases need different client
//! handling: retry the join form versus drop the stale invite link).

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::protocol::{validate_session_code, validate_user_id, ClientMessage, ServerMessage};

use super::{handlers, AppState};

const MAX_FRAME_BYTES: usize = 10 * 1024;

#[derive(Deserialize)]
pub struct WsParams {
    user_id: String,
}

pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Oversized frames are rejected inline with an `error` frame while
    // keeping the channel open, so the size limit is enforced by hand in the
    // read loop below rather than via `max_message_size`, which drops the
    // connection outright.
    ws.on_upgrade(move |socket| handle_socket(socket, state, code, params.user_id))
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(WsMessage::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, raw_code: String, raw_user_id: String) {
    let code = match validate_session_code(&raw_code) {
        Ok(c) => c,
        Err(reason) => return close(&mut socket, 4001, &reason).await,
    };
    let user_id = match validate_user_id(&raw_user_id) {
        Ok(u) => u,
        Err(reason) => return close(&mut socket, 4002, &reason).await,
    };

    let session = match state.sessions.get_session(&code).await {
        Ok(session) => session,
        Err(_) => return close(&mut socket, 4004, "session not found").await,
    };
    if session.is_expired() {
        return close(&mut socket, 4004, "session expired").await;
    }
    let is_host = session.is_host(&user_id);

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.registry.attach(&code, &user_id, is_host, tx.clone()).await;

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else { continue };
            if ws_sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = ws_stream.next().await {
        match frame {
            WsMessage::Text(text) => {
                if text.len() > MAX_FRAME_BYTES {
                    let _ = tx.send(ServerMessage::Error { message: "message too large".into() });
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        if let Err(err) = handlers::dispatch(&state, &code, &user_id, is_host, message).await {
                            let _ = tx.send(ServerMessage::Error { message: err.client_message() });
                        }
                    }
                    Err(_) => {
                        let _ = tx.send(ServerMessage::Error { message: "malformed message".into() });
                    }
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    state.registry.detach(&code, &user_id).await;
    if is_host {
        if let Ok(session) = state.sessions.get_session(&code).await {
            if session.status == crate::models::SessionStatus::Active {
                state
                    .registry
                    .broadcast_to_participants(&code, ServerMessage::HostDisconnected)
                    .await;
            }
        }
    } else {
        if let Err(err) = state.sessions.mark_disconnected(&code, &user_id).await {
            tracing::warn!(error = %err, %code, %user_id, "failed to mark participant disconnected");
        }
        if let Ok(session) = state.sessions.get_session(&code).await {
            if let Ok(leaderboard) = state.leaderboard.live(&session).await {
                state
                    .registry
                    .broadcast(&code, ServerMessage::SessionUpdate { participants: leaderboard })
                    .await;
            }
        }
    }
    send_task.abort();
}
