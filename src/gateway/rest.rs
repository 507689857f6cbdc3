//! REST auxiliaries around session lifecycle: creation, lookup, join/start/end
//! outside the WebSocket channel, and the active-session lookup a host
//! application uses to reconnect a user to the right session after a reload.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::SessionStatus;

use super::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub quiz_id: String,
    pub host_id: String,
    #[serde(default)]
    pub per_question_time_limit: Option<u32>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_code: String,
    pub message: String,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> EngineResult<impl IntoResponse> {
    let quiz = state
        .documents
        .get_quiz(&body.quiz_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("quiz {} not found", body.quiz_id)))?;
    let limit = body.per_question_time_limit.unwrap_or(state.config.default_question_seconds);
    let session = state.sessions.create_session(&quiz, &body.host_id, limit).await?;
    Ok(Json(CreateSessionResponse {
        success: true,
        session_code: session.code,
        message: "session created".into(),
    }))
}

#[derive(Serialize)]
pub struct SessionView {
    pub code: String,
    pub quiz_id: String,
    pub host_id: String,
    pub status: &'static str,
    pub quiz_title: String,
    pub total_questions: usize,
    pub current_question_index: usize,
    pub per_question_time_limit: u32,
    pub participant_count: usize,
}

fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Waiting => "waiting",
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
    }
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> EngineResult<impl IntoResponse> {
    let session = state.sessions.get_session(&code).await?;
    Ok(Json(SessionView {
        code: session.code.clone(),
        quiz_id: session.quiz_id.clone(),
        host_id: session.host_id.clone(),
        status: status_label(session.status),
        quiz_title: session.quiz_title.clone(),
        total_questions: session.total_questions,
        current_question_index: session.current_question_index,
        per_question_time_limit: session.per_question_time_limit,
        participant_count: session.participants.len(),
    }))
}

#[derive(Serialize)]
pub struct ParticipantView {
    pub user_id: String,
    pub username: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub score: i64,
    pub connected: bool,
}

#[derive(Serialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<ParticipantView>,
    pub participant_count: usize,
    pub is_started: bool,
}

pub async fn get_participants(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> EngineResult<impl IntoResponse> {
    let session = state.sessions.get_session(&code).await?;
    let participants: Vec<ParticipantView> = session
        .participants
        .values()
        .map(|p| ParticipantView {
            user_id: p.user_id.clone(),
            username: p.username.clone(),
            joined_at: p.joined_at,
            score: p.score,
            connected: p.connected,
        })
        .collect();
    Ok(Json(ParticipantsResponse {
        participant_count: participants.len(),
        participants,
        is_started: session.status != SessionStatus::Waiting,
    }))
}

#[derive(Deserialize)]
pub struct ParticipantJoin {
    pub user_id: String,
    pub username: String,
}

#[derive(Serialize)]
pub struct JoinResponse {
    pub success: bool,
    pub message: String,
}

pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<ParticipantJoin>,
) -> EngineResult<impl IntoResponse> {
    state.sessions.add_participant(&code, &body.user_id, &body.username).await?;
    Ok(Json(JoinResponse { success: true, message: "joined".into() }))
}

#[derive(Deserialize)]
pub struct SessionAction {
    pub host_id: String,
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<SessionAction>,
) -> EngineResult<impl IntoResponse> {
    state.sessions.start_session(&code, &body.host_id).await?;
    Ok(Json(JoinResponse { success: true, message: "session started".into() }))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<SessionAction>,
) -> EngineResult<impl IntoResponse> {
    let session = state.sessions.get_session(&code).await?;
    if !session.is_host(&body.host_id) {
        return Err(EngineError::Unauthorized("only the host can end the session".into()));
    }
    state.sessions.end_session(&code).await?;
    Ok(Json(JoinResponse { success: true, message: "session ended".into() }))
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub valid: bool,
    pub message: String,
}

/// Never returns an error response, even for an unknown code — callers use
/// this to decide whether to show a "rejoin" prompt, not to branch on HTTP
/// status.
pub async fn validate_session(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> impl IntoResponse {
    match state.sessions.get_session(&code).await {
        Ok(session) if !session.is_expired() => Json(ValidateResponse {
            success: true,
            valid: true,
            message: "session is valid".into(),
        }),
        Ok(_) => Json(ValidateResponse {
            success: true,
            valid: false,
            message: "session has expired".into(),
        }),
        Err(_) => Json(ValidateResponse {
            success: true,
            valid: false,
            message: "session not found".into(),
        }),
    }
}

#[derive(Serialize)]
pub struct ActiveSessionResponse {
    pub has_active_session: bool,
    pub session_code: Option<String>,
    pub is_host: Option<bool>,
    pub question_index: Option<usize>,
}

/// Self-heals stale tracking: if the pointer survives but the session
/// itself is gone or expired, the pointer is discarded before the response
/// is built.
pub async fn get_active_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> EngineResult<impl IntoResponse> {
    let Some(code) = state.store.active_session_get(&user_id).await? else {
        return Ok(Json(ActiveSessionResponse {
            has_active_session: false,
            session_code: None,
            is_host: None,
            question_index: None,
        }));
    };

    let session = match state.sessions.get_session(&code).await {
        Ok(session) if !session.is_expired() && session.status != SessionStatus::Completed => session,
        _ => {
            state.store.active_session_clear(&user_id).await?;
            return Ok(Json(ActiveSessionResponse {
                has_active_session: false,
                session_code: None,
                is_host: None,
                question_index: None,
            }));
        }
    };

    let is_host = session.is_host(&user_id);
    let question_index = if is_host {
        None
    } else {
        Some(state.game.participant_index(&code, &user_id).await?)
    };

    Ok(Json(ActiveSessionResponse {
        has_active_session: true,
        session_code: Some(code),
        is_host: Some(is_host),
        question_index,
    }))
}

pub async fn clear_active_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> EngineResult<impl IntoResponse> {
    state.store.active_session_clear(&user_id).await?;
    Ok(Json(JoinResponse { success: true, message: "cleared".into() }))
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let fast_ok = state.store.ping().await.is_ok();
    let doc_ok = state.documents.ping().await.is_ok();
    if fast_ok && doc_ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready", "fast_store": fast_ok, "document_store": doc_ok })),
        )
    }
}
