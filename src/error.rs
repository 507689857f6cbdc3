//! Engine-wide error type.
//!
//! Every component returns `EngineError` so the Gateway has one place to
//! decide how to present a failure: an `error` frame on a WebSocket channel,
//! or an HTTP status on a REST response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("already answered")]
    AlreadyAnswered,

    #[error("session expired")]
    SessionExpired,

    #[error("session is already active")]
    SessionAlreadyActive,

    #[error("quiz has already ended")]
    QuizEnded,

    #[error("server busy, please try again")]
    LockBusy,

    #[error("please wait before submitting again")]
    RateLimited,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// The message shown to clients, e.g. in an outbound `error` frame.
    pub fn client_message(&self) -> String {
        match self {
            EngineError::Internal(_) | EngineError::LockBusy => {
                "server busy, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::AlreadyAnswered
            | EngineError::SessionAlreadyActive
            | EngineError::QuizEnded => StatusCode::CONFLICT,
            EngineError::SessionExpired => StatusCode::GONE,
            EngineError::LockBusy => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            EngineError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            success: false,
            message: self.client_message(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
