//! The HTTP surface: WebSocket gameplay channel plus the REST auxiliaries
//! used by the host application around a session's lifecycle.

mod handlers;
mod rest;
mod ws;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use tokio::sync::{Mutex, Semaphore};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::doc_store::DocumentStore;
use crate::game::timer::TimerRegistry;
use crate::game::GameController;
use crate::leaderboard::LeaderboardManager;
use crate::registry::ConnectionRegistry;
use crate::session::SessionManager;
use crate::store::StateStoreClient;

pub struct AppState {
    pub config: Config,
    pub store: Arc<StateStoreClient>,
    pub documents: Arc<dyn DocumentStore>,
    pub sessions: Arc<SessionManager>,
    pub game: Arc<GameController>,
    pub leaderboard: Arc<LeaderboardManager>,
    pub registry: Arc<ConnectionRegistry>,
    pub timers: Arc<TimerRegistry>,
    answer_semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<StateStoreClient>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(store.clone(), config.session_ttl_hours));
        let game = Arc::new(GameController::new(store.clone(), documents.clone()));
        let leaderboard = Arc::new(LeaderboardManager::new(store.clone()));
        Self {
            config,
            store,
            documents,
            sessions,
            game,
            leaderboard,
            registry: Arc::new(ConnectionRegistry::new()),
            timers: Arc::new(TimerRegistry::new()),
            answer_semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// Each session gets its own bounded gate on concurrent answer grading,
    /// created lazily the first time a submission for it arrives.
    async fn answer_semaphore(&self, code: &str) -> Arc<Semaphore> {
        let mut map = self.answer_semaphores.lock().await;
        map.entry(code.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(10)))
            .clone()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    };

    // The timeout only wraps the REST surface: a WebSocket upgrade response
    // completes immediately, but the layer would otherwise sit in front of
    // every byte exchanged over the long-lived socket afterward.
    let rest_routes = Router::new()
        .route("/healthz", get(rest::healthz))
        .route("/readyz", get(rest::readyz))
        .route("/api/multiplayer/create-session", post(rest::create_session))
        .route("/api/multiplayer/session/{code}", get(rest::get_session))
        .route(
            "/api/multiplayer/session/{code}/participants",
            get(rest::get_participants),
        )
        .route("/api/multiplayer/session/{code}/join", post(rest::join_session))
        .route("/api/multiplayer/session/{code}/start", post(rest::start_session))
        .route("/api/multiplayer/session/{code}/end", post(rest::end_session))
        .route("/api/multiplayer/session/{code}/validate", get(rest::validate_session))
        .route(
            "/api/multiplayer/user/{user_id}/active-session",
            get(rest::get_active_session).delete(rest::clear_active_session),
        )
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        );

    let ws_routes = Router::new().route("/api/ws/{code}", get(ws::upgrade));

    rest_routes
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn handle_timeout_error(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(serde_json::json!({ "success": false, "message": "request timed out" })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "success": false, "message": "internal error" })),
        )
    }
}
