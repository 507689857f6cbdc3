//! Session lifecycle: creation, joining, starting, and ending. Owns the
//! session hash in the fast store; never touches quiz content or scoring.

mod code;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{Participant, Quiz, Session, SessionStatus};
use crate::store::StateStoreClient;

const PARTICIPANTS_LOCK_TTL: Duration = Duration::from_secs(5);
const PARTICIPANTS_LOCK_RETRIES: u32 = 20;
const PARTICIPANTS_LOCK_BACKOFF_BASE: Duration = Duration::from_millis(50);
const PARTICIPANTS_LOCK_BACKOFF_STEP: Duration = Duration::from_millis(20);

pub struct SessionManager {
    store: Arc<StateStoreClient>,
    session_ttl_hours: i64,
}

impl SessionManager {
    pub fn new(store: Arc<StateStoreClient>, session_ttl_hours: i64) -> Self {
        Self {
            store,
            session_ttl_hours,
        }
    }

    fn participants_lock_name(code: &str) -> String {
        format!("session:{code}:participants")
    }

    pub async fn create_session(
        &self,
        quiz: &Quiz,
        host_id: &str,
        per_question_time_limit: u32,
    ) -> EngineResult<Session> {
        let code = code::generate_unique_code(&self.store).await?;
        let now = Utc::now();
        let session = Session {
            code: code.clone(),
            quiz_id: quiz.id.clone(),
            host_id: host_id.to_string(),
            status: SessionStatus::Waiting,
            current_question_index: 0,
            created_at: now,
            expires_at: now + ChronoDuration::hours(self.session_ttl_hours),
            quiz_title: quiz.title.clone(),
            total_questions: quiz.questions.len(),
            per_question_time_limit,
            quiz_start_time: None,
            question_start_time: None,
            participants: Default::default(),
        };
        self.store
            .session_create(&session, self.session_ttl_hours * 3600)
            .await?;
        self.store.quiz_cache_set(&code, quiz).await?;
        Ok(session)
    }

    pub async fn get_session(&self, code: &str) -> EngineResult<Session> {
        self.store
            .session_get(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {code} not found")))
    }

    pub fn is_host(&self, session: &Session, user_id: &str) -> bool {
        session.is_host(user_id)
    }

    /// Adds or reconnects a participant. Existing score and answers survive
    /// a reconnect; only `connected` flips back to `true`.
    pub async fn add_participant(
        &self,
        code: &str,
        user_id: &str,
        username: &str,
    ) -> EngineResult<Participant> {
        let mut session = self.get_session(code).await?;
        if session.is_expired() {
            return Err(EngineError::SessionExpired);
        }
        if session.is_host(user_id) {
            return Err(EngineError::Validation("host cannot join as a participant".into()));
        }
        if session.status == SessionStatus::Completed {
            return Err(EngineError::SessionAlreadyActive);
        }

        let lock_name = Self::participants_lock_name(code);
        let owner = self
            .store
            .lock_acquire(
                &lock_name,
                PARTICIPANTS_LOCK_TTL,
                PARTICIPANTS_LOCK_RETRIES,
                PARTICIPANTS_LOCK_BACKOFF_BASE,
                PARTICIPANTS_LOCK_BACKOFF_STEP,
            )
            .await?
            .ok_or(EngineError::LockBusy)?;

        let result = async {
            session = self.get_session(code).await?;
            let participant = match session.participants.get_mut(user_id) {
                Some(existing) => {
                    existing.connected = true;
                    existing.clone()
                }
                None => {
                    let participant = Participant::new(user_id.to_string(), username.to_string());
                    session
                        .participants
                        .insert(user_id.to_string(), participant.clone());
                    participant
                }
            };
            self.store
                .session_set_participants(code, &session.participants)
                .await?;
            self.store.active_session_set(user_id, code).await?;
            Ok(participant)
        }
        .await;

        self.store.lock_release(&lock_name).await.ok();
        let _ = owner;
        result
    }

    pub async fn mark_disconnected(&self, code: &str, user_id: &str) -> EngineResult<()> {
        let lock_name = Self::participants_lock_name(code);
        let _owner = self
            .store
            .lock_acquire(
                &lock_name,
                PARTICIPANTS_LOCK_TTL,
                PARTICIPANTS_LOCK_RETRIES,
                PARTICIPANTS_LOCK_BACKOFF_BASE,
                PARTICIPANTS_LOCK_BACKOFF_STEP,
            )
            .await?
            .ok_or(EngineError::LockBusy)?;

        let result = async {
            let mut session = self.get_session(code).await?;
            if let Some(participant) = session.participants.get_mut(user_id) {
                participant.connected = false;
                self.store
                    .session_set_participants(code, &session.participants)
                    .await?;
            }
            Ok(())
        }
        .await;

        self.store.lock_release(&lock_name).await.ok();
        result
    }

    pub async fn start_session(&self, code: &str, host_id: &str) -> EngineResult<Session> {
        let session = self.get_session(code).await?;
        if !session.is_host(host_id) {
            return Err(EngineError::Unauthorized("only the host can start the session".into()));
        }
        if session.status != SessionStatus::Waiting {
            return Err(EngineError::SessionAlreadyActive);
        }
        let now = Utc::now().to_rfc3339();
        self.store.session_hset(code, "status", "active").await?;
        self.store.session_hset(code, "quiz_start_time", &now).await?;
        self.store.session_hset(code, "question_start_time", &now).await?;
        self.get_session(code).await
    }

    pub async fn end_session(&self, code: &str) -> EngineResult<Session> {
        self.store.session_hset(code, "status", "completed").await?;
        self.get_session(code).await
    }

    pub async fn set_per_question_time_limit(&self, code: &str, seconds: u32) -> EngineResult<()> {
        self.store
            .session_hset(code, "per_question_time_limit", &seconds.to_string())
            .await
    }
}
