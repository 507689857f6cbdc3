use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{Participant, Quiz, Session, SessionStatus};

use super::FastStoreBackend;

const QUIZ_CACHE_TTL_SECONDS: u64 = 3600;
const COMPLETED_NOTICE_TTL_SECONDS: u64 = 3600;
const ACTIVE_SESSION_TTL_SECONDS: u64 = 3600 * 6;

fn session_key(code: &str) -> String {
    format!("session:{code}")
}

fn lock_key(name: &str) -> String {
    format!("lock:{name}")
}

fn quiz_cache_key(code: &str) -> String {
    format!("quiz_cache:{code}")
}

fn participant_index_key(code: &str, user_id: &str) -> String {
    format!("participant:{code}:{user_id}:question_index")
}

fn completed_key(code: &str, user_id: &str) -> String {
    format!("completed:{code}:{user_id}")
}

fn active_session_key(user_id: &str) -> String {
    format!("user_active_session:{user_id}")
}

/// Typed access to the fast store. Field names on the session hash are
/// fixed, so a lock held by one process and read back by another always
/// sees the same shape.
pub struct StateStoreClient {
    backend: Arc<dyn FastStoreBackend>,
}

impl StateStoreClient {
    pub fn new(backend: Arc<dyn FastStoreBackend>) -> Self {
        Self { backend }
    }

    pub async fn ping(&self) -> EngineResult<()> {
        self.backend.ping().await
    }

    // --- session hash -----------------------------------------------------

    pub async fn session_exists(&self, code: &str) -> EngineResult<bool> {
        self.backend.exists(&session_key(code)).await
    }

    pub async fn session_create(&self, session: &Session, ttl_seconds: i64) -> EngineResult<()> {
        let key = session_key(&session.code);
        let fields = Self::session_fields(session)?;
        self.backend.hset_many(&key, &fields).await?;
        self.backend.expire(&key, ttl_seconds).await
    }

    pub async fn session_hset(&self, code: &str, field: &str, value: &str) -> EngineResult<()> {
        self.backend.hset(&session_key(code), field, value).await
    }

    pub async fn session_hmget(
        &self,
        code: &str,
        fields: &[&str],
    ) -> EngineResult<Vec<Option<String>>> {
        self.backend.hmget(&session_key(code), fields).await
    }

    pub async fn session_get(&self, code: &str) -> EngineResult<Option<Session>> {
        let rows = self.backend.hgetall(&session_key(code)).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::parse_session(code, rows)?))
    }

    pub async fn session_set_participants(
        &self,
        code: &str,
        participants: &std::collections::BTreeMap<String, Participant>,
    ) -> EngineResult<()> {
        let json = serde_json::to_string(participants).map_err(|e| EngineError::Internal(e.into()))?;
        self.session_hset(code, "participants", &json).await
    }

    fn session_fields(session: &Session) -> EngineResult<Vec<(&'static str, String)>> {
        let participants_json =
            serde_json::to_string(&session.participants).map_err(|e| EngineError::Internal(e.into()))?;
        Ok(vec![
            ("code", session.code.clone()),
            ("quiz_id", session.quiz_id.clone()),
            ("host_id", session.host_id.clone()),
            ("status", status_to_str(session.status).to_string()),
            (
                "current_question_index",
                session.current_question_index.to_string(),
            ),
            ("created_at", session.created_at.to_rfc3339()),
            ("expires_at", session.expires_at.to_rfc3339()),
            ("quiz_title", session.quiz_title.clone()),
            ("total_questions", session.total_questions.to_string()),
            (
                "per_question_time_limit",
                session.per_question_time_limit.to_string(),
            ),
            (
                "quiz_start_time",
                session
                    .quiz_start_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
            (
                "question_start_time",
                session
                    .question_start_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
            ("participants", participants_json),
        ])
    }

    fn parse_session(code: &str, rows: Vec<(String, String)>) -> EngineResult<Session> {
        let map: std::collections::HashMap<String, String> = rows.into_iter().collect();
        let get = |field: &str| -> EngineResult<String> {
            map.get(field)
                .cloned()
                .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("session {code} missing field {field}")))
        };
        let parse_time = |raw: &str| -> EngineResult<Option<DateTime<Utc>>> {
            if raw.is_empty() {
                Ok(None)
            } else {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| Some(t.with_timezone(&Utc)))
                    .map_err(|e| EngineError::Internal(e.into()))
            }
        };
        let participants: std::collections::BTreeMap<String, Participant> =
            serde_json::from_str(&get("participants")?).map_err(|e| EngineError::Internal(e.into()))?;

        Ok(Session {
            code: get("code")?,
            quiz_id: get("quiz_id")?,
            host_id: get("host_id")?,
            status: status_from_str(&get("status")?)?,
            current_question_index: get("current_question_index")?
                .parse()
                .map_err(|_| EngineError::Internal(anyhow::anyhow!("bad current_question_index")))?,
            created_at: parse_time(&get("created_at")?)?
                .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("missing created_at")))?,
            expires_at: parse_time(&get("expires_at")?)?
                .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("missing expires_at")))?,
            quiz_title: get("quiz_title")?,
            total_questions: get("total_questions")?
                .parse()
                .map_err(|_| EngineError::Internal(anyhow::anyhow!("bad total_questions")))?,
            per_question_time_limit: get("per_question_time_limit")?
                .parse()
                .map_err(|_| EngineError::Internal(anyhow::anyhow!("bad per_question_time_limit")))?,
            quiz_start_time: parse_time(&get("quiz_start_time")?)?,
            question_start_time: parse_time(&get("question_start_time")?)?,
            participants,
        })
    }

    // --- distributed locks --------------------------------------------------

    /// Acquires a named lock, retrying with linear backoff. Returns an
    /// opaque owner token the caller must present to [`Self::lock_release`].
    pub async fn lock_acquire(
        &self,
        name: &str,
        ttl: Duration,
        max_retries: u32,
        backoff_base: Duration,
        backoff_step: Duration,
    ) -> EngineResult<Option<String>> {
        let key = lock_key(name);
        let owner = uuid::Uuid::new_v4().to_string();
        for attempt in 0..=max_retries {
            if self
                .backend
                .set_nx_ex(&key, &owner, ttl.as_secs())
                .await?
            {
                return Ok(Some(owner));
            }
            if attempt == max_retries {
                break;
            }
            let delay = backoff_base + backoff_step * attempt;
            tokio::time::sleep(delay).await;
        }
        Ok(None)
    }

    /// Attempts a lock once, without retrying. Used for the non-blocking
    /// completion check, which is fine to skip a beat if another task holds
    /// it.
    pub async fn lock_try_once(&self, name: &str, ttl: Duration) -> EngineResult<bool> {
        self.backend
            .set_nx_ex(&lock_key(name), "1", ttl.as_secs())
            .await
    }

    pub async fn lock_release(&self, name: &str) -> EngineResult<()> {
        self.backend.delete(&lock_key(name)).await
    }

    // --- quiz cache ----------------------------------------------------------

    pub async fn quiz_cache_get(&self, code: &str) -> EngineResult<Option<Quiz>> {
        match self.backend.get(&quiz_cache_key(code)).await? {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).map_err(|e| EngineError::Internal(e.into()))?,
            )),
            None => Ok(None),
        }
    }

    pub async fn quiz_cache_set(&self, code: &str, quiz: &Quiz) -> EngineResult<()> {
        let raw = serde_json::to_string(quiz).map_err(|e| EngineError::Internal(e.into()))?;
        self.backend
            .set_ex(&quiz_cache_key(code), &raw, QUIZ_CACHE_TTL_SECONDS)
            .await
    }

    // --- per-participant question index --------------------------------------

    pub async fn participant_index_get(&self, code: &str, user_id: &str) -> EngineResult<Option<usize>> {
        match self.backend.get(&participant_index_key(code, user_id)).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| EngineError::Internal(anyhow::anyhow!("bad participant question index"))),
            None => Ok(None),
        }
    }

    pub async fn participant_index_set(
        &self,
        code: &str,
        user_id: &str,
        index: usize,
    ) -> EngineResult<()> {
        self.backend
            .set_ex(&participant_index_key(code, user_id), &index.to_string(), ACTIVE_SESSION_TTL_SECONDS)
            .await
    }

    // --- rate limiting & dedupe -----------------------------------------------

    /// Returns `true` if the caller is clear to proceed (the key was not
    /// already set), `false` if a request landed within the window.
    pub async fn rate_limit_check(&self, code: &str, user_id: &str, window: Duration) -> EngineResult<bool> {
        let key = format!("rate:answer:{code}:{user_id}");
        self.backend.set_nx_ex(&key, "1", window.as_secs().max(1)).await
    }

    /// Returns `true` the first time it is called for this (code, user)
    /// pair; `false` on any later call, so completion broadcasts fire once.
    pub async fn completed_notice_mark(&self, code: &str, user_id: &str) -> EngineResult<bool> {
        self.backend
            .set_nx_ex(&completed_key(code, user_id), "1", COMPLETED_NOTICE_TTL_SECONDS)
            .await
    }

    // --- active session tracking (used by the REST surface) -------------------

    pub async fn active_session_set(&self, user_id: &str, code: &str) -> EngineResult<()> {
        self.backend
            .set_ex(&active_session_key(user_id), code, ACTIVE_SESSION_TTL_SECONDS)
            .await
    }

    pub async fn active_session_get(&self, user_id: &str) -> EngineResult<Option<String>> {
        self.backend.get(&active_session_key(user_id)).await
    }

    pub async fn active_session_clear(&self, user_id: &str) -> EngineResult<()> {
        self.backend.delete(&active_session_key(user_id)).await
    }
}

fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Waiting => "waiting",
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
    }
}

fn status_from_str(raw: &str) -> EngineResult<SessionStatus> {
    match raw {
        "waiting" => Ok(SessionStatus::Waiting),
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        other => Err(EngineError::Internal(anyhow::anyhow!("unknown session status {other}"))),
    }
}
