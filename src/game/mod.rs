//! Quiz content delivery, answer submission, and grading.

pub mod grading;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::doc_store::DocumentStore;
use crate::error::{EngineError, EngineResult};
use crate::models::{AnswerRecord, Quiz, Session};
use crate::store::StateStoreClient;

const ANSWER_LOCK_TTL: Duration = Duration::from_secs(5);
const ANSWER_LOCK_RETRIES: u32 = 20;
const ANSWER_LOCK_BACKOFF_BASE: Duration = Duration::from_millis(50);
const ANSWER_LOCK_BACKOFF_STEP: Duration = Duration::from_millis(20);

const PARTICIPANTS_LOCK_TTL: Duration = Duration::from_secs(3);
const PARTICIPANTS_LOCK_RETRIES: u32 = 50;
const PARTICIPANTS_LOCK_BACKOFF_BASE: Duration = Duration::from_millis(20);
const PARTICIPANTS_LOCK_BACKOFF_STEP: Duration = Duration::from_millis(20);

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

pub struct SubmitOutcome {
    pub record: AnswerRecord,
    pub new_score: i64,
    pub time_bonus: i64,
    pub multiplier: f64,
    pub correct_answer: serde_json::Value,
    pub question_type: crate::models::QuestionKind,
    pub partial_credit: Option<f64>,
    pub is_partial: bool,
}

pub struct GameController {
    store: Arc<StateStoreClient>,
    documents: Arc<dyn DocumentStore>,
}

impl GameController {
    pub fn new(store: Arc<StateStoreClient>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { store, documents }
    }

    /// Quiz content, cache-first. A cold cache costs one document-store
    /// round trip; every subsequent read in the session's lifetime is
    /// served from the fast store.
    pub async fn load_quiz(&self, session: &Session) -> EngineResult<Quiz> {
        if let Some(quiz) = self.store.quiz_cache_get(&session.code).await? {
            return Ok(quiz);
        }
        let quiz = self
            .documents
            .get_quiz(&session.quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("quiz {} not found", session.quiz_id)))?;
        self.store.quiz_cache_set(&session.code, &quiz).await?;
        Ok(quiz)
    }

    /// Builds the wire payload for one question, overriding its per-question
    /// `time_limit` with the session's `per_question_time_limit`.
    pub async fn get_question_payload(
        &self,
        session: &Session,
        index: usize,
    ) -> EngineResult<serde_json::Value> {
        let quiz = self.load_quiz(session).await?;
        let question = quiz
            .questions
            .get(index)
            .ok_or_else(|| EngineError::NotFound(format!("question {index} out of range")))?;
        if question.question.trim().is_empty() {
            return Err(EngineError::Internal(anyhow::anyhow!(
                "question {index} has empty text"
            )));
        }
        let mut question_json = serde_json::to_value(question).map_err(|e| EngineError::Internal(e.into()))?;
        if let Some(obj) = question_json.as_object_mut() {
            obj.insert(
                "timeLimit".into(),
                serde_json::json!(session.per_question_time_limit),
            );
        }

        let time_remaining = session
            .question_start_time
            .map(|started| {
                let elapsed = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
                (session.per_question_time_limit as f64 - elapsed).max(0.0)
            })
            .unwrap_or(session.per_question_time_limit as f64);

        Ok(serde_json::json!({
            "question": question_json,
            "index": index,
            "total": session.total_questions,
            "time_limit": session.per_question_time_limit,
            "time_remaining": time_remaining,
        }))
    }

    pub async fn participant_index(&self, code: &str, user_id: &str) -> EngineResult<usize> {
        Ok(self
            .store
            .participant_index_get(code, user_id)
            .await?
            .unwrap_or(0))
    }

    pub async fn set_participant_index(&self, code: &str, user_id: &str, index: usize) -> EngineResult<()> {
        self.store.participant_index_set(code, user_id, index).await
    }

    /// Grades and records one submitted answer, updating the participant's
    /// score and advancing their self-paced question index. The question
    /// graded is always the player's own stored index — never a value
    /// supplied by the client — so a submission can neither skip ahead nor
    /// re-grade a question out of order. Rejects a repeat submission for the
    /// same question and enforces a one-per-second rate limit per
    /// participant.
    pub async fn submit_answer(
        &self,
        code: &str,
        user_id: &str,
        answer: serde_json::Value,
        elapsed_seconds: f64,
    ) -> EngineResult<SubmitOutcome> {
        if !self.store.rate_limit_check(code, user_id, RATE_LIMIT_WINDOW).await? {
            return Err(EngineError::RateLimited);
        }

        let answer_lock = format!("answer:{code}:{user_id}");
        let owner = self
            .store
            .lock_acquire(
                &answer_lock,
                ANSWER_LOCK_TTL,
                ANSWER_LOCK_RETRIES,
                ANSWER_LOCK_BACKOFF_BASE,
                ANSWER_LOCK_BACKOFF_STEP,
            )
            .await?
            .ok_or(EngineError::LockBusy)?;

        let result = self.process_answer_locked(code, user_id, answer, elapsed_seconds).await;

        self.store.lock_release(&answer_lock).await.ok();
        let _ = owner;
        result
    }

    async fn process_answer_locked(
        &self,
        code: &str,
        user_id: &str,
        answer: serde_json::Value,
        elapsed_seconds: f64,
    ) -> EngineResult<SubmitOutcome> {
        let session = self
            .store
            .session_get(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {code} not found")))?;
        if session.status != crate::models::SessionStatus::Active {
            return Err(EngineError::QuizEnded);
        }
        let participant = session
            .participants
            .get(user_id)
            .ok_or_else(|| EngineError::Validation("not a participant in this session".into()))?;
        let question_index = self.participant_index(code, user_id).await?;
        if participant.has_answered(question_index) {
            return Err(EngineError::AlreadyAnswered);
        }

        let quiz = self.load_quiz(&session).await?;
        let question = quiz
            .questions
            .get(question_index)
            .ok_or_else(|| EngineError::Validation("question index out of range".into()))?;

        let outcome = grading::grade_answer(question, &answer, elapsed_seconds, session.per_question_time_limit);
        let correct_answer = grading::correct_answer_value(question);
        let question_type = question.kind;
        let record = AnswerRecord {
            question_index,
            answer,
            timestamp: elapsed_seconds,
            is_correct: outcome.is_correct,
            points_earned: outcome.points_earned,
        };

        let new_score = self
            .apply_answer(code, user_id, record.clone())
            .await?;

        self.store
            .participant_index_set(code, user_id, question_index + 1)
            .await?;

        Ok(SubmitOutcome {
            record,
            new_score,
            time_bonus: outcome.time_bonus,
            multiplier: outcome.multiplier,
            correct_answer,
            question_type,
            partial_credit: outcome.partial_credit,
            is_partial: outcome.is_partial(),
        })
    }

    /// Appends the answer record and adds its points under the session-wide
    /// participants lock, so two concurrent graders never clobber each
    /// other's score update.
    async fn apply_answer(&self, code: &str, user_id: &str, record: AnswerRecord) -> EngineResult<i64> {
        let lock_name = format!("session:{code}:participants");
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
            let mut session = self
                .store
                .session_get(code)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("session {code} not found")))?;
            let participant = session
                .participants
                .get_mut(user_id)
                .ok_or_else(|| EngineError::Validation("not a participant in this session".into()))?;
            if participant.has_answered(record.question_index) {
                return Err(EngineError::AlreadyAnswered);
            }
            participant.score += record.points_earned;
            participant.answers.push(record);
            let new_score = participant.score;
            self.store
                .session_set_participants(code, &session.participants)
                .await?;
            Ok(new_score)
        }
        .await;

        self.store.lock_release(&lock_name).await.ok();
        let _ = owner;
        result
    }

    /// Host-paced advance: moves the shared question cursor forward and
    /// resets the question clock. Self-paced clients ignore this and track
    /// their own index instead.
    pub async fn advance_question(&self, code: &str) -> EngineResult<usize> {
        let session = self
            .store
            .session_get(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {code} not found")))?;
        let next = session.current_question_index + 1;
        self.store
            .session_hset(code, "current_question_index", &next.to_string())
            .await?;
        self.store
            .session_hset(code, "question_start_time", &Utc::now().to_rfc3339())
            .await?;
        Ok(next)
    }

    /// Non-blocking: skips the scan entirely if another task already holds
    /// the completion-check lock, since a missed check is caught by the
    /// next submission or auto-advance tick. The lock only guards against two
    /// scans racing each other, so it is released again as soon as this scan
    /// finishes rather than held for its full TTL.
    pub async fn check_all_participants_completed(&self, code: &str) -> EngineResult<bool> {
        let lock_name = format!("completion_check:{code}");
        if !self.store.lock_try_once(&lock_name, Duration::from_secs(30)).await? {
            return Ok(false);
        }

        let result = async {
            let session = self
                .store
                .session_get(code)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("session {code} not found")))?;
            if session.participants.is_empty() {
                return Ok(false);
            }
            let mut all_done = true;
            for user_id in session.participants.keys() {
                let index = self.participant_index(code, user_id).await?;
                if index < session.total_questions {
                    all_done = false;
                    break;
                }
            }
            Ok(all_done)
        }
        .await;

        self.store.lock_release(&lock_name).await.ok();
        result
    }
}
