//! Session and participant state, mirrored 1:1 onto the fast-store hash.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session. Transitions are monotonic and enforced by
/// `SessionManager`: `Waiting -> Active -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

/// A single recorded answer. `answer` is untyped JSON because its shape
/// depends on the question variant: an index, a list of indices, a
/// item-to-target map, or `null` for a timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub answer: serde_json::Value,
    pub timestamp: f64,
    pub is_correct: bool,
    pub points_earned: i64,
}

/// A non-host player admitted to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub connected: bool,
    pub score: i64,
    pub answers: Vec<AnswerRecord>,
}

impl Participant {
    pub fn new(user_id: String, username: String) -> Self {
        Self {
            user_id,
            username,
            joined_at: Utc::now(),
            connected: true,
            score: 0,
            answers: Vec::new(),
        }
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answers
            .iter()
            .any(|a| a.question_index == question_index)
    }
}

/// A live or completed quiz session, keyed by its 6-character code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub code: String,
    pub quiz_id: String,
    pub host_id: String,
    pub status: SessionStatus,
    pub current_question_index: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub quiz_title: String,
    pub total_questions: usize,
    pub per_question_time_limit: u32,
    pub quiz_start_time: Option<DateTime<Utc>>,
    pub question_start_time: Option<DateTime<Utc>>,
    pub participants: BTreeMap<String, Participant>,
}

impl Session {
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
