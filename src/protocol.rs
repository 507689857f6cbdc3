//! The WebSocket wire protocol: client-to-server commands and
//! server-to-client frames, plus the validation rules applied to the fields
//! that arrive as free-form strings.

use serde::{Deserialize, Serialize};

use crate::models::{FinalResult, LeaderboardEntry};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        username: String,
    },
    StartQuiz {
        #[serde(default)]
        per_question_time_limit: Option<u32>,
    },
    SubmitAnswer {
        answer: serde_json::Value,
        timestamp: f64,
        #[serde(default)]
        timeout: bool,
    },
    NextQuestion,
    RequestNextQuestion,
    EndQuiz,
    RequestLeaderboard,
    Ping,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStateView {
    pub code: String,
    pub status: &'static str,
    pub quiz_title: String,
    pub total_questions: usize,
    pub current_question_index: usize,
    pub is_host: bool,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionState {
        session: SessionStateView,
    },
    SessionUpdate {
        participants: Vec<LeaderboardEntry>,
    },
    QuizStarted {
        total_questions: usize,
    },
    Question {
        #[serde(flatten)]
        payload: serde_json::Value,
    },
    AnswerResult {
        is_correct: bool,
        points: i64,
        time_bonus: i64,
        multiplier: f64,
        correct_answer: serde_json::Value,
        user_answer: serde_json::Value,
        new_total_score: i64,
        question_type: crate::models::QuestionKind,
        question_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        partial_credit: Option<f64>,
        #[serde(skip_serializing_if = "is_false")]
        is_partial: bool,
    },
    LeaderboardUpdate {
        leaderboard: Vec<LeaderboardEntry>,
    },
    LeaderboardResponse {
        leaderboard: Vec<LeaderboardEntry>,
        total_questions: usize,
    },
    QuizCompleted {
        results: FinalResult,
    },
    QuizEnded {
        results: FinalResult,
    },
    Error {
        message: String,
    },
    HostDisconnected,
    HostReconnected,
    Pong,
}

/// Trimmed length must fall in `[3, 16]`, matching the limits shown to
/// players in the join form.
pub fn validate_username(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.len() < 3 || trimmed.len() > 16 {
        return Err("username must be between 3 and 16 characters".to_string());
    }
    Ok(trimmed.to_string())
}

/// Session codes are always 6 uppercase alphanumeric characters, the
/// alphabet `generate_unique_code` draws from.
pub fn validate_session_code(raw: &str) -> Result<String, String> {
    let upper = raw.trim().to_uppercase();
    if upper.len() != 6 || !upper.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("invalid session code".to_string());
    }
    Ok(upper)
}

/// User ids arrive from the host application's own auth layer; this engine
/// only rejects values that could never be valid keys.
pub fn validate_user_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 128 {
        return Err("invalid user id".to_string());
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("invalid user id".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_username() {
        assert!(validate_username("ab").is_err());
    }

    #[test]
    fn trims_and_accepts_valid_username() {
        assert_eq!(validate_username("  bob  ").unwrap(), "bob");
    }

    #[test]
    fn normalizes_session_code_case() {
        assert_eq!(validate_session_code("ab12cd").unwrap(), "AB12CD");
    }

    #[test]
    fn rejects_wrong_length_session_code() {
        assert!(validate_session_code("AB12").is_err());
    }

    #[test]
    fn parses_submit_answer_message() {
        let raw = r#"{"type":"submit_answer","answer":[0,1],"timestamp":3.5}"#;
        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        match message {
            ClientMessage::SubmitAnswer { timeout, .. } => {
                assert!(!timeout);
            }
            _ => panic!("wrong variant"),
        }
    }
}
