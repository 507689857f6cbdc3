//! Leaderboard and final-result views derived from a session's participants.

use serde::{Deserialize, Serialize};

/// One row of a live or final leaderboard. Never deserialized: it only ever
/// flows outward to a connected client.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub score: i64,
    /// The next question this player has not yet seen.
    pub question_index: usize,
    pub answered_count: usize,
    pub total_questions: usize,
    pub connected: bool,
    /// Not part of the wire payload; carried only to break leaderboard ties.
    #[serde(skip)]
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// A participant's position in the final ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub score: i64,
    pub answers: Vec<crate::models::AnswerRecord>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// The persisted outcome of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub session_code: String,
    pub quiz_id: String,
    pub total_questions: usize,
    pub results: Vec<RankedResult>,
}
