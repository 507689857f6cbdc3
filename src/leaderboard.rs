//! Builds live and final leaderboard views from a session's participants.
//!
//! Ranking is always by score descending; ties break on answered-count
//! descending, then on join order, so the ranking is stable even when two
//! participants finish with identical scores.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::models::{FinalResult, LeaderboardEntry, RankedResult, Session};
use crate::store::StateStoreClient;

pub struct LeaderboardManager {
    store: Arc<StateStoreClient>,
}

impl LeaderboardManager {
    pub fn new(store: Arc<StateStoreClient>) -> Self {
        Self { store }
    }

    pub async fn live(&self, session: &Session) -> EngineResult<Vec<LeaderboardEntry>> {
        let mut entries = Vec::with_capacity(session.participants.len());
        for participant in session.participants.values() {
            let question_index = self
                .store
                .participant_index_get(&session.code, &participant.user_id)
                .await?
                .unwrap_or(0);
            entries.push(LeaderboardEntry {
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score,
                question_index,
                answered_count: participant.answered_count(),
                total_questions: session.total_questions,
                connected: participant.connected,
                joined_at: participant.joined_at,
            });
        }
        sort_entries(&mut entries);
        Ok(entries)
    }

    pub fn final_result(&self, session: &Session) -> FinalResult {
        let mut ranked: Vec<RankedResult> = session
            .participants
            .values()
            .map(|p| RankedResult {
                rank: 0,
                user_id: p.user_id.clone(),
                username: p.username.clone(),
                score: p.score,
                answers: p.answers.clone(),
                joined_at: p.joined_at,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.answers.len().cmp(&a.answers.len()))
                .then_with(|| a.joined_at.cmp(&b.joined_at))
        });
        for (i, row) in ranked.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        FinalResult {
            session_code: session.code.clone(),
            quiz_id: session.quiz_id.clone(),
            total_questions: session.total_questions,
            results: ranked,
        }
    }
}

fn sort_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.answered_count.cmp(&a.answered_count))
            .then_with(|| a.joined_at.cmp(&b.joined_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Participant, Session};

    fn participant(id: &str, score: i64, answered: usize) -> Participant {
        let mut p = Participant::new(id.to_string(), id.to_string());
        p.score = score;
        for i in 0..answered {
            p.answers.push(crate::models::AnswerRecord {
                question_index: i,
                answer: serde_json::Value::Null,
                timestamp: 0.0,
                is_correct: true,
                points_earned: 100,
            });
        }
        p
    }

    #[test]
    fn ties_break_on_answered_count() {
        let now = chrono::Utc::now();
        let mut entries = vec![
            LeaderboardEntry {
                user_id: "a".into(),
                username: "a".into(),
                score: 100,
                question_index: 1,
                answered_count: 1,
                total_questions: 5,
                connected: true,
                joined_at: now,
            },
            LeaderboardEntry {
                user_id: "b".into(),
                username: "b".into(),
                score: 100,
                question_index: 2,
                answered_count: 2,
                total_questions: 5,
                connected: true,
                joined_at: now,
            },
        ];
        sort_entries(&mut entries);
        assert_eq!(entries[0].user_id, "b");
    }

    #[test]
    fn ties_break_on_joined_at_when_answered_count_matches() {
        let earlier = chrono::Utc::now();
        let later = earlier + chrono::Duration::seconds(5);
        let mut entries = vec![
            LeaderboardEntry {
                user_id: "late".into(),
                username: "late".into(),
                score: 100,
                question_index: 1,
                answered_count: 1,
                total_questions: 5,
                connected: true,
                joined_at: later,
            },
            LeaderboardEntry {
                user_id: "early".into(),
                username: "early".into(),
                score: 100,
                question_index: 1,
                answered_count: 1,
                total_questions: 5,
                connected: true,
                joined_at: earlier,
            },
        ];
        sort_entries(&mut entries);
        assert_eq!(entries[0].user_id, "early");
    }

    #[test]
    fn final_result_ranks_by_score_descending() {
        let mut session = Session {
            code: "ABC123".into(),
            quiz_id: "q1".into(),
            host_id: "host".into(),
            status: crate::models::SessionStatus::Completed,
            current_question_index: 2,
            created_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now(),
            quiz_title: "t".into(),
            total_questions: 2,
            per_question_time_limit: 20,
            quiz_start_time: None,
            question_start_time: None,
            participants: Default::default(),
        };
        session.participants.insert("a".into(), participant("a", 50, 2));
        session.participants.insert("b".into(), participant("b", 150, 2));

        let manager = LeaderboardManager::new(Arc::new(StateStoreClient::new(Arc::new(
            crate::store::MemoryBackend::new(),
        ))));
        let result = manager.final_result(&session);
        assert_eq!(result.results[0].user_id, "b");
        assert_eq!(result.results[0].rank, 1);
        assert_eq!(result.results[1].rank, 2);
    }
}
