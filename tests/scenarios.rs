//! End-to-end scenarios exercised against the session/game/leaderboard
//! layer directly, with an in-memory fast store and document store.
//! These bypass the WebSocket gateway: the wire framing is covered by
//! `protocol.rs`'s own unit tests, so what's worth checking end-to-end
//! here is the interaction between locks, scoring, and completion
//! detection across multiple participants.

use std::sync::Arc;
use std::time::Duration;

use quiz_session_engine::doc_store::MemoryDocumentStore;
use quiz_session_engine::error::EngineError;
use quiz_session_engine::game::GameController;
use quiz_session_engine::leaderboard::LeaderboardManager;
use quiz_session_engine::models::{Question, QuestionKind, Quiz, SessionStatus};
use quiz_session_engine::session::SessionManager;
use quiz_session_engine::store::{MemoryBackend, StateStoreClient};

/// The per-user answer rate limit holds for a full second of real wall
/// clock time (the in-memory store's TTLs aren't subject to tokio's
/// virtual clock), so tests with the same user submitting twice must
/// actually wait this long between submissions.
const PAST_RATE_LIMIT_WINDOW: Duration = Duration::from_millis(1100);

fn single_mcq(text: &str, correct: usize) -> Question {
    Question {
        question: text.to_string(),
        kind: QuestionKind::SingleMcq,
        options: vec!["a".into(), "b".into(), "c".into()],
        id: None,
        time_limit: None,
        correct_answer_index: Some(correct),
        correct_answer_indices: None,
        drag_items: None,
        drop_targets: None,
        correct_matches: None,
        image_url: None,
    }
}

struct Harness {
    sessions: Arc<SessionManager>,
    game: Arc<GameController>,
    leaderboard: Arc<LeaderboardManager>,
    documents: Arc<MemoryDocumentStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(StateStoreClient::new(Arc::new(MemoryBackend::new())));
        let documents = Arc::new(MemoryDocumentStore::new());
        Self {
            sessions: Arc::new(SessionManager::new(store.clone(), 6)),
            game: Arc::new(GameController::new(store.clone(), documents.clone())),
            leaderboard: Arc::new(LeaderboardManager::new(store)),
            documents,
        }
    }

    async fn seed_quiz(&self, id: &str, questions: Vec<Question>) -> Quiz {
        let quiz = Quiz {
            id: id.to_string(),
            title: "trivia night".to_string(),
            questions,
        };
        self.documents.seed_quiz(quiz.clone()).await;
        quiz
    }
}

#[tokio::test]
async fn single_player_happy_path() {
    let h = Harness::new();
    let quiz = h
        .seed_quiz(
            "q1",
            vec![single_mcq("2+2?", 1), single_mcq("capital of france?", 0)],
        )
        .await;

    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();
    h.sessions.add_participant(&session.code, "alice", "Alice").await.unwrap();
    h.sessions.start_session(&session.code, "host").await.unwrap();

    // Correct, answered instantly: full base points, max speed bonus.
    let outcome = h
        .game
        .submit_answer(&session.code, "alice", serde_json::json!(1), 0.0)
        .await
        .unwrap();
    assert!(outcome.record.is_correct);
    assert_eq!(outcome.new_score, 2000);

    tokio::time::sleep(PAST_RATE_LIMIT_WINDOW).await;

    // Wrong answer on the second question: zero points.
    let outcome = h
        .game
        .submit_answer(&session.code, "alice", serde_json::json!(2), 3.0)
        .await
        .unwrap();
    assert!(!outcome.record.is_correct);
    assert_eq!(outcome.new_score, 2000);

    let session = h.sessions.get_session(&session.code).await.unwrap();
    let final_result = h.leaderboard.final_result(&session);
    assert_eq!(final_result.results.len(), 1);
    assert_eq!(final_result.results[0].rank, 1);
    assert_eq!(final_result.results[0].score, 2000);
}

#[tokio::test]
async fn fifty_concurrent_submissions_all_score_identically() {
    let h = Harness::new();
    let quiz = h.seed_quiz("q1", vec![single_mcq("only question", 0)]).await;
    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();

    for i in 0..50 {
        let user = format!("user{i}");
        h.sessions.add_participant(&session.code, &user, &user).await.unwrap();
    }
    h.sessions.start_session(&session.code, "host").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..50 {
        let user = format!("user{i}");
        let game = h.game.clone();
        let code = session.code.clone();
        handles.push(tokio::spawn(async move {
            game.submit_answer(&code, &user, serde_json::json!(0), 1.0).await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        // t=1s, T=10s: multiplier = 2.0 - 1/10 = 1.9, bonus = round(1000*0.9) = 900.
        assert_eq!(outcome.new_score, 1900);
    }

    let session = h.sessions.get_session(&session.code).await.unwrap();
    let board = h.leaderboard.live(&session).await.unwrap();
    assert_eq!(board.len(), 50);
    assert!(board.iter().all(|e| e.score == 1900 && e.answered_count == 1));
}

#[tokio::test]
async fn duplicate_submission_is_rejected() {
    let h = Harness::new();
    let quiz = h.seed_quiz("q1", vec![single_mcq("only question", 0)]).await;
    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();
    h.sessions.add_participant(&session.code, "alice", "Alice").await.unwrap();
    h.sessions.start_session(&session.code, "host").await.unwrap();

    h.game
        .submit_answer(&session.code, "alice", serde_json::json!(0), 1.0)
        .await
        .unwrap();

    // A second submission less than a second later hits the per-user rate
    // limit before it would ever reach the "already answered" check.
    let second = h
        .game
        .submit_answer(&session.code, "alice", serde_json::json!(0), 1.2)
        .await;
    assert!(matches!(second, Err(EngineError::RateLimited)));

    let session = h.sessions.get_session(&session.code).await.unwrap();
    assert_eq!(session.participants["alice"].answers.len(), 1);
}

#[tokio::test]
async fn late_joiner_starts_at_question_zero() {
    let h = Harness::new();
    let quiz = h
        .seed_quiz(
            "q1",
            vec![single_mcq("q0", 0), single_mcq("q1", 0), single_mcq("q2", 0)],
        )
        .await;
    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();
    h.sessions.add_participant(&session.code, "alice", "Alice").await.unwrap();
    h.sessions.start_session(&session.code, "host").await.unwrap();

    // Alice races ahead to question 2 before anyone else joins.
    h.game
        .submit_answer(&session.code, "alice", serde_json::json!(0), 1.0)
        .await
        .unwrap();

    // Bob joins only once the session is already active.
    h.sessions.add_participant(&session.code, "bob", "Bob").await.unwrap();
    let bob_index = h.game.participant_index(&session.code, "bob").await.unwrap();
    assert_eq!(bob_index, 0);

    let session = h.sessions.get_session(&session.code).await.unwrap();
    let payload = h.game.get_question_payload(&session, bob_index).await.unwrap();
    assert_eq!(payload["index"], 0);

    // Alice advancing further doesn't move Bob's own cursor.
    tokio::time::sleep(PAST_RATE_LIMIT_WINDOW).await;
    h.game
        .submit_answer(&session.code, "alice", serde_json::json!(0), 1.0)
        .await
        .unwrap();
    let bob_index = h.game.participant_index(&session.code, "bob").await.unwrap();
    assert_eq!(bob_index, 0);
}

#[tokio::test]
async fn host_disconnect_does_not_end_session() {
    let h = Harness::new();
    let quiz = h.seed_quiz("q1", vec![single_mcq("only question", 0)]).await;
    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();
    h.sessions.add_participant(&session.code, "alice", "Alice").await.unwrap();
    h.sessions.start_session(&session.code, "host").await.unwrap();

    // The host disconnecting has no lifecycle effect by itself; only an
    // explicit end_quiz transitions the session.
    let session = h.sessions.get_session(&session.code).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    let outcome = h
        .game
        .submit_answer(&session.code, "alice", serde_json::json!(0), 0.5)
        .await
        .unwrap();
    assert!(outcome.record.is_correct);

    let session = h.sessions.get_session(&session.code).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test]
async fn global_completion_detected_once_for_two_self_paced_players() {
    let h = Harness::new();
    let quiz = h
        .seed_quiz("q1", vec![single_mcq("q0", 0), single_mcq("q1", 0), single_mcq("q2", 0)])
        .await;
    let session = h.sessions.create_session(&quiz, "host", 10).await.unwrap();
    h.sessions.add_participant(&session.code, "alice", "Alice").await.unwrap();
    h.sessions.add_participant(&session.code, "bob", "Bob").await.unwrap();
    h.sessions.start_session(&session.code, "host").await.unwrap();

    for _ in 0..3 {
        h.game
            .submit_answer(&session.code, "alice", serde_json::json!(0), 1.0)
            .await
            .unwrap();
        tokio::time::sleep(PAST_RATE_LIMIT_WINDOW).await;
    }

    for _ in 0..3 {
        h.game
            .submit_answer(&session.code, "bob", serde_json::json!(0), 1.0)
            .await
            .unwrap();
        tokio::time::sleep(PAST_RATE_LIMIT_WINDOW).await;
    }
    assert!(h.game.check_all_participants_completed(&session.code).await.unwrap());

    // The lock only serializes concurrent scans; once released, a later
    // scan against the same already-finished session is idempotent.
    assert!(h.game.check_all_participants_completed(&session.code).await.unwrap());
}
