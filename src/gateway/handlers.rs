//! One function per WebSocket command. Each takes the already-authenticated
//! `(code, user_id, is_host)` triple and the parsed command body, and
//! returns an [`EngineError`] the caller turns into an `error` frame back to
//! the sender — nothing here closes the connection.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::models::{Session, SessionStatus};
use crate::protocol::{validate_username, ClientMessage, ServerMessage, SessionStateView};

use super::AppState;

pub async fn dispatch(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
    message: ClientMessage,
) -> EngineResult<()> {
    match message {
        ClientMessage::Join { username } => handle_join(state, code, user_id, is_host, username).await,
        ClientMessage::StartQuiz { per_question_time_limit } => {
            handle_start_quiz(state, code, user_id, is_host, per_question_time_limit).await
        }
        ClientMessage::SubmitAnswer { answer, timestamp, timeout } => {
            handle_submit_answer(state, code, user_id, is_host, answer, timestamp, timeout).await
        }
        ClientMessage::NextQuestion => handle_next_question(state, code, user_id, is_host).await,
        ClientMessage::RequestNextQuestion => handle_request_next_question(state, code, user_id).await,
        ClientMessage::EndQuiz => handle_end_quiz(state, code, user_id, is_host).await,
        ClientMessage::RequestLeaderboard => handle_request_leaderboard(state, code, user_id).await,
        ClientMessage::Ping => {
            state.registry.send_to(code, user_id, ServerMessage::Pong).await;
            Ok(())
        }
    }
}

fn session_state_view(session: &Session, is_host: bool) -> SessionStateView {
    SessionStateView {
        code: session.code.clone(),
        status: match session.status {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        },
        quiz_title: session.quiz_title.clone(),
        total_questions: session.total_questions,
        current_question_index: session.current_question_index,
        is_host,
        participant_count: session.participants.len(),
    }
}

async fn handle_join(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
    username: String,
) -> EngineResult<()> {
    if is_host {
        let session = state.sessions.get_session(code).await?;
        state.store.active_session_set(user_id, code).await?;
        let view = session_state_view(&session, true);
        state.registry.send_to(code, user_id, ServerMessage::SessionState { session: view }).await;
        if session.status == SessionStatus::Active {
            state
                .registry
                .broadcast_to_participants(code, ServerMessage::HostReconnected)
                .await;
        }
        return Ok(());
    }

    let username = validate_username(&username).map_err(EngineError::Validation)?;
    state.sessions.add_participant(code, user_id, &username).await?;
    let session = state.sessions.get_session(code).await?;

    let leaderboard = state.leaderboard.live(&session).await?;
    state
        .registry
        .broadcast(code, ServerMessage::SessionUpdate { participants: leaderboard })
        .await;

    let view = session_state_view(&session, false);
    state.registry.send_to(code, user_id, ServerMessage::SessionState { session: view }).await;

    if session.status == SessionStatus::Completed {
        let results = state.leaderboard.final_result(&session);
        state
            .registry
            .send_to(code, user_id, ServerMessage::QuizCompleted { results })
            .await;
    } else if session.status == SessionStatus::Active {
        let index = state.game.participant_index(code, user_id).await?;
        if index < session.total_questions {
            let payload = state.game.get_question_payload(&session, index).await?;
            state.registry.send_to(code, user_id, ServerMessage::Question { payload }).await;
        } else {
            let results = state.leaderboard.final_result(&session);
            state
                .registry
                .send_to(code, user_id, ServerMessage::QuizCompleted { results })
                .await;
        }
    }
    Ok(())
}

async fn handle_start_quiz(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
    per_question_time_limit: Option<u32>,
) -> EngineResult<()> {
    if !is_host {
        return Err(EngineError::Unauthorized("only the host can start the quiz".into()));
    }
    if let Some(limit) = per_question_time_limit {
        state.sessions.set_per_question_time_limit(code, limit).await?;
    }
    let session = state.sessions.start_session(code, user_id).await?;
    for participant_id in session.participants.keys() {
        state.game.set_participant_index(code, participant_id, 0).await?;
    }

    state
        .registry
        .broadcast(code, ServerMessage::QuizStarted { total_questions: session.total_questions })
        .await;
    let payload = state.game.get_question_payload(&session, 0).await?;
    state.registry.broadcast(code, ServerMessage::Question { payload }).await;

    schedule_auto_advance(state.clone(), code.to_string(), 0, question_delay(&session)).await;
    Ok(())
}

async fn handle_submit_answer(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
    answer: serde_json::Value,
    timestamp: f64,
    timeout: bool,
) -> EngineResult<()> {
    if is_host {
        return Err(EngineError::Validation("the host does not submit answers".into()));
    }
    if answer.is_null() && !timeout {
        return Err(EngineError::Validation("answer is required".into()));
    }

    let semaphore = state.answer_semaphore(code).await;
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|e| EngineError::Internal(e.into()))?;

    let user_answer = answer.clone();
    let outcome = state.game.submit_answer(code, user_id, answer, timestamp).await?;

    state
        .registry
        .send_to(
            code,
            user_id,
            ServerMessage::AnswerResult {
                is_correct: outcome.record.is_correct,
                points: outcome.record.points_earned,
                time_bonus: outcome.time_bonus,
                multiplier: outcome.multiplier,
                correct_answer: outcome.correct_answer,
                user_answer,
                new_total_score: outcome.new_score,
                question_type: outcome.question_type,
                question_index: outcome.record.question_index,
                partial_credit: outcome.partial_credit,
                is_partial: outcome.is_partial,
            },
        )
        .await;

    let session = state.sessions.get_session(code).await?;
    let leaderboard = state.leaderboard.live(&session).await?;
    state
        .registry
        .broadcast(code, ServerMessage::LeaderboardUpdate { leaderboard })
        .await;
    Ok(())
}

async fn handle_next_question(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
) -> EngineResult<()> {
    if !is_host {
        return Err(EngineError::Unauthorized("only the host can advance the quiz".into()));
    }
    let session = state.sessions.get_session(code).await?;
    state.timers.cancel(code, session.current_question_index).await;
    let next_index = state.game.advance_question(code).await?;

    if next_index >= session.total_questions {
        return end_quiz(state, code).await;
    }
    let session = state.sessions.get_session(code).await?;
    let payload = state.game.get_question_payload(&session, next_index).await?;
    state.registry.broadcast(code, ServerMessage::Question { payload }).await;
    schedule_auto_advance(state.clone(), code.to_string(), next_index, question_delay(&session)).await;
    let _ = user_id;
    Ok(())
}

async fn handle_request_next_question(state: &Arc<AppState>, code: &str, user_id: &str) -> EngineResult<()> {
    let session = state.sessions.get_session(code).await?;
    let index = state.game.participant_index(code, user_id).await?;

    if index >= session.total_questions {
        if state.store.completed_notice_mark(code, user_id).await?
            && state.game.check_all_participants_completed(code).await?
        {
            end_quiz(state, code).await?;
        }
        let results = state.leaderboard.final_result(&session);
        state
            .registry
            .send_to(code, user_id, ServerMessage::QuizCompleted { results })
            .await;
        return Ok(());
    }

    let payload = state.game.get_question_payload(&session, index).await?;
    state.registry.send_to(code, user_id, ServerMessage::Question { payload }).await;
    Ok(())
}

async fn handle_end_quiz(
    state: &Arc<AppState>,
    code: &str,
    user_id: &str,
    is_host: bool,
) -> EngineResult<()> {
    if !is_host {
        return Err(EngineError::Unauthorized("only the host can end the quiz".into()));
    }
    let _ = user_id;
    end_quiz(state, code).await
}

async fn handle_request_leaderboard(state: &Arc<AppState>, code: &str, user_id: &str) -> EngineResult<()> {
    let session = state.sessions.get_session(code).await?;
    let leaderboard = state.leaderboard.live(&session).await?;
    state
        .registry
        .send_to(
            code,
            user_id,
            ServerMessage::LeaderboardResponse { leaderboard, total_questions: session.total_questions },
        )
        .await;
    Ok(())
}

async fn end_quiz(state: &Arc<AppState>, code: &str) -> EngineResult<()> {
    let session = state.sessions.end_session(code).await?;
    let results = state.leaderboard.final_result(&session);
    state.documents.save_final_result(&results).await?;
    state.timers.cancel_all(code).await;
    state.registry.broadcast(code, ServerMessage::QuizEnded { results }).await;
    Ok(())
}

fn question_delay(session: &Session) -> Duration {
    Duration::from_secs(session.per_question_time_limit as u64 + 2)
}

/// Registers the one-shot fallback that advances the quiz for host-paced
/// clients if nobody calls `next_question` in time. Re-checks the session's
/// current index on fire so a host who already advanced manually is a no-op.
fn schedule_auto_advance(
    state: Arc<AppState>,
    code: String,
    index: usize,
    delay: Duration,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let task_state = state.clone();
        let task_code = code.clone();
        state
            .timers
            .schedule(&code, index, delay, async move {
                if let Err(err) = run_auto_advance(&task_state, &task_code, index).await {
                    tracing::warn!(error = %err, code = %task_code, index, "auto-advance failed");
                }
            })
            .await;
    })
}

async fn run_auto_advance(state: &Arc<AppState>, code: &str, index: usize) -> EngineResult<()> {
    let session = state.sessions.get_session(code).await?;
    if session.status != SessionStatus::Active || session.current_question_index != index {
        return Ok(());
    }
    let next_index = state.game.advance_question(code).await?;
    if next_index >= session.total_questions {
        return end_quiz(state, code).await;
    }
    let session = state.sessions.get_session(code).await?;
    let payload = state.game.get_question_payload(&session, next_index).await?;
    state.registry.broadcast(code, ServerMessage::Question { payload }).await;
    schedule_auto_advance(state.clone(), code.to_string(), next_index, question_delay(&session)).await;
    Ok(())
}
