//! Data model shared by every component: quizzes, sessions, participants,
//! and the final ranked results persisted on completion.

mod quiz;
mod results;
mod session;

pub use quiz::{Question, QuestionKind, Quiz};
pub use results::{FinalResult, LeaderboardEntry, RankedResult};
pub use session::{AnswerRecord, Participant, Session, SessionStatus};
