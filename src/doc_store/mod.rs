//! The document store: quiz content lookup and persisted final results.
//!
//! Quizzes are authored elsewhere and read-only from this engine's
//! perspective; final results are written once per session, keyed by
//! session code so a retry never duplicates a row.

mod memory;
mod mongo_store;

pub use memory::MemoryDocumentStore;
pub use mongo_store::MongoDocumentStore;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::models::{FinalResult, Quiz};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_quiz(&self, quiz_id: &str) -> EngineResult<Option<Quiz>>;
    async fn save_final_result(&self, result: &FinalResult) -> EngineResult<()>;
    async fn ping(&self) -> EngineResult<()>;
}
