use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::EngineResult;
use crate::models::{FinalResult, Quiz};

use super::DocumentStore;

/// In-process fake used by tests and `--document-store-url memory://`.
/// Seed it with [`Self::seed_quiz`] before a session references the quiz.
#[derive(Default)]
pub struct MemoryDocumentStore {
    quizzes: Mutex<HashMap<String, Quiz>>,
    results: Mutex<HashMap<String, FinalResult>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_quiz(&self, quiz: Quiz) {
        self.quizzes.lock().await.insert(quiz.id.clone(), quiz);
    }

    pub async fn final_result(&self, session_code: &str) -> Option<FinalResult> {
        self.results.lock().await.get(session_code).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_quiz(&self, quiz_id: &str) -> EngineResult<Option<Quiz>> {
        Ok(self.quizzes.lock().await.get(quiz_id).cloned())
    }

    async fn save_final_result(&self, result: &FinalResult) -> EngineResult<()> {
        self.results
            .lock()
            .await
            .insert(result.session_code.clone(), result.clone());
        Ok(())
    }

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}
