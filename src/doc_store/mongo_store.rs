//! MongoDB-backed [`DocumentStore`].

use async_trait::async_trait;
use bson::doc;
use mongodb::options::{ClientOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database};

use crate::error::{EngineError, EngineResult};
use crate::models::{FinalResult, Quiz};

use super::DocumentStore;

pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub async fn connect(url: &str, db_name: &str) -> EngineResult<Self> {
        let options = ClientOptions::parse(url)
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        let client = Client::with_options(options).map_err(|e| EngineError::Internal(e.into()))?;
        Ok(Self {
            db: client.database(db_name),
        })
    }

    fn quizzes(&self) -> Collection<Quiz> {
        self.db.collection("quizzes")
    }

    fn final_results(&self) -> Collection<FinalResult> {
        self.db.collection("final_results")
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get_quiz(&self, quiz_id: &str) -> EngineResult<Option<Quiz>> {
        let object_id = bson::oid::ObjectId::parse_str(quiz_id)
            .map_err(|_| EngineError::Validation("invalid quiz id".into()))?;
        self.quizzes()
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(|e| EngineError::Internal(e.into()))
    }

    async fn save_final_result(&self, result: &FinalResult) -> EngineResult<()> {
        self.final_results()
            .replace_one(doc! { "session_code": &result.session_code }, result)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        Ok(())
    }

    async fn ping(&self) -> EngineResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        Ok(())
    }
}
