//! # quiz-session-engine
//!
//! A real-time multiplayer quiz session engine: a WebSocket gameplay
//! channel plus a small REST surface around session lifecycle, backed by a
//! fast shared store (session state, locks, caches) and a document store
//! (quiz content, final results).
//!
//! The engine is split so that each layer can be exercised without a live
//! Redis or MongoDB: [`store::FastStoreBackend`] and
//! [`doc_store::DocumentStore`] are traits with in-memory fakes used by the
//! test suite.

pub mod config;
pub mod doc_store;
pub mod error;
pub mod game;
pub mod gateway;
pub mod leaderboard;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod store;

use std::sync::Arc;

use crate::config::Config;
use crate::doc_store::{DocumentStore, MemoryDocumentStore, MongoDocumentStore};
use crate::store::{FastStoreBackend, MemoryBackend, RedisBackend, StateStoreClient};

/// Builds the fast-store backend named by `config.fast_store_url`.
/// `memory://` selects the in-process fake; anything else is passed to
/// `redis::Client` as a connection URL.
pub async fn build_fast_store(config: &Config) -> anyhow::Result<Arc<StateStoreClient>> {
    let backend: Arc<dyn FastStoreBackend> = if config.fast_store_url == "memory://" {
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(RedisBackend::connect(&config.fast_store_url).await?)
    };
    Ok(Arc::new(StateStoreClient::new(backend)))
}

/// Builds the document-store backend named by `config.document_store_url`.
/// `memory://` selects the in-process fake; anything else is passed to the
/// MongoDB driver as a connection URL.
pub async fn build_document_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.document_store_url == "memory://" {
        Ok(Arc::new(MemoryDocumentStore::new()))
    } else {
        Ok(Arc::new(
            MongoDocumentStore::connect(&config.document_store_url, &config.document_store_db).await?,
        ))
    }
}
