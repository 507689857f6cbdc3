//! The fast shared state store: session hashes, distributed locks, the quiz
//! cache, and short-lived rate-limit/dedupe keys.
//!
//! [`FastStoreBackend`] is the thin, swappable transport (Redis in
//! production, an in-process map in tests and local dev). [`StateStoreClient`]
//! is the typed surface every other component talks to.

mod client;
mod memory;
mod redis_store;

pub use client::StateStoreClient;
pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;

use async_trait::async_trait;

use crate::error::EngineResult;

/// Raw key/hash/TTL operations against the fast store. Implementations must
/// be non-blocking and safe to call concurrently from many tasks.
#[async_trait]
pub trait FastStoreBackend: Send + Sync {
    async fn hset(&self, key: &str, field: &str, value: &str) -> EngineResult<()>;
    async fn hset_many(&self, key: &str, fields: &[(&str, String)]) -> EngineResult<()>;
    async fn hget(&self, key: &str, field: &str) -> EngineResult<Option<String>>;
    async fn hmget(&self, key: &str, fields: &[&str]) -> EngineResult<Vec<Option<String>>>;
    async fn hgetall(&self, key: &str) -> EngineResult<Vec<(String, String)>>;
    async fn expire(&self, key: &str, ttl_seconds: i64) -> EngineResult<()>;
    async fn exists(&self, key: &str) -> EngineResult<bool>;
    async fn delete(&self, key: &str) -> EngineResult<()>;
    async fn get(&self, key: &str) -> EngineResult<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<()>;
    /// `SET key value NX EX ttl_seconds`. Returns `true` if the key was set
    /// (i.e. it did not already exist).
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<bool>;
    /// Liveness check used by the `/readyz` handler.
    async fn ping(&self) -> EngineResult<()>;
}
