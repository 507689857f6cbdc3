//! Redis-backed [`FastStoreBackend`], pooled with `bb8`.

use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

use crate::error::{EngineError, EngineResult};

use super::FastStoreBackend;

pub struct RedisBackend {
    pool: Pool<RedisConnectionManager>,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> EngineResult<Self> {
        let manager = RedisConnectionManager::new(url).map_err(|e| EngineError::Internal(e.into()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl FastStoreBackend for RedisBackend {
    async fn hset(&self, key: &str, field: &str, value: &str) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| EngineError::Internal(e.into()))
    }

    async fn hset_many(&self, key: &str, fields: &[(&str, String)]) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(|e| EngineError::Internal(e.into()))
    }

    async fn hget(&self, key: &str, field: &str) -> EngineResult<Option<String>> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.hget(key, field).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn hmget(&self, key: &str, fields: &[&str]) -> EngineResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.hget(key, fields).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn hgetall(&self, key: &str) -> EngineResult<Vec<(String, String)>> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.hgetall(key).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.expire::<_, ()>(key, ttl_seconds)
            .await
            .map_err(|e| EngineError::Internal(e.into()))
    }

    async fn exists(&self, key: &str) -> EngineResult<bool> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.exists(key).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.del::<_, ()>(key).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn get(&self, key: &str) -> EngineResult<Option<String>> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.get(key).await.map_err(|e| EngineError::Internal(e.into()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| EngineError::Internal(e.into()))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<bool> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        let opts = redis::SetOptions::default()
            .with_expiration(redis::SetExpiry::EX(ttl_seconds))
            .conditional_set(redis::ExistenceCheck::NX);
        let result: Option<String> = conn
            .set_options(key, value, opts)
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        Ok(result.is_some())
    }

    async fn ping(&self) -> EngineResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| EngineError::Internal(e.into()))?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| EngineError::Internal(e.into()))?;
        Ok(())
    }
}
