//! In-process fake backend for tests and `--fast-store-url memory://`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::EngineResult;

use super::FastStoreBackend;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn fresh(&self) -> bool {
        self.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

enum Slot {
    String(Entry),
    Hash(HashMap<String, String>),
}

#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Slot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FastStoreBackend for MemoryBackend {
    async fn hset(&self, key: &str, field: &str, value: &str) -> EngineResult<()> {
        let mut data = self.data.lock().await;
        match data.entry(key.to_string()).or_insert_with(|| Slot::Hash(HashMap::new())) {
            Slot::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
            }
            Slot::String(_) => {
                data.insert(key.to_string(), Slot::Hash(HashMap::from([(field.to_string(), value.to_string())])));
            }
        }
        Ok(())
    }

    async fn hset_many(&self, key: &str, fields: &[(&str, String)]) -> EngineResult<()> {
        let mut data = self.data.lock().await;
        let map = match data.entry(key.to_string()).or_insert_with(|| Slot::Hash(HashMap::new())) {
            Slot::Hash(map) => map,
            slot => {
                *slot = Slot::Hash(HashMap::new());
                match slot {
                    Slot::Hash(map) => map,
                    _ => unreachable!(),
                }
            }
        };
        for (field, value) in fields {
            map.insert(field.to_string(), value.clone());
        }
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> EngineResult<Option<String>> {
        let data = self.data.lock().await;
        Ok(match data.get(key) {
            Some(Slot::Hash(map)) => map.get(field).cloned(),
            _ => None,
        })
    }

    async fn hmget(&self, key: &str, fields: &[&str]) -> EngineResult<Vec<Option<String>>> {
        let data = self.data.lock().await;
        let map = match data.get(key) {
            Some(Slot::Hash(map)) => Some(map),
            _ => None,
        };
        Ok(fields
            .iter()
            .map(|f| map.and_then(|m| m.get(*f).cloned()))
            .collect())
    }

    async fn hgetall(&self, key: &str) -> EngineResult<Vec<(String, String)>> {
        let data = self.data.lock().await;
        Ok(match data.get(key) {
            Some(Slot::Hash(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Vec::new(),
        })
    }

    async fn expire(&self, _key: &str, _ttl_seconds: i64) -> EngineResult<()> {
        // Hash TTLs aren't exercised by the in-memory fake; sessions in
        // tests live and die within a single test function.
        Ok(())
    }

    async fn exists(&self, key: &str) -> EngineResult<bool> {
        let mut data = self.data.lock().await;
        Ok(Self::get_live(&mut data, key).is_some())
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> EngineResult<Option<String>> {
        let mut data = self.data.lock().await;
        Ok(Self::get_live(&mut data, key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<()> {
        let mut data = self.data.lock().await;
        data.insert(
            key.to_string(),
            Slot::String(Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            }),
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> EngineResult<bool> {
        let mut data = self.data.lock().await;
        if Self::get_live(&mut data, key).is_some() {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Slot::String(Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            }),
        );
        Ok(true)
    }

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}

impl MemoryBackend {
    fn get_live(data: &mut HashMap<String, Slot>, key: &str) -> Option<String> {
        let expired = matches!(data.get(key), Some(Slot::String(entry)) if !entry.fresh());
        if expired {
            data.remove(key);
            return None;
        }
        match data.get(key) {
            Some(Slot::String(entry)) => Some(entry.value.clone()),
            _ => None,
        }
    }
}
