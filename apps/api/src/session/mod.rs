//! Session-scoped keyed store with TTL.
//!
//! Holds the retry ledger and the result cache. Injected into the loop so
//! several server instances can share state through Redis, and so tests can
//! substitute `MemorySessionStore`.

pub mod memo;
pub mod redis_store;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

pub use self::memo::{request_hash, LoopMemo};
pub use self::redis_store::RedisSessionStore;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("session store poisoned")]
    Poisoned,
}

pub type SessionResult<T> = std::result::Result<T, SessionStoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<()>;

    async fn delete(&self, key: &str) -> SessionResult<()>;
}

/// In-process store. Used when no shared cache is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let mut entries = self.entries.lock().map_err(|_| SessionStoreError::Poisoned)?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<()> {
        let mut entries = self.entries.lock().map_err(|_| SessionStoreError::Poisoned)?;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        let mut entries = self.entries.lock().map_err(|_| SessionStoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}
