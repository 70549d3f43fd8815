//! Retry ceiling and result cache over a `SessionStore`.
//!
//! Both policies are best-effort: if the backing store is unreachable the
//! retry gate fails open and the cache behaves as a permanent miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::mcp::response::LoopResponse;
use crate::session::SessionStore;

/// Top-level request keys that determine the result. Everything else
/// (message text, timestamps, session id, embeddings) is volatile.
const HASHED_KEYS: &[&str] = &["mode", "profileId", "roleId", "action"];
/// Keys under `context` that scope analyst requests.
const HASHED_CONTEXT_KEYS: &[&str] = &["companyIds", "scope"];

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    response: Value,
    created_at: DateTime<Utc>,
}

/// Deterministic SHA-256 over the cache-relevant subset of a request.
pub fn request_hash(request: &Value) -> String {
    let mut relevant = Map::new();
    for key in HASHED_KEYS {
        if let Some(value) = request.get(*key).filter(|v| !v.is_null()) {
            relevant.insert((*key).to_string(), value.clone());
        }
    }
    if let Some(context) = request.get("context") {
        for key in HASHED_CONTEXT_KEYS {
            if let Some(value) = context.get(*key).filter(|v| !v.is_null()) {
                relevant.insert((*key).to_string(), as_set(value));
            }
        }
    }

    let canonical = canonicalize(Value::Object(relevant));
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Company ids are a set; their order does not change the result.
fn as_set(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items = items.clone();
            items.sort_by_key(|item| item.to_string());
            items.dedup();
            Value::Array(items)
        }
        other => other.clone(),
    }
}

/// Rebuilds objects with their keys inserted in sorted order, recursively.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn retry_key(session_id: &str) -> String {
    format!("retry:{session_id}")
}

fn cache_key(hash: &str) -> String {
    format!("cache:{hash}")
}

pub struct LoopMemo {
    store: Arc<dyn SessionStore>,
    retry_ceiling: u32,
    freshness: Duration,
}

impl LoopMemo {
    pub fn new(store: Arc<dyn SessionStore>, retry_ceiling: u32, freshness: Duration) -> Self {
        Self {
            store,
            retry_ceiling,
            freshness,
        }
    }

    /// Counts an attempt for `session_id`. Fails fast with `RetryExceeded`
    /// once the ceiling has been reached, clearing the ledger entry.
    pub async fn begin_attempt(&self, session_id: &str) -> Result<u32, AppError> {
        let key = retry_key(session_id);
        let attempts = match self.store.get(&key).await {
            Ok(raw) => raw.and_then(|v| v.parse::<u32>().ok()).unwrap_or(0),
            Err(e) => {
                warn!("Retry ledger unavailable for session {session_id}: {e}");
                return Ok(0);
            }
        };

        if attempts >= self.retry_ceiling {
            if let Err(e) = self.store.delete(&key).await {
                warn!("Failed to clear retry ledger for session {session_id}: {e}");
            }
            return Err(AppError::RetryExceeded {
                session_id: session_id.to_string(),
                ceiling: self.retry_ceiling,
            });
        }

        let next = attempts + 1;
        if let Err(e) = self.store.set(&key, &next.to_string(), self.freshness).await {
            warn!("Failed to record attempt for session {session_id}: {e}");
        }
        debug!("Session {session_id} attempt {next}/{}", self.retry_ceiling);
        Ok(next)
    }

    /// Resets the retry ledger after a clean completion.
    pub async fn record_success(&self, session_id: &str) {
        if let Err(e) = self.store.delete(&retry_key(session_id)).await {
            warn!("Failed to reset retry ledger for session {session_id}: {e}");
        }
    }

    /// Returns a cached response only if it is fresh, well-formed and successful.
    pub async fn lookup(&self, hash: &str) -> Option<LoopResponse> {
        let raw = match self.store.get(&cache_key(hash)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Result cache unavailable: {e}");
                return None;
            }
        };

        let entry: CacheEntry = serde_json::from_str(&raw).ok()?;
        let age = Utc::now().signed_duration_since(entry.created_at);
        if age.to_std().map(|a| a > self.freshness).unwrap_or(false) {
            debug!("Cache entry {} is stale", &hash[..12.min(hash.len())]);
            return None;
        }

        let response: LoopResponse = serde_json::from_value(entry.response).ok()?;
        if !response.success || response.data.is_none() {
            return None;
        }
        Some(response)
    }

    /// Stores a successful response. Failures are never cached.
    pub async fn remember(&self, hash: &str, response: &LoopResponse) {
        if !response.success {
            return;
        }
        let entry = match serde_json::to_value(response) {
            Ok(value) => CacheEntry {
                response: value,
                created_at: Utc::now(),
            },
            Err(e) => {
                warn!("Failed to serialize response for cache: {e}");
                return;
            }
        };
        let Ok(raw) = serde_json::to_string(&entry) else {
            return;
        };
        if let Err(e) = self.store.set(&cache_key(hash), &raw, self.freshness).await {
            warn!("Failed to write result cache: {e}");
        }
    }
}
