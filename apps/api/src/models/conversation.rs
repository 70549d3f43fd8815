use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// A persisted chat message, newest-first when loaded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub fn is_system(&self) -> bool {
        self.role.eq_ignore_ascii_case("system")
    }
}

/// Similarity figures recorded alongside an audit entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMetrics {
    pub match_count: usize,
    pub top_similarity: Option<f64>,
    pub average_similarity: Option<f64>,
    pub context_embedding_present: bool,
}

/// Append-only audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_metrics: Option<Value>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        session_id: Option<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            session_id,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
            semantic_metrics: None,
            embedding: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: &SemanticMetrics) -> Self {
        self.semantic_metrics = serde_json::to_value(metrics).ok();
        self
    }
}

/// Everything the loop knows about a session before it starts working.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub history: Vec<MessageRow>,
    pub agent_actions: Vec<AuditEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ConversationContext {
    /// Most recent user-authored message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.history
            .iter()
            .find(|m| m.role.eq_ignore_ascii_case("user"))
            .map(|m| m.content.as_str())
    }
}
