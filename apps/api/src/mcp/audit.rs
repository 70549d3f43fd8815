//! Action Logger: append-only audit trail for loop runs.
//!
//! A failed write never reaches the caller; it is reported on the operator
//! log channel only.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error};

use crate::errors::AppError;
use crate::mcp::request::Mode;
use crate::models::conversation::{AuditEntry, SemanticMetrics};
use crate::models::talent::MatchCandidate;
use crate::soft::within;
use crate::store::TalentStore;

#[derive(Clone)]
pub struct ActionLogger {
    store: Arc<dyn TalentStore>,
    timeout: Duration,
}

/// Entity type recorded for a run in `mode`.
pub fn loop_entity_type(mode: Mode) -> String {
    format!("mcp_{}_loop", mode.as_str())
}

/// Summary figures over the similarity of a run's matches, plus whether the
/// session had a context embedding to offer.
pub fn semantic_metrics(
    matches: &[MatchCandidate],
    context_embedding_present: bool,
) -> SemanticMetrics {
    let top_similarity = matches.iter().map(|m| m.similarity).reduce(f64::max);
    let average_similarity = if matches.is_empty() {
        None
    } else {
        Some(matches.iter().map(|m| m.similarity).sum::<f64>() / matches.len() as f64)
    };
    SemanticMetrics {
        match_count: matches.len(),
        top_similarity,
        average_similarity,
        context_embedding_present,
    }
}

impl ActionLogger {
    pub fn new(store: Arc<dyn TalentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Writes `entry`. Returns whether it was persisted.
    pub async fn log(&self, entry: AuditEntry) -> bool {
        match within(self.timeout, self.store.insert_action(&entry)).await {
            Ok(()) => {
                debug!("Audit {} {} recorded", entry.entity_type, entry.entity_id);
                true
            }
            Err(reason) => {
                error!(
                    "Failed to write audit entry {} for {}: {reason}",
                    entry.entity_type, entry.entity_id
                );
                false
            }
        }
    }

    /// Records a run that ended in an error envelope.
    pub async fn log_failure(
        &self,
        session_id: &str,
        mode: Mode,
        anchor: &str,
        err: &AppError,
    ) -> bool {
        let entry = AuditEntry::new(
            Some(session_id.to_string()),
            format!("{}_failure", loop_entity_type(mode)),
            anchor,
            json!({
                "mode": mode.as_str(),
                "errorCode": err.code(),
                "error": err.to_string(),
            }),
        );
        self.log(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeStore;
    use crate::models::talent::EntityKind;
    use serde_json::Value;

    fn candidate(id: &str, similarity: f64) -> MatchCandidate {
        MatchCandidate {
            id: id.to_string(),
            kind: EntityKind::Role,
            similarity,
            name: id.to_string(),
            summary: None,
            metadata: Value::Null,
        }
    }

    #[test]
    fn test_semantic_metrics() {
        let metrics = semantic_metrics(&[candidate("a", 0.9), candidate("b", 0.5)], true);
        assert_eq!(metrics.match_count, 2);
        assert_eq!(metrics.top_similarity, Some(0.9));
        assert!((metrics.average_similarity.unwrap() - 0.7).abs() < 1e-9);
        assert!(metrics.context_embedding_present);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["contextEmbeddingPresent"], true);

        let empty = semantic_metrics(&[], false);
        assert_eq!(empty.top_similarity, None);
        assert_eq!(empty.average_similarity, None);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let store = Arc::new(FakeStore::default());
        store.fail_inserts(true);
        let logger = ActionLogger::new(store.clone(), Duration::from_secs(5));

        let entry = AuditEntry::new(Some("s1".to_string()), "mcp_hiring_loop", "r1", json!({}));
        assert!(!logger.log(entry).await);
        assert!(store.inserted_actions().is_empty());
    }

    #[tokio::test]
    async fn test_failure_entry_records_error_code() {
        let store = Arc::new(FakeStore::default());
        let logger = ActionLogger::new(store.clone(), Duration::from_secs(5));

        let err = AppError::RetryExceeded {
            session_id: "s1".to_string(),
            ceiling: 2,
        };
        assert!(logger.log_failure("s1", Mode::Candidate, "p1", &err).await);

        let entries = store.inserted_actions();
        assert_eq!(entries[0].entity_type, "mcp_candidate_loop_failure");
        assert_eq!(entries[0].payload["errorCode"], "RETRY_EXCEEDED");
    }
}
