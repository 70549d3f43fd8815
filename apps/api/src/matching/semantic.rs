//! Semantic Matcher: ranked vector-similarity lookups.
//!
//! Read-only and fail-soft: a store error or timeout yields an empty list
//! wrapped in `Degraded`, never an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::talent::{EntityKind, EntitySummary, MatchCandidate};
use crate::soft::{within, Degraded, Soft};
use crate::store::TalentStore;

#[derive(Clone)]
pub struct SemanticMatcher {
    store: Arc<dyn TalentStore>,
    timeout: Duration,
}

impl SemanticMatcher {
    pub fn new(store: Arc<dyn TalentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns at most `limit` candidates of `target` kind, each with
    /// `similarity ≥ min_similarity`, sorted by similarity descending.
    pub async fn find_matches(
        &self,
        source_id: &str,
        source: EntityKind,
        target: EntityKind,
        limit: usize,
        min_similarity: f64,
    ) -> Soft<Vec<MatchCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let raw = within(
            self.timeout,
            self.store
                .match_embeddings(source_id, source, target, min_similarity, limit),
        )
        .await
        .map_err(|reason| {
            Degraded::new(
                Vec::<MatchCandidate>::new(),
                format!("match_embeddings for {source_id}: {reason}"),
            )
        })?;

        let mut seen = HashSet::new();
        let mut ranked: Vec<(String, f64)> = raw
            .into_iter()
            .map(|m| (m.id, m.similarity.clamp(0.0, 1.0)))
            .filter(|(id, sim)| *sim >= min_similarity && seen.insert(id.clone()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);

        if ranked.is_empty() {
            debug!("Semantic match {source_id} ({source:?} → {target:?}): no candidates");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let hydrated = within(self.timeout, self.store.describe(target, &ids)).await;
        let mut details: HashMap<String, EntitySummary> = match hydrated {
            Ok(rows) => rows.into_iter().map(|r| (r.id.clone(), r)).collect(),
            Err(reason) => {
                warn!("Could not hydrate {} matches: {reason}", ids.len());
                HashMap::new()
            }
        };

        debug!(
            "Semantic match {source_id} ({:?} → {:?}): {} candidates",
            source,
            target,
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .map(|(id, similarity)| match details.remove(&id) {
                Some(row) => MatchCandidate {
                    id,
                    kind: target,
                    similarity,
                    name: row.name,
                    summary: row.summary,
                    metadata: row.metadata,
                },
                None => MatchCandidate {
                    name: id.clone(),
                    id,
                    kind: target,
                    similarity,
                    summary: None,
                    metadata: Value::Null,
                },
            })
            .collect())
    }
}
