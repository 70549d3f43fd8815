//! Batch Scorer: runs `FitScorer` over a candidate pool.
//!
//! Stage 1 narrows the pool with a wide-net semantic pre-filter, padded with
//! unranked candidates up to `max_candidates`. Stage 2 scores in chunks of
//! `max_concurrent`, awaiting each chunk before starting the next, so at most
//! `max_concurrent` scoring calls are ever in flight.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::matching::fit_scoring::FitScorer;
use crate::matching::semantic::SemanticMatcher;
use crate::models::talent::{EntityKind, FitScore};
use crate::soft::settle;

/// The fixed side of a batch: a profile scored against roles, or a role
/// scored against profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Profile(String),
    Role(String),
}

impl Anchor {
    pub fn id(&self) -> &str {
        match self {
            Anchor::Profile(id) | Anchor::Role(id) => id.as_str(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Anchor::Profile(_) => EntityKind::Profile,
            Anchor::Role(_) => EntityKind::Role,
        }
    }

    /// (profile_id, role_id) for a candidate on the other side.
    fn pair<'a>(&'a self, candidate: &'a str) -> (&'a str, &'a str) {
        match self {
            Anchor::Profile(profile) => (profile.as_str(), candidate),
            Anchor::Role(role) => (candidate, role.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    pub max_concurrent: usize,
    pub max_candidates: usize,
    /// Similarity floor for the pre-filter. Deliberately low.
    pub similarity_floor: f64,
    pub continue_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_candidates: 10,
            similarity_floor: 0.3,
            continue_on_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub candidate_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    /// Failed entries sort as 0.
    pub fn score(&self) -> u32 {
        self.fit.as_ref().map(|f| f.score).unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct BatchScorer {
    matcher: SemanticMatcher,
    scorer: Arc<dyn FitScorer>,
}

impl BatchScorer {
    pub fn new(matcher: SemanticMatcher, scorer: Arc<dyn FitScorer>) -> Self {
        Self { matcher, scorer }
    }

    /// Scores `anchor` against the pre-filtered `candidate_ids`, best first.
    pub async fn batch_score(
        &self,
        anchor: &Anchor,
        candidate_ids: &[String],
        options: &BatchOptions,
    ) -> Result<Vec<BatchResult>, AppError> {
        let pool = self.prefilter(anchor, candidate_ids, options).await;
        let chunk_size = options.max_concurrent.max(1);

        info!(
            "Batch scoring {} of {} candidates for {:?} {} (chunks of {})",
            pool.len(),
            candidate_ids.len(),
            anchor.kind(),
            anchor.id(),
            chunk_size
        );

        let mut results = Vec::with_capacity(pool.len());
        for chunk in pool.chunks(chunk_size) {
            let outcomes = join_all(chunk.iter().map(|candidate| async move {
                let (profile_id, role_id) = anchor.pair(candidate);
                (candidate.clone(), self.scorer.score(profile_id, role_id).await)
            }))
            .await;

            for (candidate_id, outcome) in outcomes {
                match outcome {
                    Ok(fit) => results.push(BatchResult {
                        candidate_id,
                        success: true,
                        fit: Some(fit),
                        error: None,
                    }),
                    Err(e) if options.continue_on_error => {
                        warn!("Scoring {candidate_id} failed: {e}");
                        results.push(BatchResult {
                            candidate_id,
                            success: false,
                            fit: None,
                            error: Some(e.to_string()),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        results.sort_by(|a, b| b.score().cmp(&a.score()));
        Ok(results)
    }

    /// Semantic matches that are in the candidate set, padded with the
    /// remaining candidates (input order) up to `max_candidates`.
    async fn prefilter(
        &self,
        anchor: &Anchor,
        candidate_ids: &[String],
        options: &BatchOptions,
    ) -> Vec<String> {
        let cap = options.max_candidates;
        let allowed: HashSet<&str> = candidate_ids.iter().map(String::as_str).collect();

        let (ranked, _) = settle(
            "batch pre-filter",
            self.matcher
                .find_matches(
                    anchor.id(),
                    anchor.kind(),
                    anchor.kind().opposite(),
                    cap,
                    options.similarity_floor,
                )
                .await,
        );

        let mut selected: Vec<String> = Vec::with_capacity(cap);
        let mut seen: HashSet<String> = HashSet::new();
        for candidate in ranked {
            if selected.len() >= cap {
                break;
            }
            if allowed.contains(candidate.id.as_str()) && seen.insert(candidate.id.clone()) {
                selected.push(candidate.id);
            }
        }

        for id in candidate_ids {
            if selected.len() >= cap {
                break;
            }
            if seen.insert(id.clone()) {
                selected.push(id.clone());
            }
        }

        selected
    }
}
