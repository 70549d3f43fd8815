//! Fit Scoring: pluggable, trait-based scorer for a (profile, role) pair.
//!
//! Default: `GapFitScorer` (gap analysis blended with 1:1 embedding similarity).
//! `AppState` and `BatchScorer` hold an `Arc<dyn FitScorer>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::matching::gaps::{gap_counts, GapAnalyzer};
use crate::matching::policy::ScoringPolicy;
use crate::models::talent::{FitScore, GapRecord, GapType, RequirementKind};
use crate::soft::within;
use crate::store::TalentStore;

/// How many of the most severe gaps travel with a score.
const TOP_GAPS: usize = 5;

/// The fit scorer trait. Implement this to swap backends without touching
/// the batch scorer, the loop, or the handlers.
#[async_trait]
pub trait FitScorer: Send + Sync {
    async fn score(&self, profile_id: &str, role_id: &str) -> Result<FitScore, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// GapFitScorer: default implementation
// ────────────────────────────────────────────────────────────────────────────

/// Algorithm:
/// 1. Capability and skill gaps, fetched concurrently with the similarity lookup
/// 2. Each component = `max(0, 100 × (1 − penalty / total))`, 100 if nothing required
/// 3. Semantic = similarity × 100, 0 when the lookup fails or has no embeddings
/// 4. Blend and tier per `ScoringPolicy`
pub struct GapFitScorer {
    gaps: GapAnalyzer,
    store: Arc<dyn TalentStore>,
    policy: ScoringPolicy,
    timeout: Duration,
}

impl GapFitScorer {
    pub fn new(store: Arc<dyn TalentStore>, policy: ScoringPolicy, timeout: Duration) -> Self {
        Self {
            gaps: GapAnalyzer::new(store.clone()),
            store,
            policy,
            timeout,
        }
    }

    async fn semantic_score(&self, profile_id: &str, role_id: &str) -> f64 {
        match within(self.timeout, self.store.similarity(profile_id, role_id)).await {
            Ok(Some(similarity)) => similarity.clamp(0.0, 1.0) * 100.0,
            Ok(None) => 0.0,
            Err(reason) => {
                warn!("Similarity lookup failed for {profile_id}/{role_id}: {reason}");
                0.0
            }
        }
    }
}

#[async_trait]
impl FitScorer for GapFitScorer {
    async fn score(&self, profile_id: &str, role_id: &str) -> Result<FitScore, AppError> {
        if profile_id.trim().is_empty() || role_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "profileId and roleId are required".to_string(),
            ));
        }

        let (capabilities, skills, semantic_score) = tokio::join!(
            self.gaps
                .analyze_kind(profile_id, role_id, RequirementKind::Capability),
            self.gaps.analyze_kind(profile_id, role_id, RequirementKind::Skill),
            self.semantic_score(profile_id, role_id),
        );
        let capabilities = capabilities?;
        let skills = skills?;

        let fit = build_fit_score(
            &self.policy,
            profile_id,
            role_id,
            &capabilities,
            &skills,
            semantic_score,
        );
        debug!("Fit {profile_id}/{role_id}: {} ({})", fit.score, fit.summary);
        Ok(fit)
    }
}

/// Pure scoring step, separated from I/O so the formula is directly testable.
pub fn build_fit_score(
    policy: &ScoringPolicy,
    profile_id: &str,
    role_id: &str,
    capabilities: &[GapRecord],
    skills: &[GapRecord],
    semantic_score: f64,
) -> FitScore {
    let (cap_missing, cap_insufficient) = gap_counts(capabilities);
    let capability_score =
        policy.component_score(cap_missing, cap_insufficient, capabilities.len());

    let (skill_missing, skill_insufficient) = gap_counts(skills);
    let skill_score = policy.component_score(skill_missing, skill_insufficient, skills.len());

    let score = policy.combine(capability_score, skill_score, semantic_score);

    let mut top_gaps: Vec<GapRecord> = capabilities
        .iter()
        .chain(skills)
        .filter(|g| g.gap_type != GapType::Met)
        .cloned()
        .collect();
    top_gaps.sort_by(|a, b| b.severity.total_cmp(&a.severity));
    top_gaps.truncate(TOP_GAPS);

    FitScore {
        profile_id: profile_id.to_string(),
        role_id: role_id.to_string(),
        capability_score,
        skill_score,
        semantic_score,
        score,
        summary: policy.tier(score).label().to_string(),
        top_gaps,
    }
}
