//! Axum route handlers for direct scoring calls, outside the MCP loop.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::matching::batch::{Anchor, BatchOptions, BatchResult};
use crate::models::talent::{EntityKind, FitScore, GapRecord};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub role_id: String,
}

impl PairRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.profile_id.trim().is_empty() || self.role_id.trim().is_empty() {
            return Err(AppError::Validation(
                "profileId and roleId are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapsResponse {
    pub profile_id: String,
    pub role_id: String,
    pub gaps: Vec<GapRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScoreRequest {
    pub anchor_type: EntityKind,
    pub anchor_id: String,
    pub candidate_ids: Vec<String>,
    pub max_concurrent: Option<usize>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScoreResponse {
    pub results: Vec<BatchResult>,
    pub scored: usize,
    pub failed: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/fit-score
pub async fn handle_fit_score(
    State(state): State<AppState>,
    Json(request): Json<PairRequest>,
) -> Result<Json<FitScore>, AppError> {
    request.validate()?;
    let fit = state
        .fit_scorer
        .score(&request.profile_id, &request.role_id)
        .await?;
    Ok(Json(fit))
}

/// POST /api/v1/gaps
///
/// Every requirement of the role joined against the profile, most severe first.
pub async fn handle_gaps(
    State(state): State<AppState>,
    Json(request): Json<PairRequest>,
) -> Result<Json<GapsResponse>, AppError> {
    request.validate()?;
    let gaps = state
        .gap_analyzer
        .analyze(&request.profile_id, &request.role_id)
        .await?;
    Ok(Json(GapsResponse {
        profile_id: request.profile_id,
        role_id: request.role_id,
        gaps,
    }))
}

/// POST /api/v1/batch-score
pub async fn handle_batch_score(
    State(state): State<AppState>,
    Json(request): Json<BatchScoreRequest>,
) -> Result<Json<BatchScoreResponse>, AppError> {
    if request.anchor_id.trim().is_empty() {
        return Err(AppError::Validation("anchorId is required".to_string()));
    }
    if request.candidate_ids.is_empty() {
        return Err(AppError::Validation(
            "candidateIds cannot be empty".to_string(),
        ));
    }

    let anchor = match request.anchor_type {
        EntityKind::Profile => Anchor::Profile(request.anchor_id),
        EntityKind::Role => Anchor::Role(request.anchor_id),
    };
    let defaults = &state.settings.batch;
    let options = BatchOptions {
        max_concurrent: request.max_concurrent.unwrap_or(defaults.max_concurrent).max(1),
        max_candidates: request.max_candidates.unwrap_or(defaults.max_candidates),
        ..defaults.clone()
    };

    let results = state
        .batch_scorer
        .batch_score(&anchor, &request.candidate_ids, &options)
        .await?;
    let failed = results.iter().filter(|r| !r.success).count();

    Ok(Json(BatchScoreResponse {
        scored: results.len() - failed,
        failed,
        results,
    }))
}
