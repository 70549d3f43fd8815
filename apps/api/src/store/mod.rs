//! Persistence seam for the talent marketplace.
//!
//! The loop only ever talks to `TalentStore`. Production uses `PgTalentStore`
//! (Postgres + pgvector, similarity delegated to the database); tests use the
//! in-memory fake in `crate::fakes`.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::conversation::{AuditEntry, MessageRow};
use crate::models::talent::{
    AchievedRow, CapabilityRollup, EmbeddingMatch, EntityKind, EntitySummary, RequirementKind,
    RequirementRow, Scope,
};

pub use postgres::PgTalentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait TalentStore: Send + Sync {
    /// Vector-similarity RPC: nearest `target` rows for `query_id` in `source`.
    async fn match_embeddings(
        &self,
        query_id: &str,
        source: EntityKind,
        target: EntityKind,
        threshold: f64,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>>;

    /// Direct 1:1 similarity between a profile and a role. `None` when either
    /// side has no embedding.
    async fn similarity(&self, profile_id: &str, role_id: &str) -> StoreResult<Option<f64>>;

    /// Display data for a set of ids of one kind. Unknown ids are skipped.
    async fn describe(&self, kind: EntityKind, ids: &[String]) -> StoreResult<Vec<EntitySummary>>;

    async fn role_requirements(
        &self,
        role_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<RequirementRow>>;

    async fn profile_levels(
        &self,
        profile_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<AchievedRow>>;

    /// Ids of roles currently open for applications.
    async fn open_role_ids(&self, limit: usize) -> StoreResult<Vec<String>>;

    /// Newest-first non-system messages for a session.
    async fn recent_messages(&self, session_id: &str, limit: usize) -> StoreResult<Vec<MessageRow>>;

    /// Newest-first audit entries for a session.
    async fn recent_actions(&self, session_id: &str, limit: usize) -> StoreResult<Vec<AuditEntry>>;

    /// Single-row append to the audit trail.
    async fn insert_action(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Capability distribution grouped by `scope`, optionally restricted to companies.
    async fn capability_distribution(
        &self,
        scope: Scope,
        company_ids: &[String],
    ) -> StoreResult<Vec<CapabilityRollup>>;
}
