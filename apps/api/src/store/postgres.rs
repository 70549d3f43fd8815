use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::conversation::{AuditEntry, MessageRow};
use crate::models::talent::{
    AchievedRow, CapabilityRollup, EmbeddingMatch, EntityKind, EntitySummary, RequirementKind,
    RequirementRow, Scope,
};
use crate::store::{StoreResult, TalentStore};

/// Maps the level labels stored in `*_capabilities` / `*_skills` onto the
/// 1–5 ordinal scale for aggregate queries.
const LEVEL_ORDINAL_SQL: &str = r#"
    CASE lower(replace(pc.level, '_', ' '))
        WHEN 'foundational' THEN 1
        WHEN 'intermediate' THEN 2
        WHEN 'adept' THEN 3
        WHEN 'advanced' THEN 4
        WHEN 'highly advanced' THEN 5
    END
"#;

#[derive(Clone)]
pub struct PgTalentStore {
    pool: PgPool,
}

impl PgTalentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn requirement_tables(kind: RequirementKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        RequirementKind::Capability => (
            "role_capabilities",
            "profile_capabilities",
            "capabilities",
        ),
        RequirementKind::Skill => ("role_skills", "profile_skills", "skills"),
    }
}

fn item_column(kind: RequirementKind) -> &'static str {
    match kind {
        RequirementKind::Capability => "capability_id",
        RequirementKind::Skill => "skill_id",
    }
}

fn scope_column(scope: Scope) -> &'static str {
    match scope {
        Scope::Taxonomy => "c.group_name",
        Scope::Division => "p.division",
        Scope::Region => "p.region",
        Scope::Company => "co.name",
    }
}

#[async_trait]
impl TalentStore for PgTalentStore {
    async fn match_embeddings(
        &self,
        query_id: &str,
        source: EntityKind,
        target: EntityKind,
        threshold: f64,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>> {
        let rows = sqlx::query_as::<_, EmbeddingMatch>(
            r#"
            SELECT id::text AS id, similarity::float8 AS similarity
            FROM match_embeddings($1, $2, $3, $4, $5)
            "#,
        )
        .bind(query_id)
        .bind(source.table())
        .bind(target.table())
        .bind(threshold)
        .bind(limit as i32)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn similarity(&self, profile_id: &str, role_id: &str) -> StoreResult<Option<f64>> {
        let similarity: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT (1 - (p.embedding <=> r.embedding))::float8
            FROM profile_embeddings p, role_embeddings r
            WHERE p.profile_id::text = $1 AND r.role_id::text = $2
            "#,
        )
        .bind(profile_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(similarity)
    }

    async fn describe(&self, kind: EntityKind, ids: &[String]) -> StoreResult<Vec<EntitySummary>> {
        let sql = match kind {
            EntityKind::Profile => {
                r#"
                SELECT id::text AS id, name, role_title AS summary,
                       jsonb_build_object('division', division, 'region', region) AS metadata
                FROM profiles WHERE id::text = ANY($1)
                "#
            }
            EntityKind::Role => {
                r#"
                SELECT id::text AS id, title AS name, description AS summary,
                       jsonb_build_object('division', division, 'location', location) AS metadata
                FROM roles WHERE id::text = ANY($1)
                "#
            }
        };
        let rows = sqlx::query_as::<_, EntitySummary>(sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn role_requirements(
        &self,
        role_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<RequirementRow>> {
        let (role_table, _, item_table) = requirement_tables(kind);
        let column = item_column(kind);
        let sql = format!(
            r#"
            SELECT rr.{column}::text AS item_id, i.name, COALESCE(i.group_name, '') AS category,
                   rr.level
            FROM {role_table} rr
            JOIN {item_table} i ON i.id = rr.{column}
            WHERE rr.role_id::text = $1
            "#
        );
        let rows = sqlx::query_as::<_, RequirementRow>(&sql)
            .bind(role_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn profile_levels(
        &self,
        profile_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<AchievedRow>> {
        let (_, profile_table, _) = requirement_tables(kind);
        let column = item_column(kind);
        let sql = format!(
            "SELECT {column}::text AS item_id, level FROM {profile_table} WHERE profile_id::text = $1"
        );
        let rows = sqlx::query_as::<_, AchievedRow>(&sql)
            .bind(profile_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn open_role_ids(&self, limit: usize) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id::text FROM roles WHERE status = 'open' ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id::text AS id, role, content, embedding::real[] AS embedding, created_at
            FROM conversation_messages
            WHERE session_id = $1 AND role <> 'system'
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_actions(&self, session_id: &str, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT session_id, entity_type, entity_id, payload, semantic_metrics,
                   embedding::real[] AS embedding, created_at AS timestamp
            FROM agent_actions
            WHERE session_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_action(&self, entry: &AuditEntry) -> StoreResult<()> {
        // Append-only: never UPDATE or DELETE audit rows
        sqlx::query(
            r#"
            INSERT INTO agent_actions
                (id, session_id, entity_type, entity_id, payload, semantic_metrics, embedding, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::real[]::vector, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.session_id)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.payload)
        .bind(&entry.semantic_metrics)
        .bind(&entry.embedding)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn capability_distribution(
        &self,
        scope: Scope,
        company_ids: &[String],
    ) -> StoreResult<Vec<CapabilityRollup>> {
        let group = scope_column(scope);
        let sql = format!(
            r#"
            SELECT COALESCE({group}, 'Unassigned') AS group_name,
                   c.name AS capability,
                   COUNT(DISTINCT pc.profile_id) AS profile_count,
                   AVG({LEVEL_ORDINAL_SQL})::float8 AS average_level
            FROM profile_capabilities pc
            JOIN capabilities c ON c.id = pc.capability_id
            JOIN profiles p ON p.id = pc.profile_id
            LEFT JOIN companies co ON co.id = p.company_id
            WHERE cardinality($1::text[]) = 0 OR p.company_id::text = ANY($1)
            GROUP BY 1, 2
            ORDER BY profile_count DESC, group_name, capability
            LIMIT 200
            "#
        );
        let rows = sqlx::query_as::<_, CapabilityRollup>(&sql)
            .bind(company_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
