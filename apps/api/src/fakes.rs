//! In-memory fakes for the store, the language model and the fit scorer
//! (testing only). They satisfy the same traits as production and count
//! calls so tests can assert on I/O.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::errors::AppError;
use crate::llm_client::{LanguageModel, LlmError};
use crate::matching::fit_scoring::FitScorer;
use crate::matching::policy::ScoringPolicy;
use crate::mcp::prompts::PLANNER_SYSTEM;
use crate::models::conversation::{AuditEntry, MessageRow};
use crate::models::talent::{
    AchievedRow, CapabilityRollup, EmbeddingMatch, EntityKind, EntitySummary, FitScore,
    RequirementKind, RequirementRow, Scope,
};
use crate::store::{StoreError, StoreResult, TalentStore};

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    matches: HashMap<String, Vec<EmbeddingMatch>>,
    similarities: HashMap<(String, String), f64>,
    entities: HashMap<String, EntitySummary>,
    requirements: HashMap<(String, RequirementKind), Vec<RequirementRow>>,
    levels: HashMap<(String, RequirementKind), Vec<AchievedRow>>,
    open_roles: Vec<String>,
    messages: Vec<(String, MessageRow)>,
    actions: Mutex<Vec<AuditEntry>>,
    rollup: Vec<CapabilityRollup>,
    clock: AtomicUsize,
    failing_matching: AtomicBool,
    failing_similarity: AtomicBool,
    failing_requirements: AtomicBool,
    failing_open_roles: AtomicBool,
    failing_history: AtomicBool,
    failing_inserts: AtomicBool,
    failing_rollup: AtomicBool,
    calls: AtomicUsize,
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} is failing"))
}

impl FakeStore {
    fn tick(&self) -> chrono::DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap()
    }

    fn hit(&self, flag: &AtomicBool, what: &str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(unavailable(what))
        } else {
            Ok(())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn add_matches(&mut self, source_id: &str, rows: &[(&str, f64)]) {
        self.matches.entry(source_id.to_string()).or_default().extend(
            rows.iter().map(|(id, similarity)| EmbeddingMatch {
                id: id.to_string(),
                similarity: *similarity,
            }),
        );
    }

    pub fn add_entity(&mut self, id: &str, name: &str) {
        self.entities.insert(
            id.to_string(),
            EntitySummary {
                id: id.to_string(),
                name: name.to_string(),
                summary: Some(format!("{name} summary")),
                metadata: json!({}),
            },
        );
    }

    pub fn add_similarity(&mut self, profile_id: &str, role_id: &str, similarity: f64) {
        self.similarities
            .insert((profile_id.to_string(), role_id.to_string()), similarity);
    }

    pub fn add_requirement(
        &mut self,
        role_id: &str,
        kind: RequirementKind,
        item_id: &str,
        category: &str,
        level: &str,
    ) {
        self.requirements
            .entry((role_id.to_string(), kind))
            .or_default()
            .push(RequirementRow {
                item_id: item_id.to_string(),
                name: item_id.replace('-', " "),
                category: category.to_string(),
                level: level.to_string(),
            });
    }

    pub fn add_level(
        &mut self,
        profile_id: &str,
        kind: RequirementKind,
        item_id: &str,
        level: &str,
    ) {
        self.levels
            .entry((profile_id.to_string(), kind))
            .or_default()
            .push(AchievedRow {
                item_id: item_id.to_string(),
                level: level.to_string(),
            });
    }

    pub fn add_open_roles(&mut self, ids: &[&str]) {
        self.open_roles.extend(ids.iter().map(|s| s.to_string()));
    }

    /// Later calls are newer.
    pub fn add_message(
        &mut self,
        session_id: &str,
        role: &str,
        content: &str,
        embedding: Option<Vec<f32>>,
    ) {
        let created_at = self.tick();
        let id = format!("m{}", self.messages.len() + 1);
        self.messages.push((
            session_id.to_string(),
            MessageRow {
                id,
                role: role.to_string(),
                content: content.to_string(),
                embedding,
                created_at,
            },
        ));
    }

    /// Later calls are newer.
    pub fn add_action(&mut self, session_id: &str, entity_type: &str, embedding: Option<Vec<f32>>) {
        let mut entry = AuditEntry::new(
            Some(session_id.to_string()),
            entity_type,
            "e1",
            json!({}),
        );
        entry.embedding = embedding;
        entry.timestamp = self.tick();
        self.actions.lock().unwrap().push(entry);
    }

    pub fn set_rollup(&mut self, rows: Vec<CapabilityRollup>) {
        self.rollup = rows;
    }

    pub fn inserted_actions(&self) -> Vec<AuditEntry> {
        self.actions.lock().unwrap().clone()
    }

    pub fn fail_matching(&self, on: bool) {
        self.failing_matching.store(on, Ordering::SeqCst);
    }

    pub fn fail_similarity(&self, on: bool) {
        self.failing_similarity.store(on, Ordering::SeqCst);
    }

    pub fn fail_requirements(&self, on: bool) {
        self.failing_requirements.store(on, Ordering::SeqCst);
    }

    pub fn fail_open_roles(&self, on: bool) {
        self.failing_open_roles.store(on, Ordering::SeqCst);
    }

    pub fn fail_history(&self, on: bool) {
        self.failing_history.store(on, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, on: bool) {
        self.failing_inserts.store(on, Ordering::SeqCst);
    }

    pub fn fail_rollup(&self, on: bool) {
        self.failing_rollup.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl TalentStore for FakeStore {
    async fn match_embeddings(
        &self,
        query_id: &str,
        _source: EntityKind,
        _target: EntityKind,
        threshold: f64,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>> {
        self.hit(&self.failing_matching, "match_embeddings")?;
        let mut rows: Vec<EmbeddingMatch> = self
            .matches
            .get(query_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.similarity >= threshold)
            .collect();
        rows.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn similarity(&self, profile_id: &str, role_id: &str) -> StoreResult<Option<f64>> {
        self.hit(&self.failing_similarity, "similarity")?;
        Ok(self
            .similarities
            .get(&(profile_id.to_string(), role_id.to_string()))
            .copied())
    }

    async fn describe(&self, _kind: EntityKind, ids: &[String]) -> StoreResult<Vec<EntitySummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids.iter().filter_map(|id| self.entities.get(id).cloned()).collect())
    }

    async fn role_requirements(
        &self,
        role_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<RequirementRow>> {
        self.hit(&self.failing_requirements, "role_requirements")?;
        Ok(self
            .requirements
            .get(&(role_id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn profile_levels(
        &self,
        profile_id: &str,
        kind: RequirementKind,
    ) -> StoreResult<Vec<AchievedRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .levels
            .get(&(profile_id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn open_role_ids(&self, limit: usize) -> StoreResult<Vec<String>> {
        self.hit(&self.failing_open_roles, "open_role_ids")?;
        Ok(self.open_roles.iter().take(limit).cloned().collect())
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<MessageRow>> {
        self.hit(&self.failing_history, "recent_messages")?;
        let mut rows: Vec<MessageRow> = self
            .messages
            .iter()
            .filter(|(s, m)| s == session_id && !m.is_system())
            .map(|(_, m)| m.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn recent_actions(&self, session_id: &str, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        self.hit(&self.failing_history, "recent_actions")?;
        let mut rows: Vec<AuditEntry> = self
            .actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn insert_action(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.hit(&self.failing_inserts, "insert_action")?;
        self.actions.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn capability_distribution(
        &self,
        _scope: Scope,
        _company_ids: &[String],
    ) -> StoreResult<Vec<CapabilityRollup>> {
        self.hit(&self.failing_rollup, "capability_distribution")?;
        Ok(self.rollup.clone())
    }
}

// ---------------------------------------------------------------------------
// FakeLlm
// ---------------------------------------------------------------------------

/// Answers planner prompts and chat prompts from separate scripts.
/// A `None` script fails the call.
#[derive(Default)]
pub struct FakeLlm {
    planner: Option<String>,
    chat: Option<String>,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn always(text: &str) -> Self {
        Self::scripted(Some(text), Some(text))
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn scripted(planner: Option<&str>, chat: Option<&str>) -> Self {
        Self {
            planner: planner.map(str::to_string),
            chat: chat.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(&self, system: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = if system == PLANNER_SYSTEM {
            &self.planner
        } else {
            &self.chat
        };
        script.clone().ok_or(LlmError::EmptyContent)
    }
}

// ---------------------------------------------------------------------------
// ScriptedScorer
// ---------------------------------------------------------------------------

/// Fit scorer with per-candidate scores or failures, tracking concurrency.
/// Unscripted candidates score 50.
#[derive(Default)]
pub struct ScriptedScorer {
    scores: Mutex<HashMap<String, u32>>,
    failures: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedScorer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_score(&self, candidate: &str, score: u32) {
        self.scores.lock().unwrap().insert(candidate.to_string(), score);
    }

    pub fn fail_for(&self, candidate: &str) {
        self.failures.lock().unwrap().insert(candidate.to_string());
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FitScorer for ScriptedScorer {
    async fn score(&self, profile_id: &str, role_id: &str) -> Result<FitScore, AppError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = {
            let failures = self.failures.lock().unwrap();
            failures.contains(profile_id) || failures.contains(role_id)
        };
        if failed {
            return Err(AppError::Database(unavailable("scripted scorer")));
        }

        let score = {
            let scores = self.scores.lock().unwrap();
            scores
                .get(profile_id)
                .or_else(|| scores.get(role_id))
                .copied()
                .unwrap_or(50)
        };
        Ok(FitScore {
            profile_id: profile_id.to_string(),
            role_id: role_id.to_string(),
            capability_score: f64::from(score),
            skill_score: f64::from(score),
            semantic_score: f64::from(score),
            score,
            summary: ScoringPolicy::default().tier(score).label().to_string(),
            top_gaps: vec![],
        })
    }
}

/// A rollup row for analyst tests.
pub fn rollup_row(group: &str, capability: &str, count: i64) -> CapabilityRollup {
    CapabilityRollup {
        group_name: group.to_string(),
        capability: capability.to_string(),
        profile_count: count,
        average_level: Some(2.5),
    }
}
