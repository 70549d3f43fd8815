//! Mode Loop Executor: the per-request MCP pipeline.
//!
//! `validating → context-loading → planning → matching/scoring → logging → responding`
//!
//! Context, planning and narrative are best-effort. A matching/scoring
//! failure is caught and answered with a degraded message while the run still
//! succeeds. Only validation and the retry gate end in an error envelope.
//!
//! A run is cached only when no step degraded and its payload depends on
//! hashed request keys alone. The session retry counter is reset unless
//! matching/scoring failed.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::LoopSettings;
use crate::errors::AppError;
use crate::llm_client::LanguageModel;
use crate::matching::batch::{Anchor, BatchScorer};
use crate::matching::fit_scoring::FitScorer;
use crate::matching::semantic::SemanticMatcher;
use crate::mcp::audit::{loop_entity_type, semantic_metrics, ActionLogger};
use crate::mcp::context::ConversationContextLoader;
use crate::mcp::planner::{PlannerRecommendation, PlannerRecommender, Tool};
use crate::mcp::request::{LoopRequest, Mode, RawLoopRequest};
use crate::mcp::responder::{ChatResponder, GENERIC_FOLLOW_UP};
use crate::mcp::response::{ChatResponse, LoopData, LoopResponse, ModePayload, NextAction};
use crate::models::conversation::{AuditEntry, ConversationContext};
use crate::models::talent::{EntityKind, FitScore};
use crate::session::{request_hash, LoopMemo, SessionStore};
use crate::soft::{settle, within, Degraded, Soft};
use crate::store::TalentStore;

pub const DEGRADED_ANALYSIS: &str =
    "I was unable to generate a detailed analysis right now. \
    Here is what I could find so far.";

/// Steps completed and whether any of them fell back.
#[derive(Debug, Default)]
struct StepLog {
    actions: Vec<String>,
    degraded: bool,
}

impl StepLog {
    fn settle<T>(&mut self, step: &str, outcome: Soft<T>) -> T {
        let (value, degraded) = settle(step, outcome);
        self.degraded |= degraded;
        value
    }

    fn done(&mut self, action: &str) {
        self.actions.push(action.to_string());
    }
}

struct RunOutcome {
    data: LoopData,
    stage_failed: bool,
    degraded: bool,
}

pub struct McpLoop {
    store: Arc<dyn TalentStore>,
    matcher: SemanticMatcher,
    batch: BatchScorer,
    context: ConversationContextLoader,
    planner: PlannerRecommender,
    responder: ChatResponder,
    audit: ActionLogger,
    memo: LoopMemo,
    settings: LoopSettings,
}

impl McpLoop {
    pub fn new(
        store: Arc<dyn TalentStore>,
        llm: Arc<dyn LanguageModel>,
        sessions: Arc<dyn SessionStore>,
        fit_scorer: Arc<dyn FitScorer>,
        settings: LoopSettings,
    ) -> Self {
        let timeout = settings.call_timeout;
        let matcher = SemanticMatcher::new(store.clone(), timeout);
        Self {
            batch: BatchScorer::new(matcher.clone(), fit_scorer),
            matcher,
            context: ConversationContextLoader::new(store.clone(), timeout),
            planner: PlannerRecommender::new(llm.clone(), timeout),
            responder: ChatResponder::new(llm, timeout),
            audit: ActionLogger::new(store.clone(), timeout),
            memo: LoopMemo::new(sessions, settings.retry_ceiling, settings.cache_ttl),
            store,
            settings,
        }
    }

    /// Runs one request end to end. Never fails: every path yields a
    /// complete envelope and the HTTP status that goes with it.
    pub async fn handle(&self, raw: RawLoopRequest) -> (StatusCode, LoopResponse) {
        let hash = match serde_json::to_value(&raw) {
            Ok(value) => Some(request_hash(&value)),
            Err(e) => {
                warn!("Could not hash loop request, caching disabled for it: {e}");
                None
            }
        };
        let declared_mode = raw.declared_mode().unwrap_or(Mode::General);

        let request = match raw.validate() {
            Ok(request) => request,
            Err(err) => {
                warn!("Rejected loop request: {err}");
                return (err.status(), LoopResponse::failure(declared_mode, &err));
            }
        };

        match self.execute(&request, hash.as_deref()).await {
            Ok(response) => (StatusCode::OK, response),
            Err(err) => {
                warn!("Loop failed in {} mode: {err}", request.mode().as_str());
                if let Some(session_id) = request.session_id() {
                    self.audit
                        .log_failure(session_id, request.mode(), &audit_entity_id(&request), &err)
                        .await;
                }
                (err.status(), LoopResponse::failure(request.mode(), &err))
            }
        }
    }

    async fn execute(
        &self,
        request: &LoopRequest,
        hash: Option<&str>,
    ) -> Result<LoopResponse, AppError> {
        let session_id = request.session_id();
        if let Some(session_id) = session_id {
            self.memo.begin_attempt(session_id).await?;
        }
        let hash = hash.filter(|_| cacheable(request));

        if let Some(hash) = hash {
            if let Some(cached) = self.memo.lookup(hash).await {
                info!("Replaying cached {} response", request.mode().as_str());
                if let Some(session_id) = session_id {
                    self.memo.record_success(session_id).await;
                }
                return Ok(cached);
            }
        }

        let outcome = self.run(request).await;
        let response = LoopResponse::success(outcome.data);

        if let Some(session_id) = session_id {
            if !outcome.stage_failed {
                self.memo.record_success(session_id).await;
            }
        }
        if let Some(hash) = hash {
            if !outcome.degraded {
                self.memo.remember(hash, &response).await;
            }
        }
        Ok(response)
    }

    async fn run(&self, request: &LoopRequest) -> RunOutcome {
        let mode = request.mode();
        let common = request.common();
        let mut log = StepLog::default();

        // context-loading
        let context = match common.session_id.as_deref() {
            Some(session_id) => {
                let context = log.settle(
                    "context loading",
                    self.context.load(session_id, &self.settings.context).await,
                );
                log.done("context_loaded");
                context
            }
            None => ConversationContext::default(),
        };
        let last_message = common
            .last_message
            .clone()
            .or_else(|| context.last_user_message().map(str::to_string));

        // planning
        let mut recommendations = log.settle(
            "planning",
            self.planner
                .recommend(
                    mode,
                    &request.anchor_ids(),
                    last_message.as_deref(),
                    &common.semantic_context,
                )
                .await,
        );
        if let Some(requested) = requested_tool(mode, common.action.as_deref()) {
            recommendations.retain(|r| r.tool != requested);
            recommendations.insert(
                0,
                PlannerRecommendation {
                    tool: requested,
                    reason: "Requested explicitly".to_string(),
                    confidence: 1.0,
                    inputs: json!({}),
                },
            );
        }
        log.done("planner_recommendation");

        // matching/scoring
        let (payload, stage_failure) = match self
            .match_and_score(request, &recommendations, &mut log)
            .await
        {
            Ok(payload) => (payload, None),
            Err(Degraded { fallback, reason }) => {
                warn!("Matching/scoring failed in {} mode: {reason}", mode.as_str());
                log.degraded = true;
                (fallback, Some(reason))
            }
        };

        // logging
        let metrics = semantic_metrics(payload.matches(), context.context_embedding.is_some());
        let mut entry = AuditEntry::new(
            common.session_id.clone(),
            loop_entity_type(mode),
            audit_entity_id(request),
            json!({
                "mode": mode.as_str(),
                "action": common.action,
                "anchorIds": request.anchor_ids(),
                "recommendedTools": recommendations
                    .iter()
                    .map(|r| r.tool.as_str())
                    .collect::<Vec<_>>(),
                "matchCount": payload.matches().len(),
                "recommendationCount": payload.recommendation_count(),
                "stageFailure": stage_failure,
            }),
        )
        .with_metrics(&metrics);
        entry.embedding = context.context_embedding.clone();
        if self.audit.log(entry).await {
            log.done("audit_logged");
        }

        // responding
        let chat_response = if stage_failure.is_some() {
            ChatResponse {
                message: DEGRADED_ANALYSIS.to_string(),
                follow_up_question: Some(GENERIC_FOLLOW_UP.to_string()),
            }
        } else {
            let data = serde_json::to_value(&payload).unwrap_or(Value::Null);
            log.settle(
                "narrative",
                self.responder
                    .respond(mode, last_message.as_deref(), &context, &data)
                    .await,
            )
        };
        log.done("chat_response");

        RunOutcome {
            data: LoopData {
                payload,
                chat_response,
                next_actions: recommendations.iter().map(NextAction::from).collect(),
                actions_taken: log.actions,
            },
            stage_failed: stage_failure.is_some(),
            degraded: log.degraded,
        }
    }

    /// The mode-specific stage. `Err` carries whatever partial payload was
    /// computed before the failure.
    async fn match_and_score(
        &self,
        request: &LoopRequest,
        recommendations: &[PlannerRecommendation],
        log: &mut StepLog,
    ) -> Soft<ModePayload> {
        let limit = self.settings.match_limit;
        let threshold = self.settings.match_threshold;

        match request {
            LoopRequest::Candidate { profile_id, .. } => {
                let matches = log.settle(
                    "semantic match",
                    self.matcher
                        .find_matches(
                            profile_id,
                            EntityKind::Profile,
                            EntityKind::Role,
                            limit,
                            threshold,
                        )
                        .await,
                );
                log.done("semantic_match");

                let open_roles = within(
                    self.settings.call_timeout,
                    self.store.open_role_ids(self.settings.open_role_pool),
                )
                .await;
                let open_roles = match open_roles {
                    Ok(ids) => ids,
                    Err(reason) => {
                        return Err(Degraded::new(
                            ModePayload::Candidate {
                                matches,
                                recommendations: vec![],
                            },
                            format!("open roles: {reason}"),
                        ))
                    }
                };

                // Only open roles are scored; semantic rank decides who goes first
                let open: HashSet<String> = open_roles.iter().cloned().collect();
                let ranked_open = matches
                    .iter()
                    .map(|m| m.id.clone())
                    .filter(|id| open.contains(id));
                let pool = merge_ids(ranked_open, open_roles);
                match self.score_pool(&Anchor::Profile(profile_id.clone()), &pool).await {
                    Ok(recommendations) => {
                        log.done("batch_score");
                        Ok(ModePayload::Candidate {
                            matches,
                            recommendations,
                        })
                    }
                    Err(reason) => Err(Degraded::new(
                        ModePayload::Candidate {
                            matches,
                            recommendations: vec![],
                        },
                        reason,
                    )),
                }
            }
            LoopRequest::Hiring { role_id, .. } => {
                let matches = self
                    .matcher
                    .find_matches(role_id, EntityKind::Role, EntityKind::Profile, limit, threshold)
                    .await
                    .map_err(|d| Degraded::new(ModePayload::empty(Mode::Hiring), d.reason))?;
                log.done("semantic_match");

                let pool: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
                match self.score_pool(&Anchor::Role(role_id.clone()), &pool).await {
                    Ok(recommendations) => {
                        log.done("batch_score");
                        Ok(ModePayload::Hiring {
                            matches,
                            recommendations,
                        })
                    }
                    Err(reason) => Err(Degraded::new(
                        ModePayload::Hiring {
                            matches,
                            recommendations: vec![],
                        },
                        reason,
                    )),
                }
            }
            LoopRequest::Analyst {
                company_ids, scope, ..
            } => {
                let rollup = within(
                    self.settings.call_timeout,
                    self.store.capability_distribution(*scope, company_ids),
                )
                .await
                .map_err(|reason| {
                    Degraded::new(
                        ModePayload::empty(Mode::Analyst),
                        format!("capability distribution: {reason}"),
                    )
                })?;
                log.done("capability_distribution");
                Ok(ModePayload::Analyst {
                    matches: vec![],
                    recommendations: rollup,
                })
            }
            LoopRequest::General { common } => Ok(ModePayload::General {
                matches: common.semantic_context.previous_matches.clone(),
                recommendations: recommendations.to_vec(),
            }),
        }
    }

    /// Batch-scores `pool` against `anchor`, keeping successful fits only.
    /// Fails when every candidate failed, since that points at a shared
    /// dependency rather than one bad pair.
    async fn score_pool(&self, anchor: &Anchor, pool: &[String]) -> Result<Vec<FitScore>, String> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        let results = self
            .batch
            .batch_score(anchor, pool, &self.settings.batch)
            .await
            .map_err(|e| e.to_string())?;

        if results.iter().all(|r| !r.success) {
            return Err(results
                .into_iter()
                .find_map(|r| r.error)
                .unwrap_or_else(|| "every candidate failed to score".to_string()));
        }
        Ok(results.into_iter().filter_map(|r| r.fit).collect())
    }
}

/// General runs echo `previousMatches`, which the request hash does not cover.
fn cacheable(request: &LoopRequest) -> bool {
    !matches!(request, LoopRequest::General { .. })
}

/// An explicit `action` is honoured only if it names a tool of the mode.
fn requested_tool(mode: Mode, action: Option<&str>) -> Option<Tool> {
    action
        .and_then(Tool::parse)
        .filter(|tool| Tool::vocabulary(mode).contains(tool))
}

/// Ranked ids first, then the rest, each id once.
fn merge_ids(ranked: impl Iterator<Item = String>, rest: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ranked
        .chain(rest)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn audit_entity_id(request: &LoopRequest) -> String {
    request
        .anchor_ids()
        .into_iter()
        .next()
        .or_else(|| request.session_id().map(str::to_string))
        .unwrap_or_else(|| request.mode().as_str().to_string())
}
