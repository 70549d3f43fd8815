use std::sync::Arc;

use crate::config::LoopSettings;
use crate::llm_client::LanguageModel;
use crate::matching::batch::BatchScorer;
use crate::matching::fit_scoring::{FitScorer, GapFitScorer};
use crate::matching::gaps::GapAnalyzer;
use crate::matching::semantic::SemanticMatcher;
use crate::mcp::executor::McpLoop;
use crate::session::SessionStore;
use crate::store::TalentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable fit scorer. Default: GapFitScorer.
    pub fit_scorer: Arc<dyn FitScorer>,
    pub gap_analyzer: GapAnalyzer,
    pub batch_scorer: BatchScorer,
    pub mcp: Arc<McpLoop>,
    pub settings: LoopSettings,
}

impl AppState {
    /// Wires every component over the injected collaborators. Tests pass fakes.
    pub fn new(
        store: Arc<dyn TalentStore>,
        llm: Arc<dyn LanguageModel>,
        sessions: Arc<dyn SessionStore>,
        settings: LoopSettings,
    ) -> Self {
        let fit_scorer: Arc<dyn FitScorer> = Arc::new(GapFitScorer::new(
            store.clone(),
            settings.policy.clone(),
            settings.call_timeout,
        ));
        let matcher = SemanticMatcher::new(store.clone(), settings.call_timeout);
        let mcp = McpLoop::new(
            store.clone(),
            llm,
            sessions,
            fit_scorer.clone(),
            settings.clone(),
        );

        Self {
            gap_analyzer: GapAnalyzer::new(store),
            batch_scorer: BatchScorer::new(matcher, fit_scorer.clone()),
            fit_scorer,
            mcp: Arc::new(mcp),
            settings,
        }
    }
}
