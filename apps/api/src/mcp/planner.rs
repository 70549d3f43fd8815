//! Planner Recommender: asks the model which analysis tools to run next.
//!
//! Choices are restricted to a per-mode vocabulary. Any failure (call error,
//! timeout, unparsable or out-of-vocabulary output) degrades to a single
//! hard-coded recommendation for the mode.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::llm_client::{complete_json, LanguageModel};
use crate::mcp::prompts::{PLANNER_PROMPT_TEMPLATE, PLANNER_SYSTEM};
use crate::mcp::request::{Mode, SemanticContext};
use crate::soft::{within, Degraded, Soft};

const MAX_RECOMMENDATIONS: usize = 3;
const FALLBACK_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    RoleMatching,
    CareerPathSuggestions,
    SkillGapAnalysis,
    ProfileMatching,
    ProfileFitScoring,
    InterviewFocus,
    CapabilityDistribution,
    TalentConcentration,
    ClarifyingQuestion,
    ModeSelection,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::RoleMatching => "role_matching",
            Tool::CareerPathSuggestions => "career_path_suggestions",
            Tool::SkillGapAnalysis => "skill_gap_analysis",
            Tool::ProfileMatching => "profile_matching",
            Tool::ProfileFitScoring => "profile_fit_scoring",
            Tool::InterviewFocus => "interview_focus",
            Tool::CapabilityDistribution => "capability_distribution",
            Tool::TalentConcentration => "talent_concentration",
            Tool::ClarifyingQuestion => "clarifying_question",
            Tool::ModeSelection => "mode_selection",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_lowercase().replace(['-', ' '], "_");
        ALL_TOOLS.iter().copied().find(|t| t.as_str() == wanted)
    }

    /// Tools the planner may pick from in `mode`.
    pub fn vocabulary(mode: Mode) -> &'static [Tool] {
        match mode {
            Mode::Candidate => &[
                Tool::RoleMatching,
                Tool::CareerPathSuggestions,
                Tool::SkillGapAnalysis,
            ],
            Mode::Hiring => &[
                Tool::ProfileMatching,
                Tool::ProfileFitScoring,
                Tool::SkillGapAnalysis,
                Tool::InterviewFocus,
            ],
            Mode::Analyst => &[Tool::CapabilityDistribution, Tool::TalentConcentration],
            Mode::General => &[Tool::ClarifyingQuestion, Tool::ModeSelection],
        }
    }
}

const ALL_TOOLS: &[Tool] = &[
    Tool::RoleMatching,
    Tool::CareerPathSuggestions,
    Tool::SkillGapAnalysis,
    Tool::ProfileMatching,
    Tool::ProfileFitScoring,
    Tool::InterviewFocus,
    Tool::CapabilityDistribution,
    Tool::TalentConcentration,
    Tool::ClarifyingQuestion,
    Tool::ModeSelection,
];

/// Advisory only. The executor may ignore any of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRecommendation {
    pub tool: Tool,
    pub reason: String,
    pub confidence: f64,
    #[serde(default)]
    pub inputs: Value,
}

/// The single recommendation used when planning fails.
pub fn fallback_recommendation(mode: Mode) -> PlannerRecommendation {
    let (tool, reason) = match mode {
        Mode::Candidate => (
            Tool::CareerPathSuggestions,
            "Suggest career paths based on the profile's strongest role matches",
        ),
        Mode::Hiring => (
            Tool::ProfileFitScoring,
            "Score the best-matching profiles against the role",
        ),
        Mode::Analyst => (
            Tool::CapabilityDistribution,
            "Summarise how capabilities are distributed across the organisation",
        ),
        Mode::General => (
            Tool::ClarifyingQuestion,
            "Ask whether the user is exploring roles, hiring, or analysing capabilities",
        ),
    };
    PlannerRecommendation {
        tool,
        reason: reason.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        inputs: json!({}),
    }
}

#[derive(Debug, Deserialize)]
struct PlannerReply {
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    tool: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    inputs: Value,
}

#[derive(Clone)]
pub struct PlannerRecommender {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl PlannerRecommender {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn recommend(
        &self,
        mode: Mode,
        anchor_ids: &[String],
        last_message: Option<&str>,
        semantic: &SemanticContext,
    ) -> Soft<Vec<PlannerRecommendation>> {
        let prompt = build_prompt(mode, anchor_ids, last_message, semantic);
        let reply = within(
            self.timeout,
            complete_json::<PlannerReply>(self.llm.as_ref(), PLANNER_SYSTEM, &prompt),
        )
        .await
        .map_err(|reason| Degraded::new(vec![fallback_recommendation(mode)], reason))?;

        let recommendations = filter_to_vocabulary(mode, reply.recommendations);
        if recommendations.is_empty() {
            return Err(Degraded::new(
                vec![fallback_recommendation(mode)],
                "planner returned no usable tools",
            ));
        }
        debug!(
            "Planner picked {:?} for {} mode",
            recommendations.iter().map(|r| r.tool).collect::<Vec<_>>(),
            mode.as_str()
        );
        Ok(recommendations)
    }
}

fn build_prompt(
    mode: Mode,
    anchor_ids: &[String],
    last_message: Option<&str>,
    semantic: &SemanticContext,
) -> String {
    let previous: Vec<&str> = semantic
        .previous_matches
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    let tools: Vec<String> = Tool::vocabulary(mode)
        .iter()
        .map(|t| format!("- {}", t.as_str()))
        .collect();

    PLANNER_PROMPT_TEMPLATE
        .replace("{mode}", mode.as_str())
        .replace("{anchors}", &none_if_empty(&anchor_ids.join(", ")))
        .replace("{message}", last_message.unwrap_or("(none)"))
        .replace(
            "{focus}",
            semantic.current_focus.as_deref().unwrap_or("(none)"),
        )
        .replace("{previous}", &none_if_empty(&previous.join(", ")))
        .replace("{tools}", &tools.join("\n"))
}

fn none_if_empty(text: &str) -> String {
    if text.is_empty() {
        "(none)".to_string()
    } else {
        text.to_string()
    }
}

/// Drops unknown and out-of-mode tools, dedups, clamps confidence and
/// orders by confidence descending.
fn filter_to_vocabulary(mode: Mode, raw: Vec<RawRecommendation>) -> Vec<PlannerRecommendation> {
    let allowed = Tool::vocabulary(mode);
    let mut picked: Vec<PlannerRecommendation> = Vec::new();
    for rec in raw {
        let Some(tool) = Tool::parse(&rec.tool) else {
            continue;
        };
        if !allowed.contains(&tool) || picked.iter().any(|p| p.tool == tool) {
            continue;
        }
        picked.push(PlannerRecommendation {
            tool,
            reason: rec.reason,
            confidence: rec.confidence.clamp(0.0, 1.0),
            inputs: rec.inputs,
        });
    }
    picked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    picked.truncate(MAX_RECOMMENDATIONS);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeLlm;

    fn planner(llm: FakeLlm) -> PlannerRecommender {
        PlannerRecommender::new(Arc::new(llm), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_parses_and_orders_recommendations() {
        let reply = r#"{"recommendations": [
            {"tool": "skill_gap_analysis", "reason": "gaps", "confidence": 0.6},
            {"tool": "role_matching", "reason": "find roles", "confidence": 0.9}
        ]}"#;
        let recs = planner(FakeLlm::scripted(Some(reply), None))
            .recommend(
                Mode::Candidate,
                &["p1".to_string()],
                Some("what next?"),
                &SemanticContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].tool, Tool::RoleMatching);
        assert_eq!(recs[1].tool, Tool::SkillGapAnalysis);
    }

    #[tokio::test]
    async fn test_out_of_vocabulary_tools_are_dropped() {
        let reply = r#"{"recommendations": [
            {"tool": "capability_distribution", "reason": "wrong mode", "confidence": 0.9},
            {"tool": "interview-focus", "reason": "prep", "confidence": 1.7}
        ]}"#;
        let recs = planner(FakeLlm::scripted(Some(reply), None))
            .recommend(Mode::Hiring, &["r1".to_string()], None, &SemanticContext::default())
            .await
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].tool, Tool::InterviewFocus);
        assert_eq!(recs[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_failed_call_falls_back_per_mode() {
        let err = planner(FakeLlm::failing())
            .recommend(Mode::Candidate, &["p1".to_string()], None, &SemanticContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.fallback.len(), 1);
        assert_eq!(err.fallback[0].tool, Tool::CareerPathSuggestions);
        assert_eq!(err.fallback[0].confidence, 0.7);
    }

    #[tokio::test]
    async fn test_unparsable_or_empty_output_falls_back() {
        let err = planner(FakeLlm::scripted(Some("I think you should match roles."), None))
            .recommend(Mode::Analyst, &[], None, &SemanticContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.fallback[0].tool, Tool::CapabilityDistribution);

        let err = planner(FakeLlm::scripted(Some(r#"{"recommendations": []}"#), None))
            .recommend(Mode::General, &[], None, &SemanticContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.fallback[0].tool, Tool::ClarifyingQuestion);
    }

    #[test]
    fn test_every_fallback_is_in_its_vocabulary() {
        for mode in [Mode::Candidate, Mode::Hiring, Mode::Analyst, Mode::General] {
            let fallback = fallback_recommendation(mode);
            assert!(Tool::vocabulary(mode).contains(&fallback.tool));
        }
    }
}
