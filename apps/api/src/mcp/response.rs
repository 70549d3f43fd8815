//! Outbound loop response: a common envelope around a mode-tagged payload.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::mcp::planner::PlannerRecommendation;
use crate::mcp::request::Mode;
use crate::models::talent::{CapabilityRollup, FitScore, MatchCandidate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            Priority::High
        } else if confidence >= 0.5 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl From<&PlannerRecommendation> for NextAction {
    fn from(rec: &PlannerRecommendation) -> Self {
        Self {
            action_type: rec.tool.as_str().to_string(),
            description: rec.reason.clone(),
            priority: Some(Priority::from_confidence(rec.confidence)),
        }
    }
}

/// Mode-specific results. Serialized inline with a `mode` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModePayload {
    Candidate {
        matches: Vec<MatchCandidate>,
        recommendations: Vec<FitScore>,
    },
    Hiring {
        matches: Vec<MatchCandidate>,
        recommendations: Vec<FitScore>,
    },
    Analyst {
        matches: Vec<MatchCandidate>,
        recommendations: Vec<CapabilityRollup>,
    },
    General {
        matches: Vec<MatchCandidate>,
        recommendations: Vec<PlannerRecommendation>,
    },
}

impl ModePayload {
    pub fn empty(mode: Mode) -> Self {
        match mode {
            Mode::Candidate => ModePayload::Candidate {
                matches: vec![],
                recommendations: vec![],
            },
            Mode::Hiring => ModePayload::Hiring {
                matches: vec![],
                recommendations: vec![],
            },
            Mode::Analyst => ModePayload::Analyst {
                matches: vec![],
                recommendations: vec![],
            },
            Mode::General => ModePayload::General {
                matches: vec![],
                recommendations: vec![],
            },
        }
    }

    pub fn matches(&self) -> &[MatchCandidate] {
        match self {
            ModePayload::Candidate { matches, .. }
            | ModePayload::Hiring { matches, .. }
            | ModePayload::Analyst { matches, .. }
            | ModePayload::General { matches, .. } => matches,
        }
    }

    pub fn recommendation_count(&self) -> usize {
        match self {
            ModePayload::Candidate { recommendations, .. }
            | ModePayload::Hiring { recommendations, .. } => recommendations.len(),
            ModePayload::Analyst { recommendations, .. } => recommendations.len(),
            ModePayload::General { recommendations, .. } => recommendations.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopData {
    #[serde(flatten)]
    pub payload: ModePayload,
    pub chat_response: ChatResponse,
    pub next_actions: Vec<NextAction>,
    pub actions_taken: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LoopData>,
}

const FAILURE_FOLLOW_UP: &str = "Would you like to try again or ask something else?";

impl LoopResponse {
    pub fn success(data: LoopData) -> Self {
        Self {
            success: true,
            error: None,
            error_code: None,
            data: Some(data),
        }
    }

    /// A complete envelope for a failed run, with a readable chat message.
    pub fn failure(mode: Mode, err: &AppError) -> Self {
        let message = err.user_message();
        Self {
            success: false,
            error: Some(message.clone()),
            error_code: Some(err.code().to_string()),
            data: Some(LoopData {
                payload: ModePayload::empty(mode),
                chat_response: ChatResponse {
                    message,
                    follow_up_question: Some(FAILURE_FOLLOW_UP.to_string()),
                },
                next_actions: vec![],
                actions_taken: vec![],
            }),
        }
    }
}
