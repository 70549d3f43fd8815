//! Inbound loop request: the loose wire shape and the validated, mode-tagged form.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::talent::{MatchCandidate, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Candidate,
    Hiring,
    Analyst,
    General,
}

impl Mode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "candidate" => Some(Mode::Candidate),
            "hiring" => Some(Mode::Hiring),
            "analyst" => Some(Mode::Analyst),
            "general" => Some(Mode::General),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Candidate => "candidate",
            Mode::Hiring => "hiring",
            Mode::Analyst => "analyst",
            Mode::General => "general",
        }
    }
}

/// What the caller already has on screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_matches: Vec<MatchCandidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_context: Option<SemanticContext>,
}

/// The request body as received. Every field is optional here so that a
/// missing `mode` or anchor surfaces as `VALIDATION_ERROR`, not a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLoopRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Explicit tool the caller wants run next, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RawContext>,
}

/// Fields every mode shares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopCommon {
    pub session_id: Option<String>,
    pub action: Option<String>,
    pub last_message: Option<String>,
    pub semantic_context: SemanticContext,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopRequest {
    Candidate {
        profile_id: String,
        common: LoopCommon,
    },
    Hiring {
        role_id: String,
        common: LoopCommon,
    },
    Analyst {
        company_ids: Vec<String>,
        scope: Scope,
        common: LoopCommon,
    },
    General {
        common: LoopCommon,
    },
}

/// Blank strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawLoopRequest {
    /// Best guess at the mode for shaping an error envelope.
    pub fn declared_mode(&self) -> Option<Mode> {
        self.mode.as_deref().and_then(Mode::parse)
    }

    pub fn validate(self) -> Result<LoopRequest, AppError> {
        let mode = match present(self.mode) {
            None => return Err(AppError::Validation("mode is required".to_string())),
            Some(raw) => Mode::parse(&raw)
                .ok_or_else(|| AppError::Validation(format!("unsupported mode '{raw}'")))?,
        };

        let context = self.context.unwrap_or_default();
        let common = LoopCommon {
            session_id: present(self.session_id),
            action: present(self.action),
            last_message: present(context.last_message),
            semantic_context: context.semantic_context.unwrap_or_default(),
        };

        let request = match mode {
            Mode::Candidate => LoopRequest::Candidate {
                profile_id: present(self.profile_id).ok_or_else(|| {
                    AppError::Validation("profileId is required for candidate mode".to_string())
                })?,
                common,
            },
            Mode::Hiring => LoopRequest::Hiring {
                role_id: present(self.role_id).ok_or_else(|| {
                    AppError::Validation("roleId is required for hiring mode".to_string())
                })?,
                common,
            },
            Mode::Analyst => LoopRequest::Analyst {
                company_ids: context
                    .company_ids
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|id| present(Some(id)))
                    .collect(),
                scope: context.scope.unwrap_or_default(),
                common,
            },
            Mode::General => LoopRequest::General { common },
        };
        Ok(request)
    }
}

impl LoopRequest {
    pub fn mode(&self) -> Mode {
        match self {
            LoopRequest::Candidate { .. } => Mode::Candidate,
            LoopRequest::Hiring { .. } => Mode::Hiring,
            LoopRequest::Analyst { .. } => Mode::Analyst,
            LoopRequest::General { .. } => Mode::General,
        }
    }

    pub fn common(&self) -> &LoopCommon {
        match self {
            LoopRequest::Candidate { common, .. }
            | LoopRequest::Hiring { common, .. }
            | LoopRequest::Analyst { common, .. }
            | LoopRequest::General { common } => common,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.common().session_id.as_deref()
    }

    /// Ids the run is anchored on, for the planner and the audit trail.
    pub fn anchor_ids(&self) -> Vec<String> {
        match self {
            LoopRequest::Candidate { profile_id, .. } => vec![profile_id.clone()],
            LoopRequest::Hiring { role_id, .. } => vec![role_id.clone()],
            LoopRequest::Analyst { company_ids, .. } => company_ids.clone(),
            LoopRequest::General { .. } => Vec::new(),
        }
    }
}
