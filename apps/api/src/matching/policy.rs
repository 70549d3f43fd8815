use serde::{Deserialize, Serialize};

/// The one scoring policy shared by `FitScorer` and `BatchScorer`.
///
/// `score = round(capability × capability_weight + skill × skill_weight + semantic × semantic_weight)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub capability_weight: f64,
    pub skill_weight: f64,
    pub semantic_weight: f64,
    /// Penalty units charged per missing requirement.
    pub missing_penalty: f64,
    /// Penalty units charged per requirement held below the required level.
    pub insufficient_penalty: f64,
    pub excellent_threshold: u32,
    pub good_threshold: u32,
    pub moderate_threshold: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            capability_weight: 0.4,
            skill_weight: 0.3,
            semantic_weight: 0.3,
            missing_penalty: 1.0,
            insufficient_penalty: 0.5,
            excellent_threshold: 80,
            good_threshold: 60,
            moderate_threshold: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitTier {
    Excellent,
    Good,
    Moderate,
    Limited,
}

impl FitTier {
    pub fn label(self) -> &'static str {
        match self {
            FitTier::Excellent => "Excellent fit",
            FitTier::Good => "Good fit",
            FitTier::Moderate => "Moderate fit",
            FitTier::Limited => "Limited fit",
        }
    }
}

impl ScoringPolicy {
    /// `max(0, 100 × (1 − penalty / total))`, or 100 when nothing is required.
    pub fn component_score(&self, missing: usize, insufficient: usize, total: usize) -> f64 {
        if total == 0 {
            return 100.0;
        }
        let penalty =
            missing as f64 * self.missing_penalty + insufficient as f64 * self.insufficient_penalty;
        (100.0 * (1.0 - penalty / total as f64)).max(0.0)
    }

    /// Weighted blend of the three normalized sub-scores, clamped to 0–100.
    pub fn combine(&self, capability: f64, skill: f64, semantic: f64) -> u32 {
        let blended = capability * self.capability_weight
            + skill * self.skill_weight
            + semantic * self.semantic_weight;
        blended.round().clamp(0.0, 100.0) as u32
    }

    pub fn tier(&self, score: u32) -> FitTier {
        if score >= self.excellent_threshold {
            FitTier::Excellent
        } else if score >= self.good_threshold {
            FitTier::Good
        } else if score >= self.moderate_threshold {
            FitTier::Moderate
        } else {
            FitTier::Limited
        }
    }
}
