use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Which side of the marketplace an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Profile,
    Role,
}

impl EntityKind {
    /// Table name passed to the `match_embeddings` RPC.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Profile => "profiles",
            EntityKind::Role => "roles",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            EntityKind::Profile => EntityKind::Role,
            EntityKind::Role => EntityKind::Profile,
        }
    }
}

/// A ranked semantic match. Identity is `(id, kind)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub similarity: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// Requirements come in two flavours that are scored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    Capability,
    Skill,
}

/// Proficiency scale shared by capabilities and skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Foundational = 1,
    Intermediate = 2,
    Adept = 3,
    Advanced = 4,
    HighlyAdvanced = 5,
}

impl Level {
    /// Parses a stored level label. Accepts the canonical names in any case,
    /// with spaces, dashes or underscores, and the ordinals 1–5.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "foundational" | "1" => Some(Level::Foundational),
            "intermediate" | "2" => Some(Level::Intermediate),
            "adept" | "3" => Some(Level::Adept),
            "advanced" | "4" => Some(Level::Advanced),
            "highlyadvanced" | "5" => Some(Level::HighlyAdvanced),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapType {
    Met,
    Insufficient,
    Missing,
}

/// One role requirement joined against a profile's achieved level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapRecord {
    pub item_id: String,
    pub name: String,
    pub category: String,
    pub kind: RequirementKind,
    pub required_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_level: Option<String>,
    pub gap_type: GapType,
    pub severity: f64,
}

/// Combined 0–100 fit for a (profile, role) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitScore {
    pub profile_id: String,
    pub role_id: String,
    pub capability_score: f64,
    pub skill_score: f64,
    pub semantic_score: f64,
    pub score: u32,
    pub summary: String,
    /// Highest-severity gaps behind the score, for narrative use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_gaps: Vec<GapRecord>,
}

// ────────────────────────────────────────────────────────────────────────────
// Store rows
// ────────────────────────────────────────────────────────────────────────────

/// A row returned by the `match_embeddings` RPC.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EmbeddingMatch {
    pub id: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct EntitySummary {
    pub id: String,
    pub name: String,
    pub summary: Option<String>,
    pub metadata: Value,
}

/// A capability or skill a role asks for.
#[derive(Debug, Clone, FromRow)]
pub struct RequirementRow {
    pub item_id: String,
    pub name: String,
    pub category: String,
    pub level: String,
}

/// A capability or skill level a profile holds.
#[derive(Debug, Clone, FromRow)]
pub struct AchievedRow {
    pub item_id: String,
    pub level: String,
}

/// Grouping dimension for the analyst capability rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Taxonomy,
    Division,
    Region,
    Company,
}

/// Aggregated capability distribution for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRollup {
    pub group_name: String,
    pub capability: String,
    pub profile_count: i64,
    pub average_level: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_accepts_label_variants() {
        assert_eq!(Level::parse("Adept"), Some(Level::Adept));
        assert_eq!(Level::parse("highly advanced"), Some(Level::HighlyAdvanced));
        assert_eq!(Level::parse("Highly_Advanced"), Some(Level::HighlyAdvanced));
        assert_eq!(Level::parse(" 2 "), Some(Level::Intermediate));
        assert_eq!(Level::parse("expert"), None);
    }

    #[test]
    fn test_level_ordering_follows_scale() {
        assert!(Level::Foundational < Level::Intermediate);
        assert!(Level::Advanced < Level::HighlyAdvanced);
        assert_eq!(Level::Adept.ordinal(), 3);
    }

    #[test]
    fn test_match_candidate_serializes_kind_as_type() {
        let candidate = MatchCandidate {
            id: "r1".to_string(),
            kind: EntityKind::Role,
            similarity: 0.82,
            name: "Data Analyst".to_string(),
            summary: None,
            metadata: Value::Null,
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["type"], "role");
        assert!(json.get("summary").is_none());
    }
}
