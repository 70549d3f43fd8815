//! Gap Analyzer: joins a role's requirements against a profile's levels.
//!
//! Store errors propagate as `AppError::Database`; the caller decides
//! whether to abort or degrade.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::talent::{
    AchievedRow, GapRecord, GapType, Level, RequirementKind, RequirementRow,
};
use crate::store::TalentStore;

#[derive(Clone)]
pub struct GapAnalyzer {
    store: Arc<dyn TalentStore>,
}

impl GapAnalyzer {
    pub fn new(store: Arc<dyn TalentStore>) -> Self {
        Self { store }
    }

    /// Gaps across both skills and capabilities.
    pub async fn analyze(
        &self,
        profile_id: &str,
        role_id: &str,
    ) -> Result<Vec<GapRecord>, AppError> {
        let (capabilities, skills) = tokio::try_join!(
            self.analyze_kind(profile_id, role_id, RequirementKind::Capability),
            self.analyze_kind(profile_id, role_id, RequirementKind::Skill),
        )?;
        let mut gaps = capabilities;
        gaps.extend(skills);
        sort_gaps(&mut gaps);
        Ok(gaps)
    }

    /// Gaps for one requirement kind only.
    pub async fn analyze_kind(
        &self,
        profile_id: &str,
        role_id: &str,
        kind: RequirementKind,
    ) -> Result<Vec<GapRecord>, AppError> {
        let requirements = self.store.role_requirements(role_id, kind).await?;
        if requirements.is_empty() {
            return Ok(Vec::new());
        }
        let achieved = self.store.profile_levels(profile_id, kind).await?;
        Ok(compute_gaps(kind, &requirements, &achieved))
    }
}

/// Unknown level labels are read as Foundational.
fn ordinal(raw: &str) -> u8 {
    Level::parse(raw).unwrap_or(Level::Foundational).ordinal()
}

/// One record per requirement, sorted by severity desc then category asc.
pub fn compute_gaps(
    kind: RequirementKind,
    requirements: &[RequirementRow],
    achieved: &[AchievedRow],
) -> Vec<GapRecord> {
    let held: HashMap<&str, &str> = achieved
        .iter()
        .map(|a| (a.item_id.as_str(), a.level.as_str()))
        .collect();

    let mut gaps: Vec<GapRecord> = requirements
        .iter()
        .map(|req| {
            let required = ordinal(&req.level);
            let achieved_level = held.get(req.item_id.as_str()).copied();

            let (gap_type, severity) = match achieved_level {
                None => (GapType::Missing, 100.0),
                Some(level) => {
                    let achieved = ordinal(level);
                    if achieved >= required {
                        (GapType::Met, 0.0)
                    } else {
                        let delta = f64::from(required - achieved);
                        (GapType::Insufficient, delta / f64::from(required) * 100.0)
                    }
                }
            };

            GapRecord {
                item_id: req.item_id.clone(),
                name: req.name.clone(),
                category: req.category.clone(),
                kind,
                required_level: req.level.clone(),
                achieved_level: achieved_level.map(str::to_string),
                gap_type,
                severity,
            }
        })
        .collect();

    sort_gaps(&mut gaps);
    gaps
}

fn sort_gaps(gaps: &mut [GapRecord]) {
    gaps.sort_by(|a, b| match b.severity.total_cmp(&a.severity) {
        Ordering::Equal => a.category.cmp(&b.category),
        other => other,
    });
}

/// (missing, insufficient) counts for a gap list.
pub fn gap_counts(gaps: &[GapRecord]) -> (usize, usize) {
    gaps.iter().fold((0, 0), |(missing, insufficient), g| match g.gap_type {
        GapType::Missing => (missing + 1, insufficient),
        GapType::Insufficient => (missing, insufficient + 1),
        GapType::Met => (missing, insufficient),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeStore;

    fn req(id: &str, category: &str, level: &str) -> RequirementRow {
        RequirementRow {
            item_id: id.to_string(),
            name: format!("{id} name"),
            category: category.to_string(),
            level: level.to_string(),
        }
    }

    fn held(id: &str, level: &str) -> AchievedRow {
        AchievedRow {
            item_id: id.to_string(),
            level: level.to_string(),
        }
    }

    #[test]
    fn test_adept_required_intermediate_held_is_insufficient() {
        let gaps = compute_gaps(
            RequirementKind::Capability,
            &[req("data-analysis", "Analytics", "Adept")],
            &[held("data-analysis", "Intermediate")],
        );
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].gap_type, GapType::Insufficient);
        assert!((gaps[0].severity - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(gaps[0].achieved_level.as_deref(), Some("Intermediate"));
    }

    #[test]
    fn test_met_and_missing_severity_invariants() {
        let gaps = compute_gaps(
            RequirementKind::Skill,
            &[req("sql", "Data", "Advanced"), req("python", "Data", "Adept")],
            &[held("sql", "Highly Advanced")],
        );
        for gap in &gaps {
            match gap.gap_type {
                GapType::Met => assert_eq!(gap.severity, 0.0),
                GapType::Missing => assert_eq!(gap.severity, 100.0),
                GapType::Insufficient => assert!(gap.severity > 0.0 && gap.severity < 100.0),
            }
        }
        assert_eq!(gaps[0].item_id, "python");
        assert_eq!(gaps[0].gap_type, GapType::Missing);
        assert_eq!(gaps[1].gap_type, GapType::Met);
    }

    #[test]
    fn test_insufficient_severity_is_always_strictly_between_bounds() {
        let labels = ["Foundational", "Intermediate", "Adept", "Advanced", "Highly Advanced"];
        for required in labels {
            for achieved in labels {
                let gaps = compute_gaps(
                    RequirementKind::Capability,
                    &[req("x", "c", required)],
                    &[held("x", achieved)],
                );
                if gaps[0].gap_type == GapType::Insufficient {
                    assert!(gaps[0].severity > 0.0 && gaps[0].severity < 100.0);
                }
            }
        }
    }

    #[test]
    fn test_ties_broken_by_category() {
        let gaps = compute_gaps(
            RequirementKind::Capability,
            &[req("a", "Zeta", "Adept"), req("b", "Alpha", "Adept")],
            &[],
        );
        assert_eq!(gaps[0].category, "Alpha");
        assert_eq!(gaps[1].category, "Zeta");
    }

    #[test]
    fn test_gap_counts() {
        let gaps = compute_gaps(
            RequirementKind::Skill,
            &[req("a", "c", "Adept"), req("b", "c", "Adept"), req("c", "c", "Adept")],
            &[held("a", "Adept"), held("b", "Foundational")],
        );
        assert_eq!(gap_counts(&gaps), (1, 1));
    }

    #[tokio::test]
    async fn test_analyze_merges_both_kinds() {
        let mut store = FakeStore::default();
        store.add_requirement(
            "r1",
            RequirementKind::Capability,
            "data-analysis",
            "Analytics",
            "Adept",
        );
        store.add_requirement("r1", RequirementKind::Skill, "sql", "Data", "Intermediate");
        store.add_level("p1", RequirementKind::Capability, "data-analysis", "Intermediate");

        let gaps = GapAnalyzer::new(Arc::new(store)).analyze("p1", "r1").await.unwrap();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].item_id, "sql");
        assert_eq!(gaps[1].kind, RequirementKind::Capability);
    }

    #[tokio::test]
    async fn test_store_failure_is_database_error() {
        let mut store = FakeStore::default();
        store.add_requirement("r1", RequirementKind::Skill, "sql", "Data", "Adept");
        store.fail_requirements(true);

        let err = GapAnalyzer::new(Arc::new(store)).analyze("p1", "r1").await.unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
