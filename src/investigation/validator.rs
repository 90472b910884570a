//! Structural plan checks. Pure; callers decide whether to enforce the verdict.

use serde::{Deserialize, Serialize};

use crate::investigation::types::InvestigationPlan;

pub const DEFAULT_ADVISORY_MAX_SECONDS: u64 = 1800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Advisory only, never affects `is_valid`
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlanValidator {
    advisory_max_seconds: u64,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISORY_MAX_SECONDS)
    }
}

impl PlanValidator {
    pub fn new(advisory_max_seconds: u64) -> Self {
        Self {
            advisory_max_seconds,
        }
    }

    pub fn validate(&self, plan: &InvestigationPlan) -> PlanValidation {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        if plan.phases.is_empty() {
            issues.push("Plan has no phases".to_string());
        }
        for phase in &plan.phases {
            if phase.queries.is_empty() {
                issues.push(format!(
                    "Phase '{}' ({}) has no queries",
                    phase.name, phase.id
                ));
            }
            for query in &phase.queries {
                if query.query.trim().is_empty() {
                    issues.push(format!(
                        "Query {} in phase '{}' has empty query text",
                        query.id, phase.name
                    ));
                }
            }
        }

        if plan.estimated_total_time > self.advisory_max_seconds {
            suggestions.push(format!(
                "Estimated time {}s exceeds {}s; consider splitting the investigation or trimming phases",
                plan.estimated_total_time, self.advisory_max_seconds
            ));
        }

        PlanValidation {
            is_valid: issues.is_empty(),
            issues,
            suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigation::planner::fallback_outline;
    use crate::investigation::types::{
        InvestigationPhase, InvestigationProblem, InvestigationType, PhasePriority,
    };
    use chrono::Utc;

    fn plan() -> InvestigationPlan {
        let outline = fallback_outline(InvestigationType::Performance);
        InvestigationPlan {
            id: "plan-1".into(),
            problem: InvestigationProblem::new("slow"),
            detected_type: InvestigationType::Performance,
            phases: outline.phases,
            estimated_total_time: outline.estimated_total_time,
            confidence: outline.confidence,
            reasoning: outline.reasoning,
            created_at: Utc::now(),
            provenance: outline.provenance,
        }
    }

    #[test]
    fn well_formed_plan_is_valid() {
        let result = PlanValidator::default().validate(&plan());
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn empty_phase_is_named_in_issue() {
        let mut p = plan();
        p.phases.push(InvestigationPhase {
            id: "phase-2".into(),
            name: "Hollow".into(),
            description: String::new(),
            queries: vec![],
            priority: PhasePriority::Low,
            estimated_time: None,
            dependencies: vec![],
        });
        let result = PlanValidator::default().validate(&p);
        assert!(!result.is_valid);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].contains("Hollow"));
    }

    #[test]
    fn blank_query_and_missing_phases_each_reported() {
        let mut p = plan();
        p.phases[0].queries[0].query = "   ".into();
        let result = PlanValidator::default().validate(&p);
        assert_eq!(result.issues.len(), 1);

        p.phases.clear();
        let result = PlanValidator::default().validate(&p);
        assert_eq!(result.issues, vec!["Plan has no phases".to_string()]);
    }

    #[test]
    fn long_estimate_is_advisory_only() {
        let mut p = plan();
        p.estimated_total_time = 3600;
        let result = PlanValidator::default().validate(&p);
        assert!(result.is_valid);
        assert_eq!(result.suggestions.len(), 1);
    }
}
