//! Root-cause and recommendation synthesis over accumulated evidence.
//!
//! Deterministic given the evidence: no AI calls happen here.

use chrono::{DateTime, Utc};

use crate::investigation::types::{
    ContributingFactor, InvestigationContext, InvestigationEvidence, InvestigationPlan,
    InvestigationRecommendations, InvestigationResult, InvestigationType, PrimaryCause,
    RootCauseAnalysis, Severity, Significance, TimelineEvent,
};

/// Confidence reported when no critical evidence exists
const NO_CRITICAL_CONFIDENCE: f32 = 0.2;

/// Column names treated as component identifiers in evidence rows
const COMPONENT_COLUMNS: &[&str] = &[
    "service",
    "service_name",
    "cloud_RoleName",
    "target",
    "component",
];

/// Bound on components harvested from a single result
const MAX_COMPONENTS_PER_EVIDENCE: usize = 10;

pub fn analyze_root_cause(
    plan: &InvestigationPlan,
    evidence: &[InvestigationEvidence],
) -> RootCauseAnalysis {
    let critical: Vec<&InvestigationEvidence> = evidence
        .iter()
        .filter(|e| e.significance == Significance::Critical)
        .collect();

    let primary_cause = if critical.is_empty() {
        PrimaryCause {
            description: "No critical issues found in the collected evidence".to_string(),
            confidence: NO_CRITICAL_CONFIDENCE,
            supporting_evidence: Vec::new(),
            category: "unknown".to_string(),
        }
    } else {
        let confidence = critical
            .iter()
            .filter_map(|e| plan.query(&e.query_id).map(|q| q.confidence))
            .reduce(f32::max)
            .unwrap_or(plan.confidence);
        let description = critical
            .iter()
            .map(|e| e.summary.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        PrimaryCause {
            description,
            confidence,
            supporting_evidence: critical.iter().map(|e| e.id.clone()).collect(),
            category: plan.detected_type.to_string(),
        }
    };

    let contributing_factors = evidence
        .iter()
        .filter(|e| e.significance == Significance::Important)
        .map(|e| ContributingFactor {
            description: e.summary.clone(),
            evidence_id: e.id.clone(),
            significance: e.significance,
        })
        .collect();

    RootCauseAnalysis {
        primary_cause,
        contributing_factors,
        timeline: build_timeline(plan, evidence),
        affected_components: affected_components(plan, evidence),
        business_impact: business_impact(plan, critical.len()),
    }
}

fn build_timeline(plan: &InvestigationPlan, evidence: &[InvestigationEvidence]) -> Vec<TimelineEvent> {
    let mut ordered: Vec<&InvestigationEvidence> = evidence.iter().collect();
    ordered.sort_by_key(|e| e.collected_at);
    ordered
        .into_iter()
        .map(|e| {
            let purpose = plan
                .query(&e.query_id)
                .map(|q| q.purpose.as_str())
                .unwrap_or(e.query_id.as_str());
            TimelineEvent {
                timestamp: e.collected_at,
                description: format!("{}: {}", purpose, e.summary),
                evidence_id: e.id.clone(),
                significance: e.significance,
            }
        })
        .collect()
}

fn affected_components(plan: &InvestigationPlan, evidence: &[InvestigationEvidence]) -> Vec<String> {
    let mut components: Vec<String> = plan.problem.affected_services.clone();
    for e in evidence
        .iter()
        .filter(|e| e.significance != Significance::Informational)
    {
        let Some(col) = e.result.column_index(COMPONENT_COLUMNS) else {
            continue;
        };
        for row in e.result.rows.iter().take(MAX_COMPONENTS_PER_EVIDENCE) {
            if let Some(name) = row.get(col).and_then(|v| v.as_str())
                && !name.is_empty()
                && !components.iter().any(|c| c == name)
            {
                components.push(name.to_string());
            }
        }
    }
    components
}

fn business_impact(plan: &InvestigationPlan, critical_count: usize) -> String {
    let scope = match plan.problem.severity {
        Some(Severity::Critical) => "Critical severity: customer-facing functionality is likely disrupted",
        Some(Severity::High) => "High severity: a significant share of users is likely affected",
        Some(Severity::Medium) => "Medium severity: degraded experience for some users",
        Some(Severity::Low) => "Low severity: limited user-visible impact expected",
        None => "Severity not specified",
    };
    format!(
        "{}. {} critical finding(s) across {} phase(s).",
        scope,
        critical_count,
        plan.phases.len()
    )
}

pub fn recommend(
    plan: &InvestigationPlan,
    evidence: &[InvestigationEvidence],
) -> InvestigationRecommendations {
    let mut recs = InvestigationRecommendations::default();
    for e in evidence {
        let purpose = plan
            .query(&e.query_id)
            .map(|q| q.purpose.as_str())
            .unwrap_or(e.query_id.as_str());
        match e.significance {
            Significance::Critical => recs
                .immediate
                .push(format!("Address finding from '{}': {}", purpose, e.summary)),
            Significance::Important => recs
                .short_term
                .push(format!("Follow up on '{}': {}", purpose, e.summary)),
            Significance::Informational => {}
        }
    }

    let (long_term, prevention): (&[&str], &[&str]) = match plan.detected_type {
        InvestigationType::Performance => (
            &["Establish latency SLOs for the affected operations and track p95/p99 against them"],
            &["Alert on sustained p95 latency regressions before they reach users"],
        ),
        InvestigationType::Availability => (
            &["Add redundancy or graceful degradation for the failing path"],
            &["Alert on failed-request rate and availability test failures"],
        ),
        InvestigationType::DataQuality => (
            &["Introduce schema and completeness checks in the ingestion pipeline"],
            &["Alert on ingestion volume gaps and null-rate changes"],
        ),
        InvestigationType::Dependencies => (
            &["Add timeouts, retries with backoff and circuit breaking for unstable dependencies"],
            &["Monitor dependency failure rate and duration per target"],
        ),
    };
    // Catalogue items only make sense once something actionable was found
    if !recs.immediate.is_empty() || !recs.short_term.is_empty() {
        recs.long_term.extend(long_term.iter().map(|s| s.to_string()));
        recs.prevention.extend(prevention.iter().map(|s| s.to_string()));
    }
    recs
}

pub fn summarize(
    plan: &InvestigationPlan,
    context: &InvestigationContext,
    root_cause: &RootCauseAnalysis,
) -> String {
    let progress = &context.progress;
    format!(
        "Investigation of \"{}\" ({}) completed {} of {} phase(s), running {} of {} queries \
         ({} failed, {} skipped). Primary cause: {} (confidence {:.0}%).",
        plan.problem.description.trim(),
        plan.detected_type,
        progress.completed_phases,
        progress.total_phases,
        progress.completed_queries,
        progress.total_queries,
        progress.failed_queries,
        progress.skipped_queries,
        root_cause.primary_cause.description,
        root_cause.primary_cause.confidence * 100.0
    )
}

/// Build the terminal result. Runs once, when no phases remain.
pub fn synthesize_result(
    id: &str,
    plan: &InvestigationPlan,
    context: &InvestigationContext,
    completed_at: DateTime<Utc>,
) -> InvestigationResult {
    let root_cause_analysis = analyze_root_cause(plan, &context.evidence);
    let recommendations = recommend(plan, &context.evidence);
    let summary = summarize(plan, context, &root_cause_analysis);
    let total_execution_time = (completed_at - context.started_at)
        .num_milliseconds()
        .max(0) as u64;

    InvestigationResult {
        id: id.to_string(),
        context: context.clone(),
        plan: plan.clone(),
        evidence: context.evidence.clone(),
        root_cause_analysis,
        recommendations,
        summary,
        completed_at,
        total_execution_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{Column, QueryResult};
    use crate::investigation::types::{
        InvestigationPhase, InvestigationProblem, InvestigationProgress, InvestigationQuery,
        InvestigationStatus, PhasePriority, Provenance,
    };
    use chrono::Duration;
    use serde_json::json;

    fn plan() -> InvestigationPlan {
        let query = |id: &str, confidence: f32| InvestigationQuery {
            id: id.into(),
            purpose: format!("purpose {}", id),
            query: "requests | take 10".into(),
            expected_outcome: String::new(),
            confidence,
            required: false,
        };
        InvestigationPlan {
            id: "plan-1".into(),
            problem: InvestigationProblem::new("checkout is slow")
                .with_severity(Severity::High)
                .with_services(["checkout"]),
            detected_type: InvestigationType::Performance,
            phases: vec![InvestigationPhase {
                id: "phase-1".into(),
                name: "Baseline".into(),
                description: String::new(),
                queries: vec![query("q1", 0.7), query("q2", 0.9), query("q3", 0.4)],
                priority: PhasePriority::High,
                estimated_time: None,
                dependencies: vec![],
            }],
            estimated_total_time: 180,
            confidence: 0.6,
            reasoning: String::new(),
            created_at: Utc::now(),
            provenance: Provenance::AiDerived,
        }
    }

    fn evidence(
        id: &str,
        query_id: &str,
        significance: Significance,
        offset_secs: i64,
    ) -> InvestigationEvidence {
        InvestigationEvidence {
            id: id.into(),
            phase_id: "phase-1".into(),
            query_id: query_id.into(),
            result: QueryResult {
                columns: vec![Column {
                    name: "cloud_RoleName".into(),
                    data_type: "string".into(),
                }],
                rows: vec![vec![json!("payments")], vec![json!("checkout")]],
                execution_time_ms: 3,
            },
            analysis_result: None,
            significance,
            summary: format!("finding {}", id),
            collected_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn no_critical_evidence_yields_low_confidence_cause() {
        let plan = plan();
        let ev = vec![evidence("e1", "q1", Significance::Informational, 0)];
        let rca = analyze_root_cause(&plan, &ev);
        assert_eq!(rca.primary_cause.category, "unknown");
        assert!(rca.primary_cause.confidence < 0.5);
        assert!(rca.primary_cause.supporting_evidence.is_empty());
        assert_eq!(rca.affected_components, vec!["checkout".to_string()]);
    }

    #[test]
    fn critical_evidence_drives_primary_cause() {
        let plan = plan();
        let ev = vec![
            evidence("e1", "q1", Significance::Critical, 0),
            evidence("e2", "q2", Significance::Critical, 1),
            evidence("e3", "q3", Significance::Important, 2),
        ];
        let rca = analyze_root_cause(&plan, &ev);
        assert_eq!(rca.primary_cause.supporting_evidence, vec!["e1", "e2"]);
        assert!((rca.primary_cause.confidence - 0.9).abs() < 1e-6);
        assert_eq!(rca.primary_cause.category, "performance");
        assert_eq!(rca.contributing_factors.len(), 1);
        assert_eq!(rca.contributing_factors[0].evidence_id, "e3");
        assert_eq!(
            rca.affected_components,
            vec!["checkout".to_string(), "payments".to_string()]
        );
        assert!(rca.business_impact.starts_with("High severity"));
    }

    #[test]
    fn timeline_is_sorted_by_collection_time() {
        let plan = plan();
        let ev = vec![
            evidence("late", "q2", Significance::Informational, 30),
            evidence("early", "q1", Significance::Informational, -30),
        ];
        let rca = analyze_root_cause(&plan, &ev);
        let ids: Vec<&str> = rca.timeline.iter().map(|t| t.evidence_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn recommendations_follow_significance() {
        let plan = plan();
        let quiet = recommend(&plan, &[evidence("e1", "q1", Significance::Informational, 0)]);
        assert_eq!(quiet, InvestigationRecommendations::default());

        let loud = recommend(
            &plan,
            &[
                evidence("e1", "q1", Significance::Critical, 0),
                evidence("e2", "q2", Significance::Important, 1),
            ],
        );
        assert_eq!(loud.immediate.len(), 1);
        assert_eq!(loud.short_term.len(), 1);
        assert!(!loud.long_term.is_empty());
        assert!(!loud.prevention.is_empty());
    }

    #[test]
    fn result_carries_summary_and_execution_time() {
        let plan = plan();
        let started_at = Utc::now() - Duration::seconds(5);
        let mut progress = InvestigationProgress::for_plan(&plan);
        progress.completed_phases = 1;
        progress.completed_queries = 1;
        progress.current_status = InvestigationStatus::InProgress;
        let context = InvestigationContext {
            plan_id: plan.id.clone(),
            session_id: "s".into(),
            current_phase_id: None,
            current_query_id: None,
            evidence: vec![evidence("e1", "q1", Significance::Critical, 0)],
            progress,
            started_at,
            last_updated_at: started_at,
        };
        let result = synthesize_result(&plan.id, &plan, &context, Utc::now());
        assert!(result.summary.contains("checkout is slow"));
        assert!(result.summary.contains("1 of 1 phase"));
        assert!(result.total_execution_time >= 5000);
        assert_eq!(result.evidence.len(), 1);
    }
}
