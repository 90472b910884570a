//! Plan generation: AI-drafted phases with a deterministic single-phase fallback.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::clients::AiProvider;
use crate::investigation::prompts::{fallback_query, plan_prompt};
use crate::investigation::types::{
    InvestigationPhase, InvestigationPlan, InvestigationProblem, InvestigationQuery,
    InvestigationType, PhasePriority, Provenance,
};
use crate::utils::parse_json_object;

/// Per-query estimate when the AI gives none (seconds)
const DEFAULT_QUERY_SECONDS: u64 = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanDraft {
    #[serde(default)]
    phases: Vec<PhaseDraft>,
    #[serde(default)]
    estimated_total_time: Option<u64>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhaseDraft {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    estimated_time: Option<u64>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    queries: Vec<QueryDraft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryDraft {
    #[serde(default)]
    purpose: String,
    query: String,
    #[serde(default)]
    expected_outcome: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    required: bool,
}

/// The phases/estimate/confidence/reasoning portion of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutline {
    pub phases: Vec<InvestigationPhase>,
    pub estimated_total_time: u64,
    pub confidence: f32,
    pub reasoning: String,
    pub provenance: Provenance,
}

fn parse_priority(raw: Option<&str>) -> PhasePriority {
    match raw.map(|p| p.trim().to_ascii_lowercase()).as_deref() {
        Some("high") => PhasePriority::High,
        Some("low") => PhasePriority::Low,
        _ => PhasePriority::Medium,
    }
}

/// Parse the adapter's reply into an outline with freshly assigned phase/query ids.
pub fn parse_plan_outline(text: &str) -> Result<PlanOutline, String> {
    let draft: PlanDraft = parse_json_object(text)?;
    if draft.phases.is_empty() {
        return Err("plan has no phases".to_string());
    }

    let phases: Vec<InvestigationPhase> = draft
        .phases
        .into_iter()
        .enumerate()
        .map(|(pi, phase)| {
            let phase_id = format!("phase-{}", pi + 1);
            let queries = phase
                .queries
                .into_iter()
                .enumerate()
                .map(|(qi, q)| InvestigationQuery {
                    id: format!("{}-query-{}", phase_id, qi + 1),
                    purpose: q.purpose,
                    query: q.query,
                    expected_outcome: q.expected_outcome,
                    confidence: q.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                    required: q.required,
                })
                .collect();
            InvestigationPhase {
                id: phase_id,
                name: phase.name,
                description: phase.description,
                queries,
                priority: parse_priority(phase.priority.as_deref()),
                estimated_time: phase.estimated_time,
                dependencies: phase.dependencies,
            }
        })
        .collect();

    let estimated_total_time = draft.estimated_total_time.unwrap_or_else(|| {
        phases
            .iter()
            .map(|p| {
                p.estimated_time
                    .unwrap_or(p.queries.len() as u64 * DEFAULT_QUERY_SECONDS)
            })
            .sum()
    });

    Ok(PlanOutline {
        phases,
        estimated_total_time,
        confidence: draft.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        reasoning: draft.reasoning.unwrap_or_default(),
        provenance: Provenance::AiDerived,
    })
}

/// Single phase, single required recent-activity query for the given type.
pub fn fallback_outline(investigation_type: InvestigationType) -> PlanOutline {
    let (purpose, query) = fallback_query(investigation_type);
    PlanOutline {
        phases: vec![InvestigationPhase {
            id: "phase-1".to_string(),
            name: "Recent activity check".to_string(),
            description: format!(
                "Generic {} check over the last hour of telemetry",
                investigation_type
            ),
            queries: vec![InvestigationQuery {
                id: "phase-1-query-1".to_string(),
                purpose: purpose.to_string(),
                query: query.to_string(),
                expected_outcome: "Identify when and where the anomaly is visible".to_string(),
                confidence: 0.5,
                required: true,
            }],
            priority: PhasePriority::High,
            estimated_time: Some(DEFAULT_QUERY_SECONDS),
            dependencies: Vec::new(),
        }],
        estimated_total_time: DEFAULT_QUERY_SECONDS,
        confidence: 0.3,
        reasoning: format!(
            "plan generation failed, using default {} recent-activity check",
            investigation_type
        ),
        provenance: Provenance::Default,
    }
}

pub struct PlanGenerator {
    ai: Arc<dyn AiProvider>,
}

impl PlanGenerator {
    pub fn new(ai: Arc<dyn AiProvider>) -> Self {
        Self { ai }
    }

    /// Build a plan for a problem whose type is already resolved.
    pub async fn generate(
        &self,
        problem: InvestigationProblem,
        investigation_type: InvestigationType,
        language: &str,
    ) -> InvestigationPlan {
        let prompt = plan_prompt(&problem, investigation_type, language);
        let outline = match self.ai.generate_response(&prompt).await {
            Ok(reply) => parse_plan_outline(&reply).unwrap_or_else(|e| {
                tracing::warn!("plan output unparsable, using fallback plan: {}", e);
                fallback_outline(investigation_type)
            }),
            Err(e) => {
                tracing::warn!("plan generation call failed, using fallback plan: {}", e);
                fallback_outline(investigation_type)
            }
        };

        let mut problem = problem;
        problem.investigation_type = Some(investigation_type);
        InvestigationPlan {
            id: uuid::Uuid::new_v4().to_string(),
            problem,
            detected_type: investigation_type,
            phases: outline.phases,
            estimated_total_time: outline.estimated_total_time,
            confidence: outline.confidence,
            reasoning: outline.reasoning,
            created_at: Utc::now(),
            provenance: outline.provenance,
        }
    }
}
