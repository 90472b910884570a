//! Data model for investigations: problems, plans, live state, evidence and results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::{AnalysisResult, QueryResult};

/// The four families of investigation the engine knows how to plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvestigationType {
    Performance,
    Availability,
    DataQuality,
    Dependencies,
}

impl InvestigationType {
    pub const ALL: [InvestigationType; 4] = [
        InvestigationType::Performance,
        InvestigationType::Availability,
        InvestigationType::DataQuality,
        InvestigationType::Dependencies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationType::Performance => "performance",
            InvestigationType::Availability => "availability",
            InvestigationType::DataQuality => "data-quality",
            InvestigationType::Dependencies => "dependencies",
        }
    }

    /// Lenient parse accepting `data-quality`, `data_quality` and `DataQuality`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "performance" => Some(InvestigationType::Performance),
            "availability" => Some(InvestigationType::Availability),
            "dataquality" => Some(InvestigationType::DataQuality),
            "dependencies" | "dependency" => Some(InvestigationType::Dependencies),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvestigationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationProblem {
    pub description: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub investigation_type: Option<InvestigationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub affected_services: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InvestigationProblem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            investigation_type: None,
            severity: None,
            time_range: None,
            affected_services: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_type(mut self, investigation_type: InvestigationType) -> Self {
        self.investigation_type = Some(investigation_type);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_services = services.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationQuery {
    pub id: String,
    pub purpose: String,
    pub query: String,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Failure of a required query aborts the investigation
    #[serde(default)]
    pub required: bool,
}

fn default_confidence() -> f32 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhasePriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationPhase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub queries: Vec<InvestigationQuery>,
    pub priority: PhasePriority,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Where a classification or plan came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    AiDerived,
    #[default]
    Default,
}

/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationPlan {
    pub id: String,
    pub problem: InvestigationProblem,
    pub detected_type: InvestigationType,
    pub phases: Vec<InvestigationPhase>,
    /// Seconds
    pub estimated_total_time: u64,
    pub confidence: f32,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    /// Hand-written plans carry none
    #[serde(default)]
    pub provenance: Provenance,
}

impl InvestigationPlan {
    pub fn total_queries(&self) -> usize {
        self.phases.iter().map(|p| p.queries.len()).sum()
    }

    pub fn phase(&self, phase_id: &str) -> Option<&InvestigationPhase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    pub fn query(&self, query_id: &str) -> Option<&InvestigationQuery> {
        self.phases
            .iter()
            .flat_map(|p| p.queries.iter())
            .find(|q| q.id == query_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvestigationStatus {
    Created,
    InProgress,
    Completed,
    Failed,
    Paused,
}

impl InvestigationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationProgress {
    pub total_phases: usize,
    pub completed_phases: usize,
    /// Fixed when the plan is created
    pub total_queries: usize,
    pub completed_queries: usize,
    pub failed_queries: usize,
    pub skipped_queries: usize,
    pub current_status: InvestigationStatus,
    pub completion_percentage: f64,
}

impl InvestigationProgress {
    pub fn for_plan(plan: &InvestigationPlan) -> Self {
        Self {
            total_phases: plan.phases.len(),
            completed_phases: 0,
            total_queries: plan.total_queries(),
            completed_queries: 0,
            failed_queries: 0,
            skipped_queries: 0,
            current_status: InvestigationStatus::Created,
            completion_percentage: 0.0,
        }
    }

    /// Phase-granular percentage.
    pub fn recompute_percentage(&mut self) {
        self.completion_percentage = if self.total_phases == 0 {
            100.0
        } else {
            self.completed_phases as f64 / self.total_phases as f64 * 100.0
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Informational,
    Important,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationEvidence {
    pub id: String,
    pub phase_id: String,
    pub query_id: String,
    pub result: QueryResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<AnalysisResult>,
    pub significance: Significance,
    pub summary: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationContext {
    pub plan_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_query_id: Option<String>,
    pub evidence: Vec<InvestigationEvidence>,
    pub progress: InvestigationProgress,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryCause {
    pub description: String,
    pub confidence: f32,
    pub supporting_evidence: Vec<String>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributingFactor {
    pub description: String,
    pub evidence_id: String,
    pub significance: Significance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub evidence_id: String,
    pub significance: Significance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCauseAnalysis {
    pub primary_cause: PrimaryCause,
    pub contributing_factors: Vec<ContributingFactor>,
    pub timeline: Vec<TimelineEvent>,
    pub affected_components: Vec<String>,
    pub business_impact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationRecommendations {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
    pub prevention: Vec<String>,
}

/// Terminal, stored separately from the live context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationResult {
    pub id: String,
    pub context: InvestigationContext,
    pub plan: InvestigationPlan,
    pub evidence: Vec<InvestigationEvidence>,
    pub root_cause_analysis: RootCauseAnalysis,
    pub recommendations: InvestigationRecommendations,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
    /// Milliseconds from start to completion
    pub total_execution_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationOptions {
    pub language: String,
    pub interactive: bool,
    /// Seconds; the whole investigation must finish within this budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from_id: Option<String>,
    pub skip_confirmation: bool,
}

impl Default for InvestigationOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            interactive: false,
            max_execution_time: None,
            resume_from_id: None,
            skip_confirmation: false,
        }
    }
}

/// Live investigation state as held by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationRecord {
    pub id: String,
    pub context: InvestigationContext,
    pub plan: InvestigationPlan,
    pub options: InvestigationOptions,
    #[serde(default)]
    pub operator_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Outcome per query id for the attempts counted in `context.progress`
    #[serde(default)]
    pub query_outcomes: BTreeMap<String, QueryOutcome>,
    /// Bumped on every write; used for optimistic concurrency
    pub version: u64,
}

impl InvestigationRecord {
    pub fn status(&self) -> InvestigationStatus {
        self.context.progress.current_status
    }

    pub fn next_phase(&self) -> Option<&InvestigationPhase> {
        self.plan
            .phases
            .get(self.context.progress.completed_phases)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOutcome {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextActionKind {
    Confirm,
    Continue,
    Wait,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub kind: NextActionKind,
    pub message: String,
}

impl NextAction {
    pub fn new(kind: NextActionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Shape returned by start/continue/resume/status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationResponse {
    pub investigation_id: String,
    pub status: InvestigationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<InvestigationPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<InvestigationProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<InvestigationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Html,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedInvestigation {
    pub content: String,
    pub filename: String,
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investigation_type_parse_is_lenient() {
        assert_eq!(
            InvestigationType::parse("data_quality"),
            Some(InvestigationType::DataQuality)
        );
        assert_eq!(
            InvestigationType::parse(" Performance "),
            Some(InvestigationType::Performance)
        );
        assert_eq!(InvestigationType::parse("latency"), None);
    }

    #[test]
    fn investigation_type_serializes_kebab_case() {
        let v = serde_json::to_value(InvestigationType::DataQuality).unwrap();
        assert_eq!(v, "data-quality");
    }

    #[test]
    fn percentage_is_phase_granular() {
        let mut progress = InvestigationProgress {
            total_phases: 3,
            completed_phases: 1,
            total_queries: 7,
            completed_queries: 5,
            failed_queries: 0,
            skipped_queries: 0,
            current_status: InvestigationStatus::InProgress,
            completion_percentage: 0.0,
        };
        progress.recompute_percentage();
        assert!((progress.completion_percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn plan_without_provenance_deserializes() {
        let raw = serde_json::json!({
            "id": "plan-1",
            "problem": {"description": "orders stuck"},
            "detectedType": "data-quality",
            "phases": [],
            "estimatedTotalTime": 60,
            "confidence": 0.6,
            "reasoning": "hand-written",
            "createdAt": "2026-01-01T00:00:00Z"
        });
        let plan: InvestigationPlan = serde_json::from_value(raw).unwrap();
        assert_eq!(plan.provenance, Provenance::Default);
        assert_eq!(plan.detected_type, InvestigationType::DataQuality);
    }

    #[test]
    fn export_format_from_str() {
        assert_eq!("MD".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
