//! Phase execution: one phase's queries, strictly in order, each turned into evidence.

use std::sync::Arc;

use chrono::Utc;

use crate::clients::{
    AiProvider, AnalysisRequest, AnalysisResult, AnalysisType, DataSourceProvider, QueryResult,
};
use crate::error::{InvestigationError, Result};
use crate::investigation::types::{
    InvestigationEvidence, InvestigationPhase, InvestigationQuery, InvestigationRecord,
    QueryOutcome, Significance,
};

/// Decides how much a piece of evidence matters.
pub trait SignificancePolicy: Send + Sync {
    fn assess(
        &self,
        query: &InvestigationQuery,
        result: &QueryResult,
        analysis: Option<&AnalysisResult>,
    ) -> Significance;
}

/// Row-count thresholds: more than `critical_above` rows is critical, more than
/// `important_above` is important, anything else (including empty) informational.
#[derive(Debug, Clone)]
pub struct RowCountSignificance {
    pub critical_above: usize,
    pub important_above: usize,
}

impl Default for RowCountSignificance {
    fn default() -> Self {
        Self {
            critical_above: 1000,
            important_above: 100,
        }
    }
}

impl RowCountSignificance {
    pub fn from_config(cfg: &crate::config::InvestigationConfig) -> Self {
        Self {
            critical_above: cfg.critical_row_threshold,
            important_above: cfg.important_row_threshold,
        }
    }
}

impl SignificancePolicy for RowCountSignificance {
    fn assess(
        &self,
        _query: &InvestigationQuery,
        result: &QueryResult,
        _analysis: Option<&AnalysisResult>,
    ) -> Significance {
        let rows = result.row_count();
        if rows > self.critical_above {
            Significance::Critical
        } else if rows > self.important_above {
            Significance::Important
        } else {
            Significance::Informational
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub phase_id: String,
    pub completed: usize,
    pub failed: usize,
    pub evidence_ids: Vec<String>,
}

pub struct PhaseExecutor {
    data_source: Arc<dyn DataSourceProvider>,
    ai: Arc<dyn AiProvider>,
    policy: Arc<dyn SignificancePolicy>,
}

impl PhaseExecutor {
    pub fn new(
        data_source: Arc<dyn DataSourceProvider>,
        ai: Arc<dyn AiProvider>,
        policy: Arc<dyn SignificancePolicy>,
    ) -> Self {
        Self {
            data_source,
            ai,
            policy,
        }
    }

    /// Run every query of `phase` against `record`, mutating its progress and evidence.
    ///
    /// A failed required query stops the phase and returns `RequiredQueryFailed`; the
    /// counters gathered so far stay on the record. Outcomes of an earlier attempt at the
    /// same phase are discarded first so a retry never double-counts.
    pub async fn execute_phase(
        &self,
        record: &mut InvestigationRecord,
        phase: &InvestigationPhase,
    ) -> Result<PhaseReport> {
        rollback_phase(record, phase);
        record.context.current_phase_id = Some(phase.id.clone());

        let notes = if record.operator_notes.is_empty() {
            None
        } else {
            Some(record.operator_notes.join("\n"))
        };
        let mut report = PhaseReport {
            phase_id: phase.id.clone(),
            completed: 0,
            failed: 0,
            evidence_ids: Vec::new(),
        };

        tracing::info!(
            investigation_id = %record.id,
            phase_id = %phase.id,
            queries = phase.queries.len(),
            "executing phase '{}'",
            phase.name
        );

        for (idx, query) in phase.queries.iter().enumerate() {
            record.context.current_query_id = Some(query.id.clone());
            match self.run_query(phase, query, notes.clone()).await {
                Ok((result, analysis)) => {
                    let evidence = self.build_evidence(record, phase, query, result, analysis);
                    report.evidence_ids.push(evidence.id.clone());
                    report.completed += 1;
                    record.context.evidence.push(evidence);
                    record.context.progress.completed_queries += 1;
                    record
                        .query_outcomes
                        .insert(query.id.clone(), QueryOutcome::Completed);
                }
                Err(err) => {
                    report.failed += 1;
                    record.context.progress.failed_queries += 1;
                    record
                        .query_outcomes
                        .insert(query.id.clone(), QueryOutcome::Failed);

                    if query.required {
                        tracing::error!(
                            investigation_id = %record.id,
                            query_id = %query.id,
                            error = %err,
                            "required query failed, aborting investigation"
                        );
                        for rest in &phase.queries[idx + 1..] {
                            record.context.progress.skipped_queries += 1;
                            record
                                .query_outcomes
                                .insert(rest.id.clone(), QueryOutcome::Skipped);
                        }
                        record.context.last_updated_at = Utc::now();
                        return Err(InvestigationError::RequiredQueryFailed {
                            query_id: query.id.clone(),
                            message: err.to_string(),
                        });
                    }
                    tracing::warn!(
                        investigation_id = %record.id,
                        query_id = %query.id,
                        error = %err,
                        "optional query failed, continuing phase"
                    );
                }
            }
        }

        record.context.current_query_id = None;
        record.context.last_updated_at = Utc::now();
        Ok(report)
    }

    async fn run_query(
        &self,
        phase: &InvestigationPhase,
        query: &InvestigationQuery,
        context: Option<String>,
    ) -> Result<(QueryResult, Option<AnalysisResult>)> {
        tracing::debug!(phase_id = %phase.id, query_id = %query.id, "executing query");
        let result = self
            .data_source
            .execute_query(&query.query)
            .await
            .map_err(|e| InvestigationError::QueryFailed {
                query_id: query.id.clone(),
                message: e.to_string(),
            })?;

        let analysis = self
            .ai
            .analyze_query_result(AnalysisRequest {
                result: result.clone(),
                original_query: query.query.clone(),
                analysis_type: AnalysisType::Insights,
                context,
            })
            .await
            .map_err(|e| InvestigationError::AiProvider {
                message: format!("analysis of {} failed: {}", query.id, e),
            })?;

        Ok((result, Some(analysis)))
    }

    fn build_evidence(
        &self,
        record: &InvestigationRecord,
        phase: &InvestigationPhase,
        query: &InvestigationQuery,
        result: QueryResult,
        analysis: Option<AnalysisResult>,
    ) -> InvestigationEvidence {
        let significance = self.policy.assess(query, &result, analysis.as_ref());
        let summary = analysis
            .as_ref()
            .and_then(AnalysisResult::headline)
            .unwrap_or_else(|| {
                if result.is_empty() {
                    format!("{}: no rows returned", query.purpose)
                } else {
                    format!("{}: {} rows returned", query.purpose, result.row_count())
                }
            });

        // collectedAt never goes backwards within the evidence list
        let now = Utc::now();
        let collected_at = record
            .context
            .evidence
            .last()
            .map(|e| e.collected_at.max(now))
            .unwrap_or(now);

        InvestigationEvidence {
            id: uuid::Uuid::new_v4().to_string(),
            phase_id: phase.id.clone(),
            query_id: query.id.clone(),
            result,
            analysis_result: analysis,
            significance,
            summary,
            collected_at,
        }
    }
}

/// Undo the counters and evidence of a previous attempt at `phase`.
fn rollback_phase(record: &mut InvestigationRecord, phase: &InvestigationPhase) {
    let progress = &mut record.context.progress;
    for query in &phase.queries {
        match record.query_outcomes.remove(&query.id) {
            Some(QueryOutcome::Completed) => {
                progress.completed_queries = progress.completed_queries.saturating_sub(1)
            }
            Some(QueryOutcome::Failed) => {
                progress.failed_queries = progress.failed_queries.saturating_sub(1)
            }
            Some(QueryOutcome::Skipped) => {
                progress.skipped_queries = progress.skipped_queries.saturating_sub(1)
            }
            None => {}
        }
    }
    record.context.evidence.retain(|e| e.phase_id != phase.id);
}
