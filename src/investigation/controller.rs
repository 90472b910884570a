//! Investigation lifecycle: start, drive phase by phase, pause/resume/cancel, finish.
//!
//! Every mutating operation on an id runs under that id's lock, so two concurrent
//! `continue_investigation` calls can never double-advance a record. Different ids
//! proceed independently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::clients::{AiProvider, DataSourceProvider, ProviderError, SessionManager, SessionOptions};
use crate::config::Config;
use crate::error::{InvestigationError, Result};
use crate::investigation::classifier::Classifier;
use crate::investigation::executor::{PhaseExecutor, RowCountSignificance, SignificancePolicy};
use crate::investigation::export::export_result;
use crate::investigation::planner::PlanGenerator;
use crate::investigation::store::InvestigationRepository;
use crate::investigation::synthesis::synthesize_result;
use crate::investigation::types::{
    ExportFormat, ExportedInvestigation, InvestigationContext, InvestigationOptions,
    InvestigationPlan, InvestigationProblem, InvestigationProgress, InvestigationRecord,
    InvestigationResponse, InvestigationResult, InvestigationStatus, NextAction, NextActionKind,
};
use crate::investigation::validator::{PlanValidation, PlanValidator};

pub struct InvestigationController {
    repo: Arc<dyn InvestigationRepository>,
    ai: Arc<dyn AiProvider>,
    data_source: Arc<dyn DataSourceProvider>,
    sessions: Arc<dyn SessionManager>,
    classifier: Classifier,
    planner: PlanGenerator,
    executor: PhaseExecutor,
    validator: PlanValidator,
    locks: DashMap<String, Arc<Mutex<()>>>,
    default_language: String,
    default_max_execution_secs: Option<u64>,
}

impl InvestigationController {
    pub fn new(
        repo: Arc<dyn InvestigationRepository>,
        ai: Arc<dyn AiProvider>,
        data_source: Arc<dyn DataSourceProvider>,
        sessions: Arc<dyn SessionManager>,
    ) -> Self {
        Self::from_config(&Config::default(), repo, ai, data_source, sessions)
    }

    pub fn from_config(
        config: &Config,
        repo: Arc<dyn InvestigationRepository>,
        ai: Arc<dyn AiProvider>,
        data_source: Arc<dyn DataSourceProvider>,
        sessions: Arc<dyn SessionManager>,
    ) -> Self {
        let policy: Arc<dyn SignificancePolicy> =
            Arc::new(RowCountSignificance::from_config(&config.investigation));
        Self {
            classifier: Classifier::new(ai.clone()),
            planner: PlanGenerator::new(ai.clone()),
            executor: PhaseExecutor::new(data_source.clone(), ai.clone(), policy),
            validator: PlanValidator::new(config.investigation.advisory_max_plan_seconds),
            locks: DashMap::new(),
            default_language: config.investigation.default_language.clone(),
            default_max_execution_secs: config.investigation.default_max_execution_secs,
            repo,
            ai,
            data_source,
            sessions,
        }
    }

    /// Replace the evidence significance policy.
    pub fn with_significance_policy(mut self, policy: Arc<dyn SignificancePolicy>) -> Self {
        self.executor = PhaseExecutor::new(self.data_source.clone(), self.ai.clone(), policy);
        self
    }

    /// Classify (if needed), plan and register a new investigation. No phase runs yet.
    pub async fn start_investigation(
        &self,
        problem: InvestigationProblem,
        options: InvestigationOptions,
    ) -> Result<InvestigationResponse> {
        if let Some(existing) = options.resume_from_id.as_deref() {
            return self.existing_state(existing).await;
        }
        if problem.description.trim().is_empty() {
            return Err(InvestigationError::Validation {
                message: "problem description must not be empty".to_string(),
            });
        }

        let mut options = options;
        if options.language.trim().is_empty() {
            options.language = self.default_language.clone();
        }
        if options.max_execution_time.is_none() {
            options.max_execution_time = self.default_max_execution_secs;
        }

        let investigation_type = match problem.investigation_type {
            Some(t) => t,
            None => {
                self.classifier
                    .classify(&problem.description, &options.language)
                    .await
                    .investigation_type
            }
        };
        let plan = self
            .planner
            .generate(problem, investigation_type, &options.language)
            .await;
        let id = plan.id.clone();

        let session_id = self
            .sessions
            .create_session(SessionOptions {
                investigation_id: id.clone(),
                language: options.language.clone(),
                interactive: options.interactive,
            })
            .await
            .map_err(session_error)?;

        let now = Utc::now();
        let record = InvestigationRecord {
            id: id.clone(),
            context: InvestigationContext {
                plan_id: plan.id.clone(),
                session_id: session_id.clone(),
                current_phase_id: None,
                current_query_id: None,
                evidence: Vec::new(),
                progress: InvestigationProgress::for_plan(&plan),
                started_at: now,
                last_updated_at: now,
            },
            plan,
            options,
            operator_notes: Vec::new(),
            last_error: None,
            query_outcomes: Default::default(),
            version: 0,
        };

        if let Err(e) = self.repo.insert_record(record.clone()).await {
            self.close_session(&id, &session_id).await;
            return Err(e);
        }

        tracing::info!(
            investigation_id = %id,
            investigation_type = %record.plan.detected_type,
            phases = record.context.progress.total_phases,
            queries = record.context.progress.total_queries,
            "investigation started"
        );

        let next_action = if record.options.interactive && !record.options.skip_confirmation {
            NextAction::new(
                NextActionKind::Confirm,
                "Review the investigation plan and confirm to start the first phase",
            )
        } else {
            NextAction::new(
                NextActionKind::Wait,
                "Plan ready; call continue to execute the first phase",
            )
        };
        Ok(InvestigationResponse {
            investigation_id: id,
            status: record.status(),
            plan: Some(record.plan),
            progress: Some(record.context.progress),
            result: None,
            next_action: Some(next_action),
        })
    }

    /// Execute the next phase, or synthesize the result when none remains.
    pub async fn continue_investigation(
        &self,
        id: &str,
        input: Option<String>,
    ) -> Result<InvestigationResponse> {
        let lock = self.lock_for(id);
        let outcome = {
            let _guard = lock.lock().await;
            self.advance(id, input).await
        };
        self.release_lock(id, lock);
        outcome
    }

    pub async fn get_investigation_status(&self, id: &str) -> Result<InvestigationResponse> {
        if let Some(result) = self.repo.get_result(id).await? {
            return Ok(completed_response(result, None));
        }
        let record = self.require_record(id).await?;
        Ok(InvestigationResponse {
            investigation_id: record.id,
            status: record.context.progress.current_status,
            plan: None,
            progress: Some(record.context.progress),
            result: None,
            next_action: None,
        })
    }

    /// Stop the investigation at the next phase boundary. A running phase finishes first.
    pub async fn pause_investigation(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id);
        let outcome = {
            let _guard = lock.lock().await;
            self.pause_locked(id).await
        };
        self.release_lock(id, lock);
        outcome
    }

    async fn pause_locked(&self, id: &str) -> Result<()> {
        let mut record = self.require_record(id).await?;
        match record.status() {
            InvestigationStatus::Paused => return Ok(()),
            status if status.is_terminal() => {
                return Err(InvestigationError::Validation {
                    message: format!("investigation {} is {:?} and cannot be paused", id, status),
                });
            }
            _ => {}
        }
        record.context.progress.current_status = InvestigationStatus::Paused;
        record.context.last_updated_at = Utc::now();
        self.repo.update_record(record).await?;
        tracing::info!(investigation_id = %id, "investigation paused");
        Ok(())
    }

    /// Return a paused investigation to in-progress and run its next phase.
    pub async fn resume_investigation(&self, id: &str) -> Result<InvestigationResponse> {
        let lock = self.lock_for(id);
        let outcome = {
            let _guard = lock.lock().await;
            self.resume_locked(id).await
        };
        self.release_lock(id, lock);
        outcome
    }

    async fn resume_locked(&self, id: &str) -> Result<InvestigationResponse> {
        let mut record = self.require_record(id).await?;
        if record.status() == InvestigationStatus::Paused {
            record.context.progress.current_status = InvestigationStatus::InProgress;
            record.context.last_updated_at = Utc::now();
            self.repo.update_record(record).await?;
            tracing::info!(investigation_id = %id, "investigation resumed");
        }
        self.advance(id, None).await
    }

    /// Abandon and delete a live investigation. Irreversible.
    pub async fn cancel_investigation(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id);
        let outcome = {
            let _guard = lock.lock().await;
            self.cancel_locked(id).await
        };
        self.release_lock(id, lock);
        outcome
    }

    async fn cancel_locked(&self, id: &str) -> Result<()> {
        let mut record = self.require_record(id).await?;
        record.context.progress.current_status = InvestigationStatus::Failed;
        self.close_session(id, &record.context.session_id).await;
        self.repo.delete_record(id).await?;
        tracing::info!(
            investigation_id = %id,
            completed_phases = record.context.progress.completed_phases,
            "investigation cancelled"
        );
        Ok(())
    }

    pub async fn get_investigation_history(&self) -> Result<Vec<InvestigationResult>> {
        self.repo.list_results().await
    }

    pub async fn export_investigation(
        &self,
        id: &str,
        format: ExportFormat,
    ) -> Result<ExportedInvestigation> {
        let result = self
            .repo
            .get_result(id)
            .await?
            .ok_or_else(|| InvestigationError::ResultNotFound { id: id.to_string() })?;
        export_result(&result, format)
    }

    /// Structural pre-flight check; never invoked implicitly.
    pub fn validate_plan(&self, plan: &InvestigationPlan) -> PlanValidation {
        self.validator.validate(plan)
    }

    /// Number of per-id locks currently tracked.
    ///
    /// Entries only live while a call holds or waits on them.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drop the map entry once no other caller holds or waits on it.
    fn release_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        // Our clone plus the map's own reference
        self.locks
            .remove_if(id, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    async fn require_record(&self, id: &str) -> Result<InvestigationRecord> {
        self.repo
            .get_record(id)
            .await?
            .ok_or_else(|| InvestigationError::NotFound { id: id.to_string() })
    }

    async fn existing_state(&self, id: &str) -> Result<InvestigationResponse> {
        if let Some(result) = self.repo.get_result(id).await? {
            return Ok(completed_response(
                result,
                Some(NextAction::new(
                    NextActionKind::Complete,
                    "Investigation already completed",
                )),
            ));
        }
        let record = self.require_record(id).await?;
        let next_action = match record.status() {
            InvestigationStatus::Paused => NextAction::new(
                NextActionKind::Continue,
                "Investigation is paused; resume it to run the next phase",
            ),
            InvestigationStatus::Failed => NextAction::new(
                NextActionKind::Wait,
                record
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "Investigation failed".to_string()),
            ),
            _ => continue_hint(&record),
        };
        Ok(InvestigationResponse {
            investigation_id: record.id,
            status: record.context.progress.current_status,
            plan: Some(record.plan),
            progress: Some(record.context.progress),
            result: None,
            next_action: Some(next_action),
        })
    }

    /// Caller must hold the id's lock.
    async fn advance(&self, id: &str, input: Option<String>) -> Result<InvestigationResponse> {
        let Some(mut record) = self.repo.get_record(id).await? else {
            // Another caller may have finished it while we waited on the lock
            if let Some(result) = self.repo.get_result(id).await? {
                return Ok(completed_response(
                    result,
                    Some(NextAction::new(
                        NextActionKind::Complete,
                        "Investigation already completed",
                    )),
                ));
            }
            return Err(InvestigationError::NotFound { id: id.to_string() });
        };

        match record.status() {
            InvestigationStatus::Paused => {
                return Err(InvestigationError::Paused { id: id.to_string() });
            }
            status if status.is_terminal() => {
                return Err(InvestigationError::Validation {
                    message: format!(
                        "investigation {} is {:?} and cannot continue",
                        id, status
                    ),
                });
            }
            _ => {}
        }

        if let Some(note) = input.map(|s| s.trim().to_string())
            && !note.is_empty()
        {
            record.operator_notes.push(note);
        }
        if record.status() == InvestigationStatus::Created {
            record.context.progress.current_status = InvestigationStatus::InProgress;
        }

        let Some(phase) = record.next_phase().cloned() else {
            return self.complete(record).await;
        };

        let outcome = match self.remaining_budget(&record) {
            Some(budget) if budget.is_zero() => return self.expire(record).await,
            Some(budget) => {
                let timed =
                    tokio::time::timeout(budget, self.executor.execute_phase(&mut record, &phase))
                        .await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => return self.expire(record).await,
                }
            }
            None => self.executor.execute_phase(&mut record, &phase).await,
        };

        match outcome {
            Ok(report) => {
                let progress = &mut record.context.progress;
                progress.completed_phases += 1;
                progress.recompute_percentage();
                record.context.current_phase_id = None;
                record.context.last_updated_at = Utc::now();
                record.last_error = None;
                tracing::info!(
                    investigation_id = %id,
                    phase_id = %report.phase_id,
                    completed = report.completed,
                    failed = report.failed,
                    evidence_ids = ?report.evidence_ids,
                    "phase completed ({}/{})",
                    record.context.progress.completed_phases,
                    record.context.progress.total_phases
                );

                if record.next_phase().is_none() {
                    return self.complete(record).await;
                }
                let record = self.repo.update_record(record).await?;
                let next_action = continue_hint(&record);
                Ok(InvestigationResponse {
                    investigation_id: record.id,
                    status: record.context.progress.current_status,
                    plan: None,
                    progress: Some(record.context.progress),
                    result: None,
                    next_action: Some(next_action),
                })
            }
            Err(err) => {
                // Keep the partial progress so a retry starts from the same phase
                record.last_error = Some(err.to_string());
                record.context.last_updated_at = Utc::now();
                if let Err(persist_err) = self.repo.update_record(record).await {
                    tracing::error!(
                        investigation_id = %id,
                        "failed to persist investigation after phase error: {}",
                        persist_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Time left under `maxExecutionTime`, measured from the start.
    fn remaining_budget(&self, record: &InvestigationRecord) -> Option<Duration> {
        let limit_secs = record.options.max_execution_time?;
        let elapsed = (Utc::now() - record.context.started_at)
            .to_std()
            .unwrap_or_default();
        Some(Duration::from_secs(limit_secs).saturating_sub(elapsed))
    }

    async fn expire(&self, mut record: InvestigationRecord) -> Result<InvestigationResponse> {
        let timeout_ms = record.options.max_execution_time.unwrap_or_default() * 1000;
        let err = InvestigationError::Timeout {
            operation: format!("investigation {}", record.id),
            timeout_ms,
        };
        tracing::error!(investigation_id = %record.id, timeout_ms, "investigation deadline exceeded");

        record.context.progress.current_status = InvestigationStatus::Failed;
        record.context.current_query_id = None;
        record.context.last_updated_at = Utc::now();
        record.last_error = Some(err.to_string());
        self.close_session(&record.id, &record.context.session_id)
            .await;
        self.repo.update_record(record).await?;
        Err(err)
    }

    async fn complete(&self, mut record: InvestigationRecord) -> Result<InvestigationResponse> {
        let completed_at = Utc::now();
        let progress = &mut record.context.progress;
        progress.current_status = InvestigationStatus::Completed;
        progress.completion_percentage = 100.0;
        record.context.current_phase_id = None;
        record.context.current_query_id = None;
        record.context.last_updated_at = completed_at;

        let result = synthesize_result(&record.id, &record.plan, &record.context, completed_at);
        self.close_session(&record.id, &record.context.session_id)
            .await;
        self.repo.put_result(result.clone()).await?;
        self.repo.delete_record(&record.id).await?;

        tracing::info!(
            investigation_id = %record.id,
            evidence = result.evidence.len(),
            total_execution_ms = result.total_execution_time,
            "investigation completed"
        );
        Ok(completed_response(
            result,
            Some(NextAction::new(
                NextActionKind::Complete,
                "Investigation complete; export the report for details",
            )),
        ))
    }

    /// Session teardown never fails the investigation.
    async fn close_session(&self, id: &str, session_id: &str) {
        if let Err(e) = self.sessions.end_session(session_id).await {
            tracing::warn!(investigation_id = %id, session_id, "failed to end session: {}", e);
        }
    }
}

fn completed_response(
    result: InvestigationResult,
    next_action: Option<NextAction>,
) -> InvestigationResponse {
    InvestigationResponse {
        investigation_id: result.id.clone(),
        status: InvestigationStatus::Completed,
        plan: None,
        progress: None,
        result: Some(result),
        next_action,
    }
}

fn continue_hint(record: &InvestigationRecord) -> NextAction {
    match record.next_phase() {
        Some(phase) => NextAction::new(
            NextActionKind::Continue,
            format!("Continue to run phase '{}'", phase.name),
        ),
        None => NextAction::new(
            NextActionKind::Continue,
            "All phases done; continue to synthesize the report",
        ),
    }
}

fn session_error(err: ProviderError) -> InvestigationError {
    InvestigationError::Session {
        message: err.to_string(),
    }
}
