//! Investigation repository: live records and terminal results.
//!
//! The controller owns the only handle. `InMemoryRepository` keeps everything in
//! process; a durable backend implements the same trait and honours the version
//! stamp on `update_record`.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{InvestigationError, Result};
use crate::investigation::types::{InvestigationRecord, InvestigationResult};

#[async_trait]
pub trait InvestigationRepository: Send + Sync {
    async fn get_record(&self, id: &str) -> Result<Option<InvestigationRecord>>;

    /// Insert a brand-new record; fails if the id is already taken.
    async fn insert_record(&self, record: InvestigationRecord) -> Result<()>;

    /// Replace a record whose `version` matches the stored one.
    /// Returns the stored record with its bumped version.
    async fn update_record(&self, record: InvestigationRecord) -> Result<InvestigationRecord>;

    async fn delete_record(&self, id: &str) -> Result<Option<InvestigationRecord>>;

    async fn get_result(&self, id: &str) -> Result<Option<InvestigationResult>>;

    /// Results are write-once.
    async fn put_result(&self, result: InvestigationResult) -> Result<()>;

    async fn list_results(&self) -> Result<Vec<InvestigationResult>>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<String, InvestigationRecord>,
    results: DashMap<String, InvestigationResult>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl InvestigationRepository for InMemoryRepository {
    async fn get_record(&self, id: &str) -> Result<Option<InvestigationRecord>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn insert_record(&self, record: InvestigationRecord) -> Result<()> {
        if self.results.contains_key(&record.id) {
            return Err(InvestigationError::Validation {
                message: format!("investigation id {} already completed", record.id),
            });
        }
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(InvestigationError::Validation {
                message: format!("investigation id {} already exists", record.id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn update_record(&self, mut record: InvestigationRecord) -> Result<InvestigationRecord> {
        let mut stored = self
            .records
            .get_mut(&record.id)
            .ok_or_else(|| InvestigationError::NotFound {
                id: record.id.clone(),
            })?;
        if stored.version != record.version {
            return Err(InvestigationError::Conflict {
                id: record.id.clone(),
                expected: record.version,
                found: stored.version,
            });
        }
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn delete_record(&self, id: &str) -> Result<Option<InvestigationRecord>> {
        Ok(self.records.remove(id).map(|(_, r)| r))
    }

    async fn get_result(&self, id: &str) -> Result<Option<InvestigationResult>> {
        Ok(self.results.get(id).map(|r| r.value().clone()))
    }

    async fn put_result(&self, result: InvestigationResult) -> Result<()> {
        match self.results.entry(result.id.clone()) {
            Entry::Occupied(_) => Err(InvestigationError::Validation {
                message: format!("result for {} is already stored", result.id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(result);
                Ok(())
            }
        }
    }

    async fn list_results(&self) -> Result<Vec<InvestigationResult>> {
        let mut results: Vec<InvestigationResult> =
            self.results.iter().map(|r| r.value().clone()).collect();
        results.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigation::planner::fallback_outline;
    use crate::investigation::synthesis::synthesize_result;
    use crate::investigation::types::{
        InvestigationContext, InvestigationOptions, InvestigationPlan, InvestigationProblem,
        InvestigationProgress, InvestigationType,
    };
    use chrono::Utc;

    fn record(id: &str) -> InvestigationRecord {
        let outline = fallback_outline(InvestigationType::Dependencies);
        let plan = InvestigationPlan {
            id: id.to_string(),
            problem: InvestigationProblem::new("upstream timeouts"),
            detected_type: InvestigationType::Dependencies,
            phases: outline.phases,
            estimated_total_time: outline.estimated_total_time,
            confidence: outline.confidence,
            reasoning: outline.reasoning,
            created_at: Utc::now(),
            provenance: outline.provenance,
        };
        InvestigationRecord {
            id: id.to_string(),
            context: InvestigationContext {
                plan_id: id.to_string(),
                session_id: "session".into(),
                current_phase_id: None,
                current_query_id: None,
                evidence: vec![],
                progress: InvestigationProgress::for_plan(&plan),
                started_at: Utc::now(),
                last_updated_at: Utc::now(),
            },
            plan,
            options: InvestigationOptions::default(),
            operator_notes: vec![],
            last_error: None,
            query_outcomes: Default::default(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let repo = InMemoryRepository::new();
        repo.insert_record(record("a")).await.unwrap();

        let first = repo.get_record("a").await.unwrap().unwrap();
        let stale = first.clone();
        let stored = repo.update_record(first).await.unwrap();
        assert_eq!(stored.version, 1);

        let err = repo.update_record(stale).await.unwrap_err();
        assert!(matches!(
            err,
            InvestigationError::Conflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let repo = InMemoryRepository::new();
        repo.insert_record(record("a")).await.unwrap();
        assert!(repo.insert_record(record("a")).await.is_err());
        assert_eq!(repo.live_count(), 1);
    }

    #[tokio::test]
    async fn update_of_deleted_record_is_not_found() {
        let repo = InMemoryRepository::new();
        repo.insert_record(record("a")).await.unwrap();
        let live = repo.delete_record("a").await.unwrap().unwrap();
        let err = repo.update_record(live).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn results_are_write_once() {
        let repo = InMemoryRepository::new();
        let rec = record("done");
        let result = synthesize_result(&rec.id, &rec.plan, &rec.context, Utc::now());
        repo.put_result(result.clone()).await.unwrap();
        assert!(repo.put_result(result).await.is_err());
        assert!(repo.insert_record(record("done")).await.is_err());
        assert_eq!(repo.list_results().await.unwrap().len(), 1);
    }
}
