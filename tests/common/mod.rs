//! Scripted collaborator fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use telemetry_investigator::clients::{
    AiProvider, AnalysisRequest, AnalysisResult, Column, DataSourceProvider,
    InMemorySessionManager, ProviderError, QueryResult,
};
use telemetry_investigator::investigation::prompts::CLASSIFICATION_INSTRUCTION;
use telemetry_investigator::investigation::{InMemoryRepository, InvestigationController};

/// AI fake: fixed replies for classification and planning, canned insights per query.
#[derive(Default)]
pub struct ScriptedAi {
    pub classification: Option<String>,
    pub plan: Option<String>,
    pub analysis_calls: AtomicUsize,
    pub contexts: Mutex<Vec<Option<String>>>,
    /// Query texts whose analysis returns an unparseable reply
    pub analysis_failures: HashSet<String>,
}

impl ScriptedAi {
    pub fn with_plan(plan: String) -> Self {
        Self {
            plan: Some(plan),
            ..Default::default()
        }
    }

    pub fn failing_analysis(mut self, query: &str) -> Self {
        self.analysis_failures.insert(query.to_string());
        self
    }

    pub fn analysis_count(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiProvider for ScriptedAi {
    async fn generate_response(&self, prompt: &str) -> Result<String, ProviderError> {
        let reply = if prompt.starts_with(CLASSIFICATION_INSTRUCTION) {
            &self.classification
        } else {
            &self.plan
        };
        reply.clone().ok_or(ProviderError::Unavailable)
    }

    async fn analyze_query_result(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, ProviderError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(request.context.clone());
        if self.analysis_failures.contains(&request.original_query) {
            return Err(ProviderError::Parse(format!(
                "no JSON in analysis of '{}'",
                request.original_query
            )));
        }
        Ok(AnalysisResult::Insights {
            insights: vec![format!("{} rows inspected", request.result.row_count())],
            summary: Some(format!("{} returned {} rows", request.original_query, request.result.row_count())),
        })
    }
}

/// Telemetry fake keyed by exact query text.
#[derive(Default)]
pub struct ScriptedDataSource {
    rows: HashMap<String, usize>,
    /// Remaining failures per query; `usize::MAX` fails forever
    failures: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(mut self, query: &str, count: usize) -> Self {
        self.rows.insert(query.to_string(), count);
        self
    }

    pub fn failing(self, query: &str) -> Self {
        self.failing_times(query, usize::MAX)
    }

    pub fn failing_times(self, query: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(query.to_string(), times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSourceProvider for ScriptedDataSource {
    async fn execute_query(&self, query: &str) -> Result<QueryResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(query)
                && *remaining > 0
            {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(ProviderError::Request(format!("backend rejected '{}'", query)));
            }
        }
        let count = self.rows.get(query).copied().unwrap_or(1);
        Ok(QueryResult {
            columns: vec![
                Column {
                    name: "cloud_RoleName".into(),
                    data_type: "string".into(),
                },
                Column {
                    name: "count".into(),
                    data_type: "long".into(),
                },
            ],
            rows: (0..count).map(|i| vec![json!("api-gateway"), json!(i)]).collect(),
            execution_time_ms: 2,
        })
    }
}

/// One query in a scripted plan: (query text, required)
pub type QuerySpec<'a> = (&'a str, bool);

/// AI plan reply with one entry per phase.
pub fn plan_json(phases: &[&[QuerySpec]]) -> String {
    let phases: Vec<_> = phases
        .iter()
        .enumerate()
        .map(|(i, queries)| {
            json!({
                "name": format!("Phase {}", i + 1),
                "description": "scripted",
                "priority": "high",
                "estimatedTime": 60,
                "queries": queries.iter().map(|(q, required)| json!({
                    "purpose": format!("check {}", q),
                    "query": q,
                    "expectedOutcome": "rows",
                    "confidence": 0.8,
                    "required": required,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "phases": phases,
        "estimatedTotalTime": 120,
        "confidence": 0.75,
        "reasoning": "scripted plan",
    })
    .to_string()
}

pub struct Harness {
    pub controller: Arc<InvestigationController>,
    pub ai: Arc<ScriptedAi>,
    pub data: Arc<ScriptedDataSource>,
    pub sessions: Arc<InMemorySessionManager>,
    pub repo: Arc<InMemoryRepository>,
}

pub fn harness(ai: ScriptedAi, data: ScriptedDataSource) -> Harness {
    let ai = Arc::new(ai);
    let data = Arc::new(data);
    let sessions = Arc::new(InMemorySessionManager::new());
    let repo = Arc::new(InMemoryRepository::new());
    let controller = InvestigationController::new(
        repo.clone(),
        ai.clone(),
        data.clone(),
        sessions.clone(),
    );
    Harness {
        controller: Arc::new(controller),
        ai,
        data,
        sessions,
        repo,
    }
}
