use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("request error: {0}")]
    Request(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("provider unavailable")]
    Unavailable,
}

/// A column in a tabular telemetry result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: String,
}

/// Tabular rows returned by the telemetry backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column whose name matches any of `names` (case-insensitive).
    pub fn column_index(&self, names: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| names.iter().any(|n| c.name.eq_ignore_ascii_case(n)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Patterns,
    Insights,
    Full,
}

/// Request for the AI to interpret one query result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub result: QueryResult,
    pub original_query: String,
    pub analysis_type: AnalysisType,
    /// Free-text operator notes collected during the investigation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Known AI analysis shapes; anything else is kept verbatim as `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisResult {
    Patterns {
        patterns: Vec<String>,
    },
    Insights {
        insights: Vec<String>,
        #[serde(default)]
        summary: Option<String>,
    },
    Full {
        summary: String,
        #[serde(default)]
        patterns: Vec<String>,
        #[serde(default)]
        insights: Vec<String>,
        #[serde(default)]
        anomalies: Vec<String>,
    },
    Unrecognized {
        raw: Value,
    },
}

impl AnalysisResult {
    /// Interpret an arbitrary JSON payload, keeping unknown shapes intact.
    pub fn from_value(value: Value) -> Self {
        if let Ok(parsed) = serde_json::from_value::<AnalysisResult>(value.clone()) {
            return parsed;
        }
        // Untagged payloads: infer the shape from the keys present
        let strings = |key: &str| -> Option<Vec<String>> {
            value.get(key)?.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
        };
        let summary = value
            .get("summary")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        match (strings("insights"), strings("patterns"), summary) {
            (Some(insights), Some(patterns), Some(summary)) => AnalysisResult::Full {
                summary,
                patterns,
                insights,
                anomalies: strings("anomalies").unwrap_or_default(),
            },
            (Some(insights), _, summary) => AnalysisResult::Insights { insights, summary },
            (None, Some(patterns), _) => AnalysisResult::Patterns { patterns },
            _ => AnalysisResult::Unrecognized { raw: value },
        }
    }

    /// One-line human summary, if the shape carries one.
    pub fn headline(&self) -> Option<String> {
        match self {
            AnalysisResult::Full { summary, .. } => Some(summary.clone()),
            AnalysisResult::Insights { summary: Some(s), .. } => Some(s.clone()),
            AnalysisResult::Insights { insights, .. } => insights.first().cloned(),
            AnalysisResult::Patterns { patterns } => patterns.first().cloned(),
            AnalysisResult::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    pub investigation_id: String,
    pub language: String,
    pub interactive: bool,
}

/// AI reasoning adapter: free text for classification/planning, structured analysis per query.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate_response(&self, prompt: &str) -> Result<String, ProviderError>;

    async fn analyze_query_result(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, ProviderError>;
}

/// Telemetry query executor.
#[async_trait]
pub trait DataSourceProvider: Send + Sync {
    async fn execute_query(&self, query: &str) -> Result<QueryResult, ProviderError>;
}

/// Conversational session bound to one investigation.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn create_session(&self, options: SessionOptions) -> Result<String, ProviderError>;

    async fn end_session(&self, session_id: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_payload_parses_directly() {
        let v = json!({"type": "patterns", "patterns": ["spike at 09:00"]});
        assert_eq!(
            AnalysisResult::from_value(v),
            AnalysisResult::Patterns {
                patterns: vec!["spike at 09:00".into()]
            }
        );
    }

    #[test]
    fn untagged_insights_are_inferred() {
        let v = json!({"insights": ["p95 doubled"], "summary": "latency regression"});
        let parsed = AnalysisResult::from_value(v);
        assert_eq!(parsed.headline().as_deref(), Some("latency regression"));
        assert!(matches!(parsed, AnalysisResult::Insights { .. }));
    }

    #[test]
    fn unknown_shape_is_kept_verbatim() {
        let v = json!({"verdict": "ok"});
        match AnalysisResult::from_value(v.clone()) {
            AnalysisResult::Unrecognized { raw } => assert_eq!(raw, v),
            other => panic!("unexpected {:?}", other),
        }
    }
}
