//! Shared prompt/parse glue for per-query AI analysis

use serde_json::json;

use crate::clients::traits::{AnalysisRequest, AnalysisResult, AnalysisType, ProviderError};
use crate::utils::parse_json_value;

/// Rows beyond this are summarised by count only
const MAX_SAMPLE_ROWS: usize = 50;

pub fn build_analysis_prompt(request: &AnalysisRequest) -> String {
    let columns: Vec<&str> = request
        .result
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    let sample: Vec<_> = request.result.rows.iter().take(MAX_SAMPLE_ROWS).collect();
    let shape = match request.analysis_type {
        AnalysisType::Patterns => r#"{"type":"patterns","patterns":[string]}"#,
        AnalysisType::Insights => r#"{"type":"insights","insights":[string],"summary":string}"#,
        AnalysisType::Full => {
            r#"{"type":"full","summary":string,"patterns":[string],"insights":[string],"anomalies":[string]}"#
        }
    };

    let mut prompt = format!(
        "You are analysing telemetry query results during a root-cause investigation.\n\
         Query:\n{}\n\n\
         Columns: {}\n\
         Total rows: {}\n\
         Sample rows (JSON): {}\n\n",
        request.original_query,
        columns.join(", "),
        request.result.row_count(),
        json!(sample)
    );
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Operator notes:\n{}\n\n", context));
    }
    prompt.push_str(&format!(
        "Respond with raw JSON only, matching exactly: {}",
        shape
    ));
    prompt
}

pub fn parse_analysis(text: &str) -> Result<AnalysisResult, ProviderError> {
    parse_json_value(text)
        .map(AnalysisResult::from_value)
        .map_err(ProviderError::Parse)
}
