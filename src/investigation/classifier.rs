//! Problem classifier: free text to investigation type, never blocking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::AiProvider;
use crate::investigation::prompts::classification_prompt;
use crate::investigation::types::{InvestigationType, Provenance};
use crate::utils::parse_json_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(rename = "type")]
    pub investigation_type: InvestigationType,
    pub confidence: f32,
    pub reasoning: String,
    pub provenance: Provenance,
}

impl Classification {
    /// Used whenever the AI call or its output cannot be trusted.
    pub fn fallback() -> Self {
        Self {
            investigation_type: InvestigationType::Performance,
            confidence: 0.5,
            reasoning: "classification failed, defaulted".to_string(),
            provenance: Provenance::Default,
        }
    }
}

/// Parse the adapter's reply. Unknown types and missing fields are errors, not guesses.
pub fn parse_classification(text: &str) -> Result<Classification, String> {
    let value: Value = parse_json_value(text)?;
    let raw_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| "missing \"type\"".to_string())?;
    let investigation_type = InvestigationType::parse(raw_type)
        .ok_or_else(|| format!("unknown investigation type '{}'", raw_type))?;
    let confidence = value
        .get("confidence")
        .and_then(|c| c.as_f64())
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .ok_or_else(|| "missing numeric \"confidence\"".to_string())?;
    let reasoning = value
        .get("reasoning")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(Classification {
        investigation_type,
        confidence,
        reasoning,
        provenance: Provenance::AiDerived,
    })
}

pub struct Classifier {
    ai: Arc<dyn AiProvider>,
}

impl Classifier {
    pub fn new(ai: Arc<dyn AiProvider>) -> Self {
        Self { ai }
    }

    /// Always returns a classification; failures fall back to performance/0.5.
    pub async fn classify(&self, description: &str, language: &str) -> Classification {
        if description.trim().is_empty() {
            return Classification::fallback();
        }
        let reply = match self
            .ai
            .generate_response(&classification_prompt(description, language))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("classification call failed, using default: {}", e);
                return Classification::fallback();
            }
        };
        match parse_classification(&reply) {
            Ok(classification) => {
                tracing::debug!(
                    investigation_type = %classification.investigation_type,
                    confidence = classification.confidence,
                    "problem classified"
                );
                classification
            }
            Err(e) => {
                tracing::warn!("classification output unparsable, using default: {}", e);
                Classification::fallback()
            }
        }
    }
}
