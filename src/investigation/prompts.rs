//! Prompt templates for classification and plan generation.

use crate::investigation::types::{InvestigationProblem, InvestigationType};

pub const CLASSIFICATION_INSTRUCTION: &str = "Classify the following operational problem into exactly one \
investigation type: performance, availability, data-quality, dependencies.\n\
Respond with strict JSON only, no prose, no markdown fences:\n\
{\"type\": \"performance|availability|data-quality|dependencies\", \"confidence\": 0.0-1.0, \"reasoning\": \"one sentence\"}";

pub fn classification_prompt(description: &str, language: &str) -> String {
    format!(
        "{}\nWrite the reasoning in language: {}\n\nProblem:\n{}",
        CLASSIFICATION_INSTRUCTION,
        language,
        description.trim()
    )
}

/// Investigative focus for each type, inlined into the planning prompt.
fn type_guidance(investigation_type: InvestigationType) -> &'static str {
    match investigation_type {
        InvestigationType::Performance => {
            "Focus on latency distribution (p50/p95/p99), throughput over time, slowest operations, \
             and slow downstream dependency calls. Start broad, then narrow to the slowest endpoints."
        }
        InvestigationType::Availability => {
            "Focus on failed request rates, HTTP 5xx/4xx breakdown, exceptions by type, \
             availability test results, and when the failures started."
        }
        InvestigationType::DataQuality => {
            "Focus on missing or null fields, ingestion volume gaps, duplicated records, \
             schema drift, and unexpected value distributions."
        }
        InvestigationType::Dependencies => {
            "Focus on outbound dependency calls: failure rates and durations per target, \
             recently degraded targets, and correlation with request failures."
        }
    }
}

pub fn plan_prompt(
    problem: &InvestigationProblem,
    investigation_type: InvestigationType,
    language: &str,
) -> String {
    let mut prompt = format!(
        "You are planning a {} root-cause investigation over telemetry data.\n{}\n\n\
         Problem: {}\n",
        investigation_type,
        type_guidance(investigation_type),
        problem.description.trim()
    );
    if let Some(severity) = problem.severity {
        prompt.push_str(&format!("Severity: {:?}\n", severity));
    }
    if let Some(range) = &problem.time_range {
        prompt.push_str(&format!(
            "Time range: {} to {}\n",
            range.start.to_rfc3339(),
            range.end.to_rfc3339()
        ));
    }
    if !problem.affected_services.is_empty() {
        prompt.push_str(&format!(
            "Affected services: {}\n",
            problem.affected_services.join(", ")
        ));
    }
    if !problem.tags.is_empty() {
        prompt.push_str(&format!("Tags: {}\n", problem.tags.join(", ")));
    }
    prompt.push_str(&format!(
        "\nProduce 2-4 ordered phases, each with 1-3 KQL queries. Mark a query required only if \
         the investigation cannot continue without it. Write names, purposes and reasoning in \
         language: {}.\n\
         Respond with strict JSON only:\n\
         {{\"phases\": [{{\"name\": string, \"description\": string, \"priority\": \"high|medium|low\", \
         \"estimatedTime\": seconds, \"queries\": [{{\"purpose\": string, \"query\": string, \
         \"expectedOutcome\": string, \"confidence\": 0.0-1.0, \"required\": bool}}]}}], \
         \"estimatedTotalTime\": seconds, \"confidence\": 0.0-1.0, \"reasoning\": string}}",
        language
    ));
    prompt
}

/// Generic recent-activity query used by the fallback plan.
pub fn fallback_query(investigation_type: InvestigationType) -> (&'static str, &'static str) {
    match investigation_type {
        InvestigationType::Performance => (
            "Review recent request durations",
            "requests | where timestamp > ago(1h) | summarize avg(duration), percentile(duration, 95), count() by bin(timestamp, 5m) | order by timestamp desc",
        ),
        InvestigationType::Availability => (
            "Review recent failed requests",
            "requests | where timestamp > ago(1h) | summarize total = count(), failed = countif(success == false) by bin(timestamp, 5m) | order by timestamp desc",
        ),
        InvestigationType::DataQuality => (
            "Review recent ingestion volume",
            "union * | where timestamp > ago(1h) | summarize count() by itemType, bin(timestamp, 5m) | order by timestamp desc",
        ),
        InvestigationType::Dependencies => (
            "Review recent dependency calls",
            "dependencies | where timestamp > ago(1h) | summarize count(), failed = countif(success == false), avg(duration) by target, type | order by failed desc",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prompt_mentions_services_and_language() {
        let problem = InvestigationProblem::new("checkout is slow").with_services(["checkout-api"]);
        let prompt = plan_prompt(&problem, InvestigationType::Performance, "ja");
        assert!(prompt.contains("checkout-api"));
        assert!(prompt.contains("language: ja"));
        assert!(prompt.contains("performance root-cause investigation"));
    }

    #[test]
    fn every_type_has_a_fallback_query() {
        for t in InvestigationType::ALL {
            let (purpose, query) = fallback_query(t);
            assert!(!purpose.is_empty());
            assert!(query.contains("ago(1h)"));
        }
    }
}
