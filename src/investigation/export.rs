//! Rendering of completed investigations.

use std::fmt::Write as _;

use crate::error::Result;
use crate::investigation::types::{ExportFormat, ExportedInvestigation, InvestigationResult};

pub fn export_result(
    result: &InvestigationResult,
    format: ExportFormat,
) -> Result<ExportedInvestigation> {
    let (content, extension, mime_type) = match format {
        ExportFormat::Json => (
            serde_json::to_string_pretty(result)?,
            "json",
            "application/json",
        ),
        ExportFormat::Markdown => (render_markdown(result), "md", "text/markdown"),
        ExportFormat::Html => (render_html(result), "html", "text/html"),
    };
    Ok(ExportedInvestigation {
        content,
        filename: format!("investigation-{}.{}", result.id, extension),
        mime_type: mime_type.to_string(),
    })
}

pub fn render_markdown(result: &InvestigationResult) -> String {
    let problem = &result.plan.problem;
    let rca = &result.root_cause_analysis;
    let progress = &result.context.progress;
    let mut out = String::new();

    let _ = writeln!(out, "# Investigation Report: {}", result.id);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Problem");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", problem.description.trim());
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Type**: {}", result.plan.detected_type);
    if let Some(severity) = problem.severity {
        let _ = writeln!(out, "- **Severity**: {:?}", severity);
    }
    if !problem.affected_services.is_empty() {
        let _ = writeln!(
            out,
            "- **Affected services**: {}",
            problem.affected_services.join(", ")
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", result.summary);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Root Cause");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rca.primary_cause.description);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- **Confidence**: {:.0}%",
        rca.primary_cause.confidence * 100.0
    );
    let _ = writeln!(out, "- **Category**: {}", rca.primary_cause.category);
    if !rca.affected_components.is_empty() {
        let _ = writeln!(
            out,
            "- **Affected components**: {}",
            rca.affected_components.join(", ")
        );
    }
    let _ = writeln!(out, "- **Business impact**: {}", rca.business_impact);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Evidence");
    let _ = writeln!(out);
    if result.evidence.is_empty() {
        let _ = writeln!(out, "_No evidence collected._");
    }
    for e in &result.evidence {
        let phase = result
            .plan
            .phase(&e.phase_id)
            .map(|p| p.name.as_str())
            .unwrap_or(e.phase_id.as_str());
        let _ = writeln!(
            out,
            "- [{:?}] {} ({} rows, phase \"{}\", query {})",
            e.significance,
            e.summary,
            e.result.row_count(),
            phase,
            e.query_id
        );
    }
    let _ = writeln!(out);

    let recs = &result.recommendations;
    let sections = [
        ("Immediate", &recs.immediate),
        ("Short term", &recs.short_term),
        ("Long term", &recs.long_term),
        ("Prevention", &recs.prevention),
    ];
    if sections.iter().any(|(_, items)| !items.is_empty()) {
        let _ = writeln!(out, "## Recommendations");
        let _ = writeln!(out);
        for (title, items) in sections.iter().filter(|(_, items)| !items.is_empty()) {
            let _ = writeln!(out, "### {}", title);
            for item in items.iter() {
                let _ = writeln!(out, "- {}", item);
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "## Execution");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- **Phases**: {}/{}",
        progress.completed_phases, progress.total_phases
    );
    let _ = writeln!(
        out,
        "- **Queries**: {} completed, {} failed, {} skipped of {}",
        progress.completed_queries,
        progress.failed_queries,
        progress.skipped_queries,
        progress.total_queries
    );
    let _ = writeln!(out, "- **Started**: {}", result.context.started_at.to_rfc3339());
    let _ = writeln!(out, "- **Completed**: {}", result.completed_at.to_rfc3339());
    let _ = writeln!(
        out,
        "- **Total execution time**: {} ms",
        result.total_execution_time
    );
    out
}

/// Markdown text in a minimal HTML shell; no markdown rendering.
pub fn render_html(result: &InvestigationResult) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Investigation {}</title>\n</head>\n<body>\n<pre>\n{}</pre>\n</body>\n</html>\n",
        escape_html(&result.id),
        escape_html(&render_markdown(result))
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigation::synthesis::synthesize_result;
    use crate::investigation::types::{
        InvestigationContext, InvestigationPlan, InvestigationProblem, InvestigationProgress,
        InvestigationType, Provenance,
    };
    use chrono::Utc;

    fn result(description: &str) -> InvestigationResult {
        let plan = InvestigationPlan {
            id: "inv-1".into(),
            problem: InvestigationProblem::new(description),
            detected_type: InvestigationType::Availability,
            phases: vec![],
            estimated_total_time: 0,
            confidence: 0.5,
            reasoning: String::new(),
            created_at: Utc::now(),
            provenance: Provenance::Default,
        };
        let context = InvestigationContext {
            plan_id: plan.id.clone(),
            session_id: "s".into(),
            current_phase_id: None,
            current_query_id: None,
            evidence: vec![],
            progress: InvestigationProgress::for_plan(&plan),
            started_at: Utc::now(),
            last_updated_at: Utc::now(),
        };
        synthesize_result("inv-1", &plan, &context, Utc::now())
    }

    #[test]
    fn filenames_and_mime_types_follow_format() {
        let r = result("site down");
        let json = export_result(&r, ExportFormat::Json).unwrap();
        assert_eq!(json.filename, "investigation-inv-1.json");
        assert_eq!(json.mime_type, "application/json");
        let md = export_result(&r, ExportFormat::Markdown).unwrap();
        assert_eq!(md.filename, "investigation-inv-1.md");
        assert!(md.content.contains("## Root Cause"));
        assert!(md.content.contains("_No evidence collected._"));
        let html = export_result(&r, ExportFormat::Html).unwrap();
        assert_eq!(html.mime_type, "text/html");
        assert!(html.content.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn evidence_lines_name_their_phase() {
        use crate::clients::QueryResult;
        use crate::investigation::types::{
            InvestigationEvidence, InvestigationPhase, PhasePriority, Significance,
        };

        let mut r = result("slow checkout");
        r.plan.phases.push(InvestigationPhase {
            id: "phase-a".into(),
            name: "Dependency latency".into(),
            description: String::new(),
            queries: vec![],
            priority: PhasePriority::High,
            estimated_time: None,
            dependencies: vec![],
        });
        for (id, phase_id) in [("e1", "phase-a"), ("e2", "phase-gone")] {
            r.evidence.push(InvestigationEvidence {
                id: id.into(),
                phase_id: phase_id.into(),
                query_id: "q1".into(),
                result: QueryResult::default(),
                analysis_result: None,
                significance: Significance::Important,
                summary: "p95 doubled".into(),
                collected_at: Utc::now(),
            });
        }

        let md = render_markdown(&r);
        assert!(md.contains("(0 rows, phase \"Dependency latency\", query q1)"));
        // Unknown phase ids are printed as-is
        assert!(md.contains("(0 rows, phase \"phase-gone\", query q1)"));
    }

    #[test]
    fn html_escapes_problem_text() {
        let r = result("<script>alert(1)</script> & more");
        let html = render_html(&r);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp; more"));
    }
}
