//! Command-line driver for the investigation engine.
//!
//! Usage:
//!   investigator run "checkout requests are slow at peak hours" --service checkout
//!   investigator run "users see 503s" --type availability --format markdown --output report.md
//!   investigator validate-plan plan.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use telemetry_investigator::clients::{
    HttpTelemetrySource, InMemorySessionManager, create_ai_provider,
};
use telemetry_investigator::config::{Config, RuntimeConfig};
use telemetry_investigator::investigation::{
    ExportFormat, InMemoryRepository, InvestigationController, InvestigationOptions,
    InvestigationPlan, InvestigationProblem, InvestigationStatus, InvestigationType,
    PlanValidator, Severity,
};

#[derive(Parser)]
#[command(name = "investigator")]
#[command(about = "AI-assisted root-cause investigations over telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an investigation, drive it to completion and export the report
    Run {
        /// Free-text problem description
        description: String,
        /// performance, availability, data-quality or dependencies (classified if omitted)
        #[arg(long = "type")]
        investigation_type: Option<String>,
        /// low, medium, high or critical
        #[arg(long)]
        severity: Option<String>,
        /// Affected service (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
        /// json, markdown or html
        #[arg(long, default_value = "markdown")]
        format: String,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Operator language for AI prompts
        #[arg(long)]
        language: Option<String>,
        /// Overall deadline in seconds
        #[arg(long)]
        max_execution_time: Option<u64>,
    },
    /// Check a plan JSON file for structural problems
    ValidatePlan {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging comes up before the config file is read so its warnings are visible
    telemetry_investigator::load_env();
    let runtime = RuntimeConfig::load_from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&runtime.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("failed to load configuration")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            description,
            investigation_type,
            severity,
            services,
            format,
            output,
            language,
            max_execution_time,
        } => {
            let mut problem = InvestigationProblem::new(description).with_services(services);
            if let Some(raw) = investigation_type {
                let parsed = InvestigationType::parse(&raw)
                    .with_context(|| format!("unknown investigation type '{}'", raw))?;
                problem = problem.with_type(parsed);
            }
            if let Some(raw) = severity {
                problem = problem.with_severity(parse_severity(&raw)?);
            }
            let format: ExportFormat = format.parse().map_err(anyhow::Error::msg)?;
            let options = InvestigationOptions {
                language: language.unwrap_or_else(|| config.investigation.default_language.clone()),
                max_execution_time,
                ..Default::default()
            };
            run(&config, problem, options, format, output).await
        }
        Commands::ValidatePlan { file } => validate_plan(&config, &file),
    }
}

async fn run(
    config: &Config,
    problem: InvestigationProblem,
    options: InvestigationOptions,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let ai = create_ai_provider(config).context("failed to initialise AI provider")?;
    let data_source = Arc::new(
        HttpTelemetrySource::from_config(config).context("failed to initialise telemetry source")?,
    );
    let controller = InvestigationController::from_config(
        config,
        Arc::new(InMemoryRepository::new()),
        ai,
        data_source,
        Arc::new(InMemorySessionManager::new()),
    );

    let started = controller.start_investigation(problem, options).await?;
    let id = started.investigation_id.clone();
    if let Some(plan) = &started.plan {
        info!(
            investigation_id = %id,
            "plan ready: {} phase(s), {} queries, ~{}s",
            plan.phases.len(),
            plan.total_queries(),
            plan.estimated_total_time
        );
    }

    loop {
        let response = controller.continue_investigation(&id, None).await?;
        if response.status == InvestigationStatus::Completed {
            break;
        }
        if let Some(progress) = &response.progress {
            info!(
                investigation_id = %id,
                "progress {:.0}% ({}/{} phases)",
                progress.completion_percentage,
                progress.completed_phases,
                progress.total_phases
            );
        }
    }

    let exported = controller.export_investigation(&id, format).await?;
    match output {
        Some(path) => {
            std::fs::write(&path, &exported.content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("report written to {}", path.display());
        }
        None => println!("{}", exported.content),
    }
    Ok(())
}

fn validate_plan(config: &Config, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let plan: InvestigationPlan = serde_json::from_str(&raw).context("invalid plan JSON")?;
    let validation = PlanValidator::new(config.investigation.advisory_max_plan_seconds).validate(&plan);
    println!("{}", serde_json::to_string_pretty(&validation)?);
    if !validation.is_valid {
        anyhow::bail!("plan has {} issue(s)", validation.issues.len());
    }
    Ok(())
}

fn parse_severity(raw: &str) -> Result<Severity> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => anyhow::bail!("unknown severity '{}'", other),
    }
}
