//! SCM workflow engine CLI entry point.
//!
//! This binary is the composition root. It:
//!
//! 1. parses the TOML configuration;
//! 2. installs `tracing-subscriber` (JSON or pretty) and, when configured, an
//!    OpenTelemetry OTLP exporter;
//! 3. builds the build-service client, the allow-list authorizer and the
//!    JSON-file subscription store and injects them into a
//!    [`steps::WorkflowRunner`];
//! 4. runs the workflows of a workflow file against one webhook payload.
//!
//! Exit status is `0` on success, `75` (temporary failure) when the delivery
//! may be retried unchanged, and `1` otherwise.

mod authorizer;
mod config;
mod store;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use build_service::BuildServiceClient;
use clap::{Parser, Subcommand};
use steps::{Collaborators, StepOutcome, WorkflowRunError, WorkflowRunner};
use tracing::error;
use workflow::{parse_workflows, WebhookEvent};

use crate::authorizer::AllowListAuthorizer;
use crate::config::Config;
use crate::store::JsonFileSubscriptionStore;

const EXIT_TEMPFAIL: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "scm-workflow", version, about = "Runs SCM webhook workflows against a build service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the workflows of a workflow file for one webhook payload.
    Run {
        /// Configuration file.
        #[arg(long, env = "SCM_WORKFLOW_CONFIG")]
        config: PathBuf,
        /// Workflow file (YAML).
        #[arg(long)]
        workflows: PathBuf,
        /// Normalized webhook payload (JSON).
        #[arg(long)]
        payload: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            workflows,
            payload,
        } => match run(&config, &workflows, &payload).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e:#}");
                let retryable = e
                    .downcast_ref::<WorkflowRunError>()
                    .is_some_and(|e| e.retry_policy().is_retryable());
                if retryable {
                    ExitCode::from(EXIT_TEMPFAIL)
                } else {
                    ExitCode::FAILURE
                }
            }
        },
    }
}

async fn run(config: &Path, workflows: &Path, payload: &Path) -> anyhow::Result<()> {
    let config = Config::load(config)?;
    let _telemetry = telemetry::init(&config.telemetry)?;

    let text = std::fs::read_to_string(workflows)
        .with_context(|| format!("reading workflow file {}", workflows.display()))?;
    let definitions = parse_workflows(&text)
        .with_context(|| format!("loading workflow file {}", workflows.display()))?;
    let bytes = std::fs::read(payload)
        .with_context(|| format!("reading payload {}", payload.display()))?;
    let event = WebhookEvent::from_slice(&bytes)
        .with_context(|| format!("classifying payload {}", payload.display()))?;

    let client = Arc::new(BuildServiceClient::new(config.build_service_config()?)?);
    let collaborators = Collaborators {
        catalog: client.clone(),
        build_service: client,
        authorizer: Arc::new(AllowListAuthorizer::new(
            config.authorization.allowed_actions.iter().copied(),
        )),
        subscriptions: Arc::new(JsonFileSubscriptionStore::new(
            config.subscriptions.path.clone(),
        )),
    };
    let runner = WorkflowRunner::new(collaborators, config.token()?);

    match runner.run(&definitions, &event).await {
        Ok(reports) => {
            for report in reports {
                match report.outcome {
                    StepOutcome::Skipped => {
                        println!("{} {}: skipped", report.workflow, report.step)
                    }
                    StepOutcome::Completed { package } => {
                        println!("{} {}: {package}", report.workflow, report.step)
                    }
                }
            }
            Ok(())
        }
        Err(e) => {
            error!(
                workflow = %e.workflow,
                step = e.step,
                step_index = e.step_index,
                retry = ?e.retry_policy(),
                error = %e.source,
                "workflow run failed"
            );
            Err(e.into())
        }
    }
}
