//! Runs the workflows of a workflow file against one webhook delivery.
//!
//! Workflows are visited in file order; a workflow whose filters reject the
//! event is passed over. Steps run strictly one after another and the first
//! failing step ends the run. Every run gets its own [`WorkflowRunId`], shared
//! by all steps (and therefore all subscriptions) of that delivery.
//!
//! [`WorkflowRunId`]: workflow::WorkflowRunId

use thiserror::Error;
use tracing::{debug, info, warn, Instrument};
use workflow::{
    RetryPolicy, StepError, StepInstructions, WebhookEvent, WorkflowDefinition, WorkflowToken,
};

use crate::branch_package::BranchPackageStep;
use crate::context::{Collaborators, StepContext};
use crate::rebuild_package::RebuildPackageStep;
use crate::step::{run_step, StepOutcome};

/// A step bound to the event it runs for.
#[derive(Debug, Clone)]
pub enum WorkflowStep {
    BranchPackage(BranchPackageStep),
    RebuildPackage(RebuildPackageStep),
}

impl WorkflowStep {
    pub fn new(instructions: StepInstructions, webhook: WebhookEvent) -> Self {
        match instructions {
            StepInstructions::BranchPackage(i) => {
                WorkflowStep::BranchPackage(BranchPackageStep::new(i, webhook))
            }
            StepInstructions::RebuildPackage(i) => {
                WorkflowStep::RebuildPackage(RebuildPackageStep::new(i, webhook))
            }
        }
    }

    /// Runs the step through all of its phases.
    pub async fn call(&self, ctx: &StepContext) -> Result<StepOutcome, StepError> {
        match self {
            WorkflowStep::BranchPackage(step) => run_step(step, ctx).await,
            WorkflowStep::RebuildPackage(step) => run_step(step, ctx).await,
        }
    }
}

/// The result of one successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Name of the workflow the step belongs to.
    pub workflow: String,
    /// Step kind, e.g. `branch_package`.
    pub step: &'static str,
    pub outcome: StepOutcome,
}

/// A step failed; later steps were not run.
#[derive(Debug, Error)]
#[error("workflow '{workflow}' step {step_index} ({step}) failed: {source}")]
pub struct WorkflowRunError {
    /// Name of the workflow that failed.
    pub workflow: String,
    /// Zero-based position of the step within its workflow.
    pub step_index: usize,
    /// Kind of the failing step.
    pub step: &'static str,
    /// Reports of the steps that completed before the failure.
    pub completed: Vec<StepReport>,
    #[source]
    pub source: StepError,
}

impl WorkflowRunError {
    /// Whether redelivering the same event may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.source.retry_policy()
    }
}

/// Drives workflow steps for webhook deliveries.
#[derive(Debug, Clone)]
pub struct WorkflowRunner {
    collaborators: Collaborators,
    token: WorkflowToken,
}

impl WorkflowRunner {
    pub fn new(collaborators: Collaborators, token: WorkflowToken) -> Self {
        Self {
            collaborators,
            token,
        }
    }

    /// Runs every applicable workflow for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowRunError`] for the first failing step.
    pub async fn run(
        &self,
        workflows: &[WorkflowDefinition],
        event: &WebhookEvent,
    ) -> Result<Vec<StepReport>, WorkflowRunError> {
        let ctx = StepContext::new(self.collaborators.clone(), self.token.clone());
        let span = tracing::info_span!(
            "workflow_run",
            workflow_run = %ctx.workflow_run,
            scm = ?event.scm,
            event = ?event.kind,
            action = ?event.action,
        );

        async move {
            let mut reports = Vec::new();
            for definition in workflows {
                if !definition.applies_to(event) {
                    debug!(workflow = %definition.name, "filtered out");
                    continue;
                }
                for (index, instructions) in definition.steps.iter().enumerate() {
                    let step = WorkflowStep::new(instructions.clone(), event.clone());
                    let kind = instructions.kind();
                    match step.call(&ctx).await {
                        Ok(outcome) => reports.push(StepReport {
                            workflow: definition.name.clone(),
                            step: kind,
                            outcome,
                        }),
                        Err(source) => {
                            warn!(workflow = %definition.name, step = kind, error = %source, "step failed");
                            return Err(WorkflowRunError {
                                workflow: definition.name.clone(),
                                step_index: index,
                                step: kind,
                                completed: reports,
                                source,
                            });
                        }
                    }
                }
            }
            info!(steps = reports.len(), "workflow run finished");
            Ok(reports)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{package_ref, webhook, Fixture};
    use serde_json::json;
    use workflow::parse_workflows;

    const WORKFLOWS: &str = r#"
pr_build:
  steps:
    - branch_package:
        source_project: foo_project
        source_package: bar_package
        target_project: home:Iggy
    - rebuild_package:
        project: foo_project
        package: bar_package
  filters:
    event: pull_request
push_rebuild:
  steps:
    - rebuild_package:
        project: foo_project
        package: bar_package
  filters:
    event: push
"#;

    fn fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.backend.add_project("foo_project", None, &["openSUSE_Tumbleweed"]);
        fixture.backend.add_package("foo_project", "bar_package", None);
        fixture
    }

    fn runner(fixture: &Fixture) -> WorkflowRunner {
        WorkflowRunner::new(fixture.collaborators(), Fixture::token())
    }

    #[tokio::test]
    async fn runs_matching_workflow_steps_in_order() {
        let fixture = fixture();
        let workflows = parse_workflows(WORKFLOWS).unwrap();

        let reports = runner(&fixture)
            .run(&workflows, &webhook("opened"))
            .await
            .unwrap();

        let steps: Vec<_> = reports.iter().map(|r| (r.workflow.as_str(), r.step)).collect();
        assert_eq!(
            steps,
            vec![("pr_build", "branch_package"), ("pr_build", "rebuild_package")]
        );
        assert_eq!(
            reports[0].outcome,
            StepOutcome::Completed {
                package: package_ref("home:Iggy:openSUSE:open-build-service:PR-1", "bar_package")
            }
        );
        assert_eq!(fixture.backend.rebuilds().len(), 1);
        // Two packages, two outcomes each.
        assert_eq!(fixture.store.all().len(), 4);
    }

    #[tokio::test]
    async fn steps_of_one_delivery_share_a_run_id() {
        let fixture = fixture();
        let workflows = parse_workflows(WORKFLOWS).unwrap();

        runner(&fixture)
            .run(&workflows, &webhook("opened"))
            .await
            .unwrap();

        let stored = fixture.store.all();
        assert!(stored.iter().all(|s| s.workflow_run == stored[0].workflow_run));
    }

    #[tokio::test]
    async fn push_event_only_runs_push_workflows() {
        let fixture = fixture();
        let workflows = parse_workflows(WORKFLOWS).unwrap();
        let event = WebhookEvent::from_payload(json!({
            "scm": "github",
            "event": "push",
            "action": "push",
            "commit_sha": "123456789",
            "target_repository_full_name": "openSUSE/open-build-service"
        }))
        .unwrap();

        let reports = runner(&fixture).run(&workflows, &event).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].workflow, "push_rebuild");
        assert!(fixture.backend.branches().is_empty());
    }

    #[tokio::test]
    async fn closed_pull_request_skips_every_step() {
        let fixture = fixture();
        let workflows = parse_workflows(WORKFLOWS).unwrap();

        let reports = runner(&fixture)
            .run(&workflows, &webhook("closed"))
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome == StepOutcome::Skipped));
        assert!(fixture.store.all().is_empty());
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let fixture = fixture();
        let workflows = parse_workflows(
            r#"
broken:
  steps:
    - rebuild_package:
        project: foo_project
        package: missing
    - branch_package:
        source_project: foo_project
        source_package: bar_package
        target_project: home:Iggy
"#,
        )
        .unwrap();

        let err = runner(&fixture)
            .run(&workflows, &webhook("opened"))
            .await
            .unwrap_err();

        assert_eq!(err.workflow, "broken");
        assert_eq!(err.step_index, 0);
        assert_eq!(err.step, "rebuild_package");
        assert!(err.completed.is_empty());
        assert!(matches!(err.source, StepError::SourceNotFound { .. }));
        assert!(!err.retry_policy().is_retryable());
        assert!(fixture.backend.branches().is_empty());
    }
}
