//! The step contract and its driver.
//!
//! Every step goes through the same phases for one delivery:
//!
//! ```text
//! CREATED → VALIDATED → AUTHORIZED → EXECUTED → SUBSCRIBED
//! ```
//!
//! A concrete step supplies validation (which also resolves the identities the
//! step works on), the authorization request, and the execution. [`run_step`]
//! owns the rest: the short-circuit for closed and reopened pull requests, the
//! authorization call, and the subscription phase. Nothing externally visible
//! happens before authorization succeeded.

use async_trait::async_trait;
use tracing::{debug, info, Instrument};
use workflow::{Action, PackageRef, StepError, WebhookEvent};

use crate::context::StepContext;
use crate::subscriptions::ScmEventSubscriptionCreator;

/// What a step invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The event closed or reopened a pull request; nothing was done.
    Skipped,
    /// The step acted on `package` and subscribed it to build outcomes.
    Completed { package: PackageRef },
}

/// A single idempotent unit of work bound to a webhook event.
#[async_trait]
pub trait Step: Send + Sync {
    /// Identities resolved during validation and consumed by execution.
    type Plan: Send + Sync;

    /// Step kind as written in workflow files.
    fn name(&self) -> &'static str;

    /// The event this step reacts to.
    fn webhook(&self) -> &WebhookEvent;

    /// Checks the instructions and resolves them against the catalog.
    ///
    /// Must not change anything.
    async fn validate(&self, ctx: &StepContext) -> Result<Self::Plan, StepError>;

    /// The action and target the executor must be authorized for.
    fn authorization(&self, plan: &Self::Plan) -> (Action, PackageRef);

    /// Performs the step's action and returns the package whose build
    /// outcomes should be reported.
    async fn execute(&self, ctx: &StepContext, plan: Self::Plan) -> Result<PackageRef, StepError>;
}

/// Runs one step through all of its phases.
///
/// # Errors
///
/// Returns the first failing phase's [`StepError`]. Closed, merged and
/// reopened pull request events are not errors; they yield
/// [`StepOutcome::Skipped`].
pub async fn run_step<S: Step>(step: &S, ctx: &StepContext) -> Result<StepOutcome, StepError> {
    let webhook = step.webhook();
    let span = tracing::info_span!(
        "step",
        step = step.name(),
        workflow_run = %ctx.workflow_run,
        pr_number = webhook.pr_number.map(|n| n.as_u64()),
    );

    async move {
        if webhook.is_closed_or_merged_pull_request() || webhook.is_reopened_pull_request() {
            debug!(action = ?webhook.action, "pull request closed or reopened; nothing to do");
            return Ok(StepOutcome::Skipped);
        }

        let plan = step.validate(ctx).await?;
        debug!("instructions validated");

        let (action, target) = step.authorization(&plan);
        ctx.authorizer()
            .authorize(&ctx.token.executor, action, &target)
            .await?;
        debug!(%action, %target, "executor authorized");

        let package = step.execute(ctx, plan).await?;
        info!(%package, "step executed");

        ScmEventSubscriptionCreator::new(ctx, webhook)
            .call(&package)
            .await?;

        Ok(StepOutcome::Completed { package })
    }
    .instrument(span)
    .await
}
