//! Binds build outcomes of a package back to the originating SCM.

use tracing::{debug, info};
use workflow::{
    Channel, EventSubscription, EventType, PackageRef, ReceiverRole, StoreError, Timestamp,
    UpsertOutcome, WebhookEvent,
};

use crate::context::StepContext;

/// Ensures one enabled SCM subscription per build outcome for a package.
///
/// Repeated deliveries for the same pull request and package find the records
/// of the first delivery in place and add nothing.
pub struct ScmEventSubscriptionCreator<'a> {
    ctx: &'a StepContext,
    webhook: &'a WebhookEvent,
}

impl<'a> ScmEventSubscriptionCreator<'a> {
    pub fn new(ctx: &'a StepContext, webhook: &'a WebhookEvent) -> Self {
        Self { ctx, webhook }
    }

    /// Upserts the `BuildFail` and `BuildSuccess` subscriptions of `package`.
    ///
    /// Returns the upsert outcome per event type.
    pub async fn call(
        &self,
        package: &PackageRef,
    ) -> Result<Vec<(EventType, UpsertOutcome)>, StoreError> {
        let mut outcomes = Vec::with_capacity(EventType::BUILD_OUTCOMES.len());
        for eventtype in EventType::BUILD_OUTCOMES {
            let subscription = EventSubscription {
                eventtype,
                receiver_role: ReceiverRole::Reader,
                user: self.ctx.token.executor.clone(),
                channel: Channel::Scm,
                enabled: true,
                token: self.ctx.token.id,
                package: package.clone(),
                workflow_run: self.ctx.workflow_run,
                payload: self.webhook.payload.clone(),
                created_at: Timestamp::now(),
            };
            let outcome = self.ctx.subscriptions().upsert(subscription).await?;
            match outcome {
                UpsertOutcome::Created => info!(%package, %eventtype, "subscription created"),
                UpsertOutcome::AlreadyPresent => {
                    debug!(%package, %eventtype, "subscription already present")
                }
            }
            outcomes.push((eventtype, outcome));
        }
        Ok(outcomes)
    }
}
