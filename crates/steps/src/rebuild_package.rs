//! The `rebuild_package` step: triggers a rebuild of an existing package.

use async_trait::async_trait;
use tracing::info;
use workflow::{
    Action, BackendError, FindOptions, Package, PackageRef, RebuildPackageInstructions, StepError,
    WebhookEvent,
};

use crate::context::StepContext;
use crate::step::Step;

/// Rebuilds a package (or the container of a multibuild flavor).
#[derive(Debug, Clone)]
pub struct RebuildPackageStep {
    instructions: RebuildPackageInstructions,
    webhook: WebhookEvent,
}

impl RebuildPackageStep {
    pub fn new(instructions: RebuildPackageInstructions, webhook: WebhookEvent) -> Self {
        Self {
            instructions,
            webhook,
        }
    }
}

#[async_trait]
impl Step for RebuildPackageStep {
    type Plan = Package;

    fn name(&self) -> &'static str {
        RebuildPackageInstructions::STEP
    }

    fn webhook(&self) -> &WebhookEvent {
        &self.webhook
    }

    async fn validate(&self, ctx: &StepContext) -> Result<Package, StepError> {
        let params = self.instructions.validate()?;
        let requested = PackageRef::new(params.project, params.package);
        let found = ctx
            .catalog()
            .find_package(&requested, FindOptions::no_source_follow_multibuild())
            .await;
        match found {
            Ok(Some(package)) => Ok(package),
            Ok(None) | Err(BackendError::NotFound { .. }) => {
                Err(StepError::SourceNotFound { package: requested })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn authorization(&self, plan: &Package) -> (Action, PackageRef) {
        (Action::Rebuild, plan.reference())
    }

    async fn execute(&self, ctx: &StepContext, plan: Package) -> Result<PackageRef, StepError> {
        let package = plan.reference();
        match ctx.build_service().rebuild(&package).await {
            Ok(()) => {
                info!(%package, "rebuild triggered");
                Ok(package)
            }
            Err(BackendError::NotFound { .. }) => Err(StepError::SourceNotFound { package }),
            Err(BackendError::NoPermission { message }) => Err(StepError::NoPermission {
                action: Action::Rebuild,
                target: package,
                message,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
