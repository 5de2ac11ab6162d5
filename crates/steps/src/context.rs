//! Collaborator handles passed into every step invocation.

use std::sync::Arc;

use workflow::{
    Authorizer, BuildService, PackageCatalog, SubscriptionStore, WorkflowRunId, WorkflowToken,
};

/// The external collaborators a step may call.
#[derive(Clone)]
pub struct Collaborators {
    /// Project and package lookups.
    pub catalog: Arc<dyn PackageCatalog>,
    /// Branch, rebuild and source mutations.
    pub build_service: Arc<dyn BuildService>,
    /// Decides whether the token executor may act on a package.
    pub authorizer: Arc<dyn Authorizer>,
    /// Where SCM status-report subscriptions are recorded.
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Everything one delivery's steps share: collaborators, the token the
/// delivery was authenticated with, and the run identifier.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub collaborators: Collaborators,
    /// The token the delivery was authenticated with.
    pub token: WorkflowToken,
    /// Shared by every step of one delivery.
    pub workflow_run: WorkflowRunId,
}

impl StepContext {
    /// Creates a context for a new run.
    pub fn new(collaborators: Collaborators, token: WorkflowToken) -> Self {
        Self {
            collaborators,
            token,
            workflow_run: WorkflowRunId::new_random(),
        }
    }

    /// Shorthand for `collaborators.catalog`.
    pub fn catalog(&self) -> &dyn PackageCatalog {
        self.collaborators.catalog.as_ref()
    }

    /// Shorthand for `collaborators.build_service`.
    pub fn build_service(&self) -> &dyn BuildService {
        self.collaborators.build_service.as_ref()
    }

    /// Shorthand for `collaborators.authorizer`.
    pub fn authorizer(&self) -> &dyn Authorizer {
        self.collaborators.authorizer.as_ref()
    }

    /// Shorthand for `collaborators.subscriptions`.
    pub fn subscriptions(&self) -> &dyn SubscriptionStore {
        self.collaborators.subscriptions.as_ref()
    }
}
