//! Workflow step implementations and the workflow runner.
//!
//! This crate provides the two step kinds ([`BranchPackageStep`],
//! [`RebuildPackageStep`]), the [`ScmEventSubscriptionCreator`] that binds
//! build outcomes back to the SCM, and the [`WorkflowRunner`] that drives the
//! steps of every applicable workflow for one webhook delivery.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Steps sequence calls between the domain rules in
//! the [`workflow`] crate and the collaborator traits it defines (catalog,
//! build service, authorizer, subscription store). Collaborators are always
//! passed in through a [`StepContext`]; nothing is looked up globally.

pub mod branch_package;
pub mod context;
pub mod rebuild_package;
pub mod runner;
pub mod step;
pub mod subscriptions;

#[cfg(test)]
mod test_utils;

pub use branch_package::{BranchPackageStep, BRANCH_REQUEST_FILE};
pub use context::{Collaborators, StepContext};
pub use rebuild_package::RebuildPackageStep;
pub use runner::{StepReport, WorkflowRunError, WorkflowRunner, WorkflowStep};
pub use step::{run_step, Step, StepOutcome};
pub use subscriptions::ScmEventSubscriptionCreator;
