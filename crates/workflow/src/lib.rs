//! Domain for the SCM workflow step engine.
//!
//! This crate contains every domain concept the engine works with: newtype
//! identifiers, the classified webhook event, per-step instructions, the
//! `scmsync` URL rules, event subscription records, the error taxonomy, and the
//! port traits through which steps reach their collaborators.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectName`, `PullRequestNumber`, etc.) |
//! | [`types`] | Package references, resolved records, collaborator options |
//! | [`event`] | Webhook event classifier |
//! | [`instructions`] | Workflow files and per-step instruction records |
//! | [`scmsync`] | `scmsync` URL merge |
//! | [`subscription`] | Event subscription records |
//! | [`ports`] | Collaborator traits |
//! | [`errors`] | Error taxonomy and retry policy |

pub mod errors;
pub mod event;
pub mod identifiers;
pub mod instructions;
pub mod ports;
pub mod scmsync;
pub mod subscription;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    AuthorizationError, BackendError, RetryPolicy, StepError, StoreError, ValidationError,
};
pub use event::{EventAction, EventKind, MalformedPayload, Scm, WebhookEvent};
pub use identifiers::{
    CommitSha, PackageName, ProjectName, PullRequestNumber, RepositoryName, TokenId, UserLogin,
    WorkflowRunId,
};
pub use instructions::{
    parse_workflows, BranchPackageInstructions, BranchPackageParams, DefinitionError,
    EventFilter, RebuildPackageInstructions, RebuildPackageParams, StepInstructions,
    WorkflowDefinition, WorkflowFilters,
};
pub use ports::{Action, Authorizer, BuildService, PackageCatalog, SubscriptionStore};
pub use scmsync::ScmSyncUrl;
pub use subscription::{
    Channel, EventSubscription, EventType, ReceiverRole, SubscriptionKey, UpsertOutcome,
};
pub use types::{
    BranchOptions, FindOptions, Package, PackageRef, Project, Timestamp, WorkflowToken,
};
