//! Collaborator port traits.
//!
//! Steps never reach the build service, the authorization framework or the
//! persistence layer directly; they are handed implementations of these traits.
//! Infrastructure crates provide the implementations.
//!
//! Every method must be safe to repeat with the same arguments: concurrent
//! deliveries for the same pull request converge on the same identities, so
//! lookups, branch-or-update and subscription upserts are all idempotent from
//! the caller's point of view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::subscription::{EventSubscription, UpsertOutcome};
use crate::{
    AuthorizationError, BackendError, BranchOptions, FindOptions, Package, PackageRef, Project,
    ProjectName, StoreError, UserLogin,
};

/// An action a step asks authorization for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Branch the target package.
    Branch,
    /// Rebuild the target package.
    Rebuild,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Branch => f.write_str("branch"),
            Action::Rebuild => f.write_str("rebuild"),
        }
    }
}

/// Project and package lookup.
#[async_trait]
pub trait PackageCatalog: Send + Sync {
    /// Looks up a project. `Ok(None)` if it does not exist.
    async fn find_project(&self, name: &ProjectName) -> Result<Option<Project>, BackendError>;

    /// Looks up a package. `Ok(None)` if it (or its project) does not exist.
    ///
    /// With [`FindOptions::follow_multibuild`] a `container:flavor` name
    /// resolves to the container package.
    async fn find_package(
        &self,
        package: &PackageRef,
        options: FindOptions,
    ) -> Result<Option<Package>, BackendError>;
}

/// Mutating build-service calls.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Branches `source` into `target`, creating the target project if needed.
    ///
    /// Fails with [`BackendError::AlreadyExists`] if `target` exists.
    async fn branch(
        &self,
        source: &PackageRef,
        target: &PackageRef,
        options: BranchOptions,
    ) -> Result<(), BackendError>;

    /// Triggers a rebuild of every build of `package`.
    async fn rebuild(&self, package: &PackageRef) -> Result<(), BackendError>;

    /// Reads a source file of `package`.
    async fn read_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
    ) -> Result<String, BackendError>;

    /// Creates or replaces a source file of `package`.
    async fn write_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
        content: &str,
    ) -> Result<(), BackendError>;

    /// Points `package` at an external repository.
    async fn set_scm_sync(&self, package: &PackageRef, url: &str) -> Result<(), BackendError>;
}

/// Authorization check. Fails closed.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` only if `executor` may perform `action` on `target`.
    async fn authorize(
        &self,
        executor: &UserLogin,
        action: Action,
        target: &PackageRef,
    ) -> Result<(), AuthorizationError>;
}

/// Event subscription persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Stores `subscription` unless a record with the same
    /// [`EventSubscription::key`] exists; existing records are not modified.
    async fn upsert(&self, subscription: EventSubscription) -> Result<UpsertOutcome, StoreError>;

    /// Lists the subscriptions of `package`.
    async fn list_for_package(
        &self,
        package: &PackageRef,
    ) -> Result<Vec<EventSubscription>, StoreError>;
}
