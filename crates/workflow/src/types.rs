//! Shared value types for the workflow domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types
//! combine identifiers into the records steps operate on: package references,
//! resolved project/package records, lookup and branch options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PackageName, ProjectName, TokenId, UserLogin};

// ---------------------------------------------------------------------------
// Package identity
// ---------------------------------------------------------------------------

/// Identifies a buildable unit: a package inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageRef {
    /// The owning project.
    pub project: ProjectName,
    /// The package name within the project.
    pub package: PackageName,
}

impl PackageRef {
    /// Creates a new [`PackageRef`].
    pub fn new(project: ProjectName, package: PackageName) -> Self {
        Self { project, package }
    }
}

impl std::fmt::Display for PackageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.package)
    }
}

// ---------------------------------------------------------------------------
// Resolved records
// ---------------------------------------------------------------------------

/// A project as resolved by the [`crate::ports::PackageCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    pub name: ProjectName,

    /// External repository the whole project is synced from, if any.
    ///
    /// Packages without their own `scmsync` inherit this URL with a
    /// `subdir=<package>` query.
    pub scmsync: Option<String>,

    /// Names of the build repositories configured on the project.
    pub repositories: Vec<String>,
}

/// A package as resolved by the [`crate::ports::PackageCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Project the package lives in.
    pub project: ProjectName,

    /// Package name. When resolved with
    /// [`FindOptions::follow_multibuild`] this is the multibuild container.
    pub name: PackageName,

    /// External repository the package is synced from, if any.
    pub scmsync: Option<String>,
}

impl Package {
    /// Returns the reference identifying this package.
    pub fn reference(&self) -> PackageRef {
        PackageRef::new(self.project.clone(), self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// Collaborator options
// ---------------------------------------------------------------------------

/// How a package lookup is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Whether the package's source files must be available locally.
    pub use_source: bool,

    /// Whether a `container:flavor` name resolves to the multibuild container.
    pub follow_multibuild: bool,
}

impl FindOptions {
    /// Lookup used before rebuilding: no sources needed, flavors resolve to
    /// their top-level container.
    pub fn no_source_follow_multibuild() -> Self {
        Self {
            use_source: false,
            follow_multibuild: true,
        }
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            use_source: true,
            follow_multibuild: false,
        }
    }
}

/// Options passed to [`crate::ports::BuildService::branch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOptions {
    /// Copy the build repositories of the source project into the target.
    pub add_repositories: bool,

    /// Branch with a link to, and a copy of, the source files. `false`
    /// creates an empty package instead; its sources come from the
    /// `scmsync` pointer set on it afterwards.
    pub copy_sources: bool,
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// The workflow token a delivery was authenticated with.
///
/// The executor is the principal every authorization check is made for, and
/// the user event subscriptions are created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowToken {
    /// Token identifier.
    pub id: TokenId,
    /// User the token acts on behalf of.
    pub executor: UserLogin,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
