//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`ProjectName`] with a [`PackageName`] even though both are strings under
//! the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (SCM / build-service assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Integer-backed identifiers
// ---------------------------------------------------------------------------

u64_id! {
    /// A pull request (GitHub) or merge request (GitLab) number.
    ///
    /// GitLab calls this the merge request `iid`; both are scoped to the
    /// target repository.
    PullRequestNumber
}

u64_id! {
    /// Identifies the workflow token a webhook delivery was authenticated with.
    TokenId
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers (generated internally)
// ---------------------------------------------------------------------------

/// Identifies one processing run of a webhook delivery.
///
/// Generated fresh for every delivery; propagated through spans and stored on
/// event subscriptions so status reports can be traced back to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowRunId(Uuid);

impl WorkflowRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkflowRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// String-backed identifiers (build service and SCM names)
// ---------------------------------------------------------------------------

string_id! {
    /// A build-service project name (e.g. `"home:Iggy"`, `"openSUSE:Factory"`).
    ///
    /// Colons separate the levels of the project namespace.
    ProjectName
}

string_id! {
    /// A build-service package name within a project.
    ///
    /// A name of the form `"container:flavor"` addresses one multibuild flavor
    /// of the `container` package.
    PackageName
}

string_id! {
    /// A commit SHA as delivered by the SCM (full or abbreviated).
    CommitSha
}

string_id! {
    /// Full name of an SCM repository (`"owner/repo"`, or `"group/subgroup/repo"`
    /// on GitLab).
    RepositoryName
}

string_id! {
    /// Login of a build-service user (the executor of a workflow token).
    UserLogin
}

impl PackageName {
    /// Returns the multibuild container this name belongs to.
    ///
    /// For a plain package name this is the name itself.
    pub fn multibuild_container(&self) -> PackageName {
        match self.0.split_once(':') {
            Some((container, _)) if !container.is_empty() => Self(container.to_string()),
            _ => self.clone(),
        }
    }

    /// Returns the multibuild flavor part of the name, if any.
    pub fn multibuild_flavor(&self) -> Option<&str> {
        self.0
            .split_once(':')
            .map(|(_, flavor)| flavor)
            .filter(|flavor| !flavor.is_empty())
    }
}

impl RepositoryName {
    /// Returns the repository name with path separators turned into project
    /// namespace separators (`"openSUSE/open-build-service"` becomes
    /// `"openSUSE:open-build-service"`).
    pub fn as_project_path(&self) -> String {
        self.0.replace('/', ":")
    }
}
