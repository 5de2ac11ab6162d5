//! Error and retry-policy types for the workflow domain.
//!
//! [`StepError`] is what a step reports to its caller. Its variants keep the
//! failure kinds apart that webhook delivery retry logic and SCM status
//! reporting react to differently: bad instructions, refused authorization,
//! missing source, backend permission failure.
//!
//! Collaborator-level errors ([`BackendError`], [`StoreError`]) are produced by
//! the port implementations and mapped into [`StepError`] by the steps.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::Action;
use crate::{PackageRef, UserLogin};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Lets the caller that owns webhook delivery decide whether to process the
/// delivery again later.
///
/// - `Retryable` errors: build service unreachable, persistence unavailable.
/// - `NonRetryable` errors: invalid instructions, refused authorization,
///   missing source, missing permission. These need new input or a fix on
///   the build-service side first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without new input.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failure reported by the build service or the package catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The addressed project, package or file does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Path or name of the missing resource.
        resource: String,
    },

    /// The build service refused the operation for the authenticated user.
    #[error("no permission: {message}")]
    NoPermission {
        /// Message reported by the build service.
        message: String,
    },

    /// The resource the operation would create already exists.
    #[error("already exists: {resource}")]
    AlreadyExists {
        /// Path or name of the existing resource.
        resource: String,
    },

    /// The build service could not be reached or failed internally.
    #[error("build service unavailable: {message}")]
    Unavailable {
        /// Transport or server error description.
        message: String,
    },

    /// The build service answered with something that could not be understood.
    #[error("unexpected build service response: {message}")]
    InvalidResponse {
        /// Description of the unexpected response.
        message: String,
    },
}

impl BackendError {
    /// Returns whether the failed call may be repeated as-is.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            BackendError::Unavailable { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Failure reported by the subscription persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscription store error: {message}")]
pub struct StoreError {
    /// Description of the storage failure.
    pub message: String,
}

impl StoreError {
    /// Creates a [`StoreError`] from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The executor is not allowed to perform an action on a target.
///
/// Authorization fails closed: any collaborator failure while deciding is
/// reported as this error too.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{executor} is not authorized to {action} {target}")]
pub struct AuthorizationError {
    /// The principal the check was made for.
    pub executor: UserLogin,
    /// The refused action.
    pub action: Action,
    /// The resolved target of the action.
    pub target: PackageRef,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// The instructions or the event do not describe a step that can run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required instruction keys are absent or blank.
    #[error("the '{step}' step requires {}", keys.join(", "))]
    MissingInstructions {
        /// Step kind (as written in the workflow file).
        step: &'static str,
        /// The missing keys, in declaration order.
        keys: Vec<&'static str>,
    },

    /// An instruction has a value outside its allowed set.
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidInstruction {
        /// Instruction key.
        key: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The webhook event lacks data the step needs.
    #[error("webhook event has no {field}")]
    MissingEventField {
        /// Name of the missing event field.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Step errors
// ---------------------------------------------------------------------------

/// Errors reported by a workflow step.
///
/// Closing or reopening a pull request is not an error: those events complete
/// successfully without side effects.
#[derive(Debug, Error)]
pub enum StepError {
    /// The instructions are invalid; nothing was changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The executor is not allowed to perform the step; nothing was changed.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The referenced source project or package does not exist.
    #[error("source package {package} not found")]
    SourceNotFound {
        /// The package that could not be found.
        package: PackageRef,
    },

    /// The build service refused the operation for the executor.
    #[error("no permission to {action} {target}: {message}")]
    NoPermission {
        /// The refused action.
        action: Action,
        /// The package the action addressed.
        target: PackageRef,
        /// Message reported by the build service.
        message: String,
    },

    /// Any other build-service failure.
    #[error("build service call failed: {0}")]
    Backend(#[from] BackendError),

    /// Recording event subscriptions failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StepError {
    /// Returns whether the whole delivery may be processed again unchanged.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            StepError::Backend(e) => e.retry_policy(),
            StepError::Store(_) => RetryPolicy::Retryable { after: None },
            StepError::Validation(_)
            | StepError::Authorization(_)
            | StepError::SourceNotFound { .. }
            | StepError::NoPermission { .. } => RetryPolicy::NonRetryable,
        }
    }
}
