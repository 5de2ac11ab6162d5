//! Event subscription records.
//!
//! A subscription binds a build outcome of one package to the SCM that
//! triggered the workflow: when the package finishes building, the status is
//! reported back through the token that created the subscription. Records are
//! keyed by (package, event type, token); steps only ever create them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PackageRef, Timestamp, TokenId, UserLogin, WorkflowRunId};

/// Build outcome a subscription reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    BuildSuccess,
    BuildFail,
}

impl EventType {
    /// The build outcomes reported back to the SCM.
    pub const BUILD_OUTCOMES: [EventType; 2] = [EventType::BuildFail, EventType::BuildSuccess];
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::BuildSuccess => f.write_str("Event::BuildSuccess"),
            EventType::BuildFail => f.write_str("Event::BuildFail"),
        }
    }
}

/// Delivery channel of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Report back to the originating SCM.
    Scm,
}

/// Role of the subscribed user with respect to the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverRole {
    Reader,
}

/// Identity of a subscription; the persistence upsert key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub package: PackageRef,
    pub eventtype: EventType,
    pub token: TokenId,
}

/// A subscription record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub eventtype: EventType,
    pub receiver_role: ReceiverRole,
    /// The token's executor.
    pub user: UserLogin,
    pub channel: Channel,
    pub enabled: bool,
    pub token: TokenId,
    pub package: PackageRef,
    /// Run that created the subscription.
    pub workflow_run: WorkflowRunId,
    /// Webhook payload the status report is composed from.
    pub payload: Value,
    pub created_at: Timestamp,
}

impl EventSubscription {
    /// Returns the upsert key of this record.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            package: self.package.clone(),
            eventtype: self.eventtype,
            token: self.token,
        }
    }
}

/// Result of a subscription upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with the key existed; one was stored.
    Created,
    /// A record with the key already existed and was left untouched.
    AlreadyPresent,
}
