//! Webhook event classification.
//!
//! Webhook payloads reach the engine already normalized into a flat map by
//! the receiving side (which also verified the signature):
//!
//! ```json
//! {
//!   "scm": "github",
//!   "event": "pull_request",
//!   "action": "opened",
//!   "pr_number": 1,
//!   "commit_sha": "123456789",
//!   "source_repository_full_name": "Iggy/hello_world",
//!   "target_repository_full_name": "openSUSE/open-build-service"
//! }
//! ```
//!
//! [`WebhookEvent::from_payload`] turns that map into a typed event. GitHub and
//! GitLab spell events and actions differently; both normalize to the same
//! [`EventKind`] and [`EventAction`] values so steps only ever consult the
//! predicates on [`WebhookEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{CommitSha, PullRequestNumber, RepositoryName};

/// The payload could not be classified.
#[derive(Debug, Error)]
pub enum MalformedPayload {
    /// The payload is not a JSON object of the expected shape.
    #[error("webhook payload is not valid: {0}")]
    Json(#[from] serde_json::Error),

    /// A field needed for classification is absent or blank.
    #[error("webhook payload has no '{field}'")]
    MissingField {
        /// Name of the missing payload field.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------

/// The SCM that sent the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scm {
    /// GitHub; pull request numbers and `pull_request` events.
    #[serde(rename = "github")]
    GitHub,
    /// GitLab; merge request iids and `* Hook` event names.
    #[serde(rename = "gitlab")]
    GitLab,
    /// Any other SCM; kept verbatim.
    Other(String),
}

impl Scm {
    fn parse(value: &str) -> Self {
        match value {
            "github" => Scm::GitHub,
            "gitlab" => Scm::GitLab,
            other => Scm::Other(other.to_string()),
        }
    }
}

/// What kind of SCM activity the event describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pull request (GitHub) or merge request (GitLab) changed.
    PullRequest,
    /// Commits were pushed to a branch.
    Push,
    /// A tag was pushed.
    TagPush,
    /// Any other event; kept verbatim.
    Other(String),
}

impl EventKind {
    fn parse(value: &str) -> Self {
        match value {
            "pull_request" | "Merge Request Hook" => EventKind::PullRequest,
            "push" | "Push Hook" => EventKind::Push,
            "Tag Push Hook" => EventKind::TagPush,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// What happened to the pull/merge request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// GitHub `opened`, GitLab `open`.
    Opened,
    /// New commits on the request: GitHub `synchronize`, GitLab `update`.
    Synchronize,
    /// GitHub `closed` (merged or not), GitLab `close`.
    Closed,
    /// GitLab `merge`.
    Merged,
    /// GitHub `reopened`, GitLab `reopen`.
    Reopened,
    /// Any other action; kept verbatim.
    Other(String),
}

impl EventAction {
    fn parse(value: &str) -> Self {
        match value {
            "opened" | "open" => EventAction::Opened,
            "synchronize" | "update" => EventAction::Synchronize,
            "closed" | "close" => EventAction::Closed,
            "merged" | "merge" => EventAction::Merged,
            "reopened" | "reopen" => EventAction::Reopened,
            other => EventAction::Other(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw payload
// ---------------------------------------------------------------------------

// Everything is optional here; required fields are checked explicitly so the
// error names the missing field instead of a serde position.
#[derive(Debug, Deserialize)]
struct RawPayload {
    scm: Option<String>,
    event: Option<String>,
    action: Option<String>,
    pr_number: Option<u64>,
    commit_sha: Option<String>,
    #[serde(alias = "source_repo")]
    source_repository_full_name: Option<String>,
    #[serde(alias = "target_repo")]
    target_repository_full_name: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MalformedPayload> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(MalformedPayload::MissingField { field })
}

// ---------------------------------------------------------------------------
// WebhookEvent
// ---------------------------------------------------------------------------

/// A classified webhook event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// The SCM that sent the event.
    pub scm: Scm,
    /// The event kind.
    pub kind: EventKind,
    /// The action within the event kind.
    pub action: EventAction,
    /// Pull/merge request number; absent for push events.
    pub pr_number: Option<PullRequestNumber>,
    /// Head commit of the change.
    pub commit_sha: Option<CommitSha>,
    /// Repository the change comes from (the fork for cross-repository PRs).
    pub source_repository: Option<RepositoryName>,
    /// Repository the change targets.
    pub target_repository: Option<RepositoryName>,
    /// The payload exactly as received, kept for status reporting.
    pub payload: Value,
}

impl WebhookEvent {
    /// Classifies a normalized webhook payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload`] if the payload is not an object or lacks
    /// `scm`, `event` or `action`.
    pub fn from_payload(payload: Value) -> Result<Self, MalformedPayload> {
        let raw = RawPayload::deserialize(&payload)?;

        let scm = Scm::parse(&required(raw.scm, "scm")?);
        let kind = EventKind::parse(&required(raw.event, "event")?);
        let action = EventAction::parse(&required(raw.action, "action")?);

        Ok(Self {
            scm,
            kind,
            action,
            pr_number: raw.pr_number.map(PullRequestNumber::new),
            commit_sha: raw.commit_sha.and_then(CommitSha::new),
            source_repository: raw.source_repository_full_name.and_then(RepositoryName::new),
            target_repository: raw.target_repository_full_name.and_then(RepositoryName::new),
            payload,
        })
    }

    /// Classifies a payload from its JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`WebhookEvent::from_payload`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MalformedPayload> {
        Self::from_payload(serde_json::from_slice(bytes)?)
    }

    /// Returns `true` for pull request and merge request events.
    pub fn is_pull_request(&self) -> bool {
        self.kind == EventKind::PullRequest
    }

    /// Returns `true` for branch and tag pushes.
    pub fn is_push(&self) -> bool {
        matches!(self.kind, EventKind::Push | EventKind::TagPush)
    }

    /// A pull/merge request was opened.
    pub fn is_new_pull_request(&self) -> bool {
        self.is_pull_request() && self.action == EventAction::Opened
    }

    /// New commits were pushed to an open pull/merge request.
    pub fn is_updated_pull_request(&self) -> bool {
        self.is_pull_request() && self.action == EventAction::Synchronize
    }

    /// A pull/merge request was closed or merged.
    pub fn is_closed_or_merged_pull_request(&self) -> bool {
        self.is_pull_request() && matches!(self.action, EventAction::Closed | EventAction::Merged)
    }

    /// A closed pull/merge request was reopened.
    pub fn is_reopened_pull_request(&self) -> bool {
        self.is_pull_request() && self.action == EventAction::Reopened
    }
}
