//! The `branch_package` step.
//!
//! Branches a package into a project dedicated to one pull/merge request and
//! keeps that branch pointed at the request's head commit:
//!
//! - The target project is derived from the request, so every delivery for
//!   the same request lands on the same project:
//!   `<target_project>:<target-repo-with-colons>:PR-<number>`.
//! - If the branched package does not exist yet it is created; if it exists
//!   (a later commit, or a concurrent delivery won the race) it is updated in
//!   place.
//! - Packages synced from an external repository are branched without sources
//!   and get an `scmsync` URL pinned to the head commit. Other packages get a
//!   `_branch_request` file describing the request, which the build service's
//!   source service turns into a checkout of the head commit.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};
use workflow::{
    scmsync, Action, BackendError, BranchOptions, BranchPackageInstructions, BranchPackageParams,
    CommitSha, FindOptions, Package, PackageRef, ProjectName, Scm, StepError, ValidationError,
    WebhookEvent,
};

use crate::context::StepContext;
use crate::step::Step;

/// Source file that ties a branched package to its pull/merge request.
pub const BRANCH_REQUEST_FILE: &str = "_branch_request";

/// Branches a package for a pull/merge request or updates the existing branch.
#[derive(Debug, Clone)]
pub struct BranchPackageStep {
    instructions: BranchPackageInstructions,
    webhook: WebhookEvent,
}

/// Identities resolved before branching.
#[derive(Debug, Clone)]
pub struct BranchPlan {
    params: BranchPackageParams,
    source: Package,
    target: PackageRef,
    commit_sha: CommitSha,
    /// Pinned `scmsync` URL when the source is synced externally.
    scmsync: Option<String>,
}

impl BranchPackageStep {
    pub fn new(instructions: BranchPackageInstructions, webhook: WebhookEvent) -> Self {
        Self {
            instructions,
            webhook,
        }
    }

    /// Returns `true` when repositories must not be copied into the target.
    pub fn skip_repositories(&self) -> bool {
        self.instructions.skip_repositories()
    }

    /// Name of the project the branch lives in.
    fn target_project_name(&self, prefix: &ProjectName) -> Result<ProjectName, ValidationError> {
        if !self.webhook.is_pull_request() {
            return Ok(prefix.clone());
        }
        let pr_number = self
            .webhook
            .pr_number
            .ok_or(ValidationError::MissingEventField { field: "pr_number" })?;
        let repository =
            self.webhook
                .target_repository
                .as_ref()
                .ok_or(ValidationError::MissingEventField {
                    field: "target_repository_full_name",
                })?;
        ProjectName::new(format!(
            "{prefix}:{}:PR-{pr_number}",
            repository.as_project_path()
        ))
        .ok_or(ValidationError::MissingEventField {
            field: "target_repository_full_name",
        })
    }

    /// Contents of the [`BRANCH_REQUEST_FILE`], shaped like the SCM's own
    /// webhook so the source service can check out the head commit.
    fn branch_request(&self, commit_sha: &CommitSha) -> Value {
        let number = self.webhook.pr_number.map(|n| n.as_u64());
        let source = self.webhook.source_repository.as_ref().map(|r| r.as_str());
        match self.webhook.scm {
            Scm::GitLab => json!({
                "object_kind": "merge_request",
                "project": { "path_with_namespace": source },
                "object_attributes": {
                    "iid": number,
                    "last_commit": { "id": commit_sha.as_str() },
                    "source": { "default_branch": commit_sha.as_str() },
                },
            }),
            _ => json!({
                "action": "opened",
                "number": number,
                "pull_request": {
                    "number": number,
                    "head": {
                        "repo": { "full_name": source },
                        "sha": commit_sha.as_str(),
                    },
                },
            }),
        }
    }

    /// Points an existing branched package at the request's head commit.
    async fn update_branch(&self, ctx: &StepContext, plan: &BranchPlan) -> Result<(), StepError> {
        let result = match &plan.scmsync {
            Some(url) => {
                debug!(target = %plan.target, %url, "pinning scmsync");
                ctx.build_service().set_scm_sync(&plan.target, url).await
            }
            None => {
                let content = self.branch_request(&plan.commit_sha).to_string();
                debug!(target = %plan.target, "writing {BRANCH_REQUEST_FILE}");
                ctx.build_service()
                    .write_source_file(&plan.target, BRANCH_REQUEST_FILE, &content)
                    .await
            }
        };
        result.map_err(|e| match e {
            BackendError::NoPermission { message } => StepError::NoPermission {
                action: Action::Branch,
                target: plan.target.clone(),
                message,
            },
            other => StepError::Backend(other),
        })
    }
}

#[async_trait]
impl Step for BranchPackageStep {
    type Plan = BranchPlan;

    fn name(&self) -> &'static str {
        BranchPackageInstructions::STEP
    }

    fn webhook(&self) -> &WebhookEvent {
        &self.webhook
    }

    async fn validate(&self, ctx: &StepContext) -> Result<BranchPlan, StepError> {
        let params = self.instructions.validate()?;
        let target_project = self.target_project_name(&params.target_project)?;
        let commit_sha = self
            .webhook
            .commit_sha
            .clone()
            .ok_or(ValidationError::MissingEventField {
                field: "commit_sha",
            })?;

        let requested = PackageRef::new(params.source_project.clone(), params.source_package.clone());
        let source_not_found = || StepError::SourceNotFound {
            package: requested.clone(),
        };
        let source = match ctx
            .catalog()
            .find_package(&requested, FindOptions::no_source_follow_multibuild())
            .await
        {
            Ok(Some(package)) => package,
            Ok(None) | Err(BackendError::NotFound { .. }) => return Err(source_not_found()),
            Err(e) => return Err(e.into()),
        };
        let project = match ctx.catalog().find_project(&source.project).await {
            Ok(Some(project)) => project,
            Ok(None) | Err(BackendError::NotFound { .. }) => return Err(source_not_found()),
            Err(e) => return Err(e.into()),
        };

        let scmsync = scmsync::resolve_for_branch(
            source.scmsync.as_deref(),
            project.scmsync.as_deref(),
            &source.name,
            &commit_sha,
        );
        let target_package = params
            .target_package
            .clone()
            .unwrap_or_else(|| source.name.clone());

        Ok(BranchPlan {
            target: PackageRef::new(target_project, target_package),
            params,
            source,
            commit_sha,
            scmsync,
        })
    }

    fn authorization(&self, plan: &BranchPlan) -> (Action, PackageRef) {
        (Action::Branch, plan.source.reference())
    }

    async fn execute(&self, ctx: &StepContext, plan: BranchPlan) -> Result<PackageRef, StepError> {
        let existing = ctx
            .catalog()
            .find_package(&plan.target, FindOptions::default())
            .await?;

        if existing.is_some() {
            debug!(target = %plan.target, "branched package exists; updating in place");
        } else {
            let source = plan.source.reference();
            let options = BranchOptions {
                add_repositories: !plan.params.skip_repositories,
                copy_sources: plan.scmsync.is_none(),
            };
            match ctx.build_service().branch(&source, &plan.target, options).await {
                Ok(()) => info!(%source, target = %plan.target, "package branched"),
                Err(BackendError::AlreadyExists { .. }) => {
                    debug!(target = %plan.target, "branched concurrently; updating in place")
                }
                Err(BackendError::NotFound { .. }) => {
                    return Err(StepError::SourceNotFound { package: source })
                }
                Err(BackendError::NoPermission { message }) => {
                    return Err(StepError::NoPermission {
                        action: Action::Branch,
                        target: plan.target.clone(),
                        message,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.update_branch(ctx, &plan).await?;
        Ok(plan.target)
    }
}
