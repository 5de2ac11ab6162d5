//! Workflow definitions and per-step instructions.
//!
//! A workflow file maps workflow names to a list of steps and optional filters:
//!
//! ```yaml
//! pr_build:
//!   steps:
//!     - branch_package:
//!         source_project: home:Iggy
//!         source_package: hello_world
//!         target_project: home:Iggy:CI
//!     - rebuild_package:
//!         project: home:Iggy
//!         package: hello_world
//!   filters:
//!     event: pull_request
//! ```
//!
//! Each step kind has its own instruction record. The records deserialize
//! leniently (every key optional) and are turned into typed parameters by
//! `validate`, which reports every missing key at once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventKind, WebhookEvent};
use crate::{PackageName, ProjectName, ValidationError};

// ---------------------------------------------------------------------------
// Step instructions
// ---------------------------------------------------------------------------

/// Instructions for one step, tagged with the step kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInstructions {
    /// Branch a package for a pull/merge request.
    BranchPackage(BranchPackageInstructions),
    /// Rebuild an existing package.
    RebuildPackage(RebuildPackageInstructions),
}

impl StepInstructions {
    /// The step kind as written in workflow files.
    pub fn kind(&self) -> &'static str {
        match self {
            StepInstructions::BranchPackage(_) => BranchPackageInstructions::STEP,
            StepInstructions::RebuildPackage(_) => RebuildPackageInstructions::STEP,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Raw `branch_package` instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPackageInstructions {
    /// Project holding the package to branch.
    pub source_project: Option<String>,
    /// Package to branch; a multibuild flavor resolves to its container.
    pub source_package: Option<String>,
    /// Prefix for the per-request target project, or the target project
    /// itself for push events.
    pub target_project: Option<String>,
    /// Name of the branched package; defaults to the source package name.
    pub target_package: Option<String>,
    /// `enabled` (default) or `disabled`.
    pub add_repositories: Option<String>,
}

/// Validated `branch_package` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPackageParams {
    pub source_project: ProjectName,
    pub source_package: PackageName,
    /// Prefix of the per-request target project.
    pub target_project: ProjectName,
    pub target_package: Option<PackageName>,
    pub skip_repositories: bool,
}

impl BranchPackageInstructions {
    /// Step kind as written in workflow files.
    pub const STEP: &'static str = "branch_package";

    /// Keys that must be present and non-blank.
    pub const REQUIRED_KEYS: [&'static str; 3] =
        ["source_project", "source_package", "target_project"];

    /// Returns `true` only when `add_repositories` is literally `disabled`.
    pub fn skip_repositories(&self) -> bool {
        self.add_repositories.as_deref() == Some("disabled")
    }

    /// Checks the instructions and converts them into typed parameters.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingInstructions`] listing every absent or blank
    /// required key, or [`ValidationError::InvalidInstruction`] for an
    /// `add_repositories` value other than `enabled`/`disabled`.
    pub fn validate(&self) -> Result<BranchPackageParams, ValidationError> {
        let source_project = present(&self.source_project).and_then(ProjectName::new);
        let source_package = present(&self.source_package).and_then(PackageName::new);
        let target_project = present(&self.target_project).and_then(ProjectName::new);

        let (Some(source_project), Some(source_package), Some(target_project)) =
            (&source_project, &source_package, &target_project)
        else {
            let absent = [
                source_project.is_none(),
                source_package.is_none(),
                target_project.is_none(),
            ];
            return Err(ValidationError::MissingInstructions {
                step: Self::STEP,
                keys: Self::REQUIRED_KEYS
                    .iter()
                    .zip(absent)
                    .filter(|(_, absent)| *absent)
                    .map(|(key, _)| *key)
                    .collect(),
            });
        };

        let add_repositories = self.add_repositories.as_deref();
        match add_repositories.filter(|value| !value.trim().is_empty()) {
            None | Some("enabled") | Some("disabled") => {}
            Some(other) => {
                return Err(ValidationError::InvalidInstruction {
                    key: "add_repositories",
                    value: other.to_string(),
                    reason: "expected 'enabled' or 'disabled'",
                })
            }
        }

        Ok(BranchPackageParams {
            source_project: source_project.clone(),
            source_package: source_package.clone(),
            target_project: target_project.clone(),
            target_package: present(&self.target_package).and_then(PackageName::new),
            skip_repositories: self.skip_repositories(),
        })
    }
}

/// Raw `rebuild_package` instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildPackageInstructions {
    pub project: Option<String>,
    pub package: Option<String>,
}

/// Validated `rebuild_package` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPackageParams {
    pub project: ProjectName,
    /// May name a multibuild flavor; the step rebuilds its container.
    pub package: PackageName,
}

impl RebuildPackageInstructions {
    /// Step kind as written in workflow files.
    pub const STEP: &'static str = "rebuild_package";

    /// Keys that must be present and non-blank.
    pub const REQUIRED_KEYS: [&'static str; 2] = ["project", "package"];

    /// Checks the instructions and converts them into typed parameters.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingInstructions`] listing every absent or blank
    /// required key.
    pub fn validate(&self) -> Result<RebuildPackageParams, ValidationError> {
        let project = present(&self.project).and_then(ProjectName::new);
        let package = present(&self.package).and_then(PackageName::new);
        match (project, package) {
            (Some(project), Some(package)) => Ok(RebuildPackageParams { project, package }),
            (project, package) => {
                let mut keys = Vec::new();
                if project.is_none() {
                    keys.push("project");
                }
                if package.is_none() {
                    keys.push("package");
                }
                Err(ValidationError::MissingInstructions {
                    step: Self::STEP,
                    keys,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow definitions
// ---------------------------------------------------------------------------

/// Error loading a workflow file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file is not valid YAML or does not have the expected shape.
    #[error("invalid workflow file: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// The file defines no workflows.
    #[error("workflow file defines no workflows")]
    NoWorkflows,

    /// A workflow has no steps.
    #[error("workflow '{workflow}' has no steps")]
    NoSteps {
        /// Name of the offending workflow.
        workflow: String,
    },
}

/// Event kinds a workflow can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    PullRequest,
    Push,
    TagPush,
}

impl EventFilter {
    /// Returns `true` if `event` is of the kind this filter selects.
    pub fn matches(self, event: &WebhookEvent) -> bool {
        matches!(
            (self, &event.kind),
            (EventFilter::PullRequest, EventKind::PullRequest)
                | (EventFilter::Push, EventKind::Push)
                | (EventFilter::TagPush, EventKind::TagPush)
        )
    }
}

/// Filters deciding whether a workflow runs for an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFilters {
    pub event: Option<EventFilter>,
}

/// One named workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(skip)]
    pub name: String,
    pub steps: Vec<StepInstructions>,
    #[serde(default)]
    pub filters: WorkflowFilters,
}

impl WorkflowDefinition {
    /// Returns `true` if the workflow's filters accept `event`.
    pub fn applies_to(&self, event: &WebhookEvent) -> bool {
        self.filters.event.map_or(true, |filter| filter.matches(event))
    }
}

/// Parses a workflow file, keeping the workflows in file order.
///
/// # Errors
///
/// See [`DefinitionError`].
pub fn parse_workflows(yaml: &str) -> Result<Vec<WorkflowDefinition>, DefinitionError> {
    let document: serde_yaml_ng::Mapping = serde_yaml_ng::from_str(yaml)?;
    if document.is_empty() {
        return Err(DefinitionError::NoWorkflows);
    }

    let mut workflows = Vec::with_capacity(document.len());
    for (name, body) in document {
        let name: String = serde_yaml_ng::from_value(name)?;
        let mut workflow: WorkflowDefinition = serde_yaml_ng::from_value(body)?;
        if workflow.steps.is_empty() {
            return Err(DefinitionError::NoSteps { workflow: name });
        }
        workflow.name = name;
        workflows.push(workflow);
    }
    Ok(workflows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn branch(add_repositories: Option<&str>) -> BranchPackageInstructions {
        BranchPackageInstructions {
            source_project: Some("foo_project".into()),
            source_package: Some("bar_package".into()),
            target_project: Some("home:Iggy".into()),
            target_package: None,
            add_repositories: add_repositories.map(Into::into),
        }
    }

    #[rstest]
    #[case(Some("enabled"), false)]
    #[case(Some("disabled"), true)]
    #[case(None, false)]
    fn skip_repositories_only_for_disabled(#[case] value: Option<&str>, #[case] expected: bool) {
        let instructions = branch(value);
        assert_eq!(instructions.skip_repositories(), expected);
        assert_eq!(instructions.validate().unwrap().skip_repositories, expected);
    }

    #[test]
    fn unknown_add_repositories_value_is_invalid() {
        let err = branch(Some("sometimes")).validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidInstruction {
                key: "add_repositories",
                ..
            }
        ));
    }

    #[test]
    fn branch_reports_every_missing_key() {
        let instructions = BranchPackageInstructions {
            source_project: Some("   ".into()),
            target_project: Some("home:Iggy".into()),
            ..Default::default()
        };
        assert_eq!(
            instructions.validate().unwrap_err(),
            ValidationError::MissingInstructions {
                step: "branch_package",
                keys: vec!["source_project", "source_package"],
            }
        );
    }

    #[test]
    fn branch_target_package_is_optional() {
        let mut instructions = branch(None);
        assert_eq!(instructions.validate().unwrap().target_package, None);

        instructions.target_package = Some("renamed".into());
        assert_eq!(
            instructions.validate().unwrap().target_package,
            PackageName::new("renamed")
        );
    }

    #[rstest]
    #[case(None, None, vec!["project", "package"])]
    #[case(Some("foo_project"), None, vec!["package"])]
    #[case(None, Some("bar_package"), vec!["project"])]
    #[case(Some(""), Some("bar_package"), vec!["project"])]
    fn rebuild_requires_project_and_package(
        #[case] project: Option<&str>,
        #[case] package: Option<&str>,
        #[case] keys: Vec<&'static str>,
    ) {
        let instructions = RebuildPackageInstructions {
            project: project.map(Into::into),
            package: package.map(Into::into),
        };
        assert_eq!(
            instructions.validate().unwrap_err(),
            ValidationError::MissingInstructions {
                step: "rebuild_package",
                keys,
            }
        );
    }

    #[test]
    fn parses_workflow_file_in_order() {
        let yaml = r#"
pr_build:
  steps:
    - branch_package:
        source_project: home:Iggy
        source_package: hello_world
        target_project: home:Iggy:CI
        add_repositories: disabled
  filters:
    event: pull_request
rebuild_master:
  steps:
    - rebuild_package:
        project: home:Iggy
        package: hello_world
"#;
        let workflows = parse_workflows(yaml).unwrap();
        assert_eq!(workflows.len(), 2);

        assert_eq!(workflows[0].name, "pr_build");
        assert_eq!(workflows[0].filters.event, Some(EventFilter::PullRequest));
        let StepInstructions::BranchPackage(branch) = &workflows[0].steps[0] else {
            panic!("expected branch_package, got {:?}", workflows[0].steps[0]);
        };
        assert!(branch.skip_repositories());

        assert_eq!(workflows[1].name, "rebuild_master");
        assert_eq!(workflows[1].filters.event, None);
        assert_eq!(workflows[1].steps[0].kind(), "rebuild_package");
    }

    #[test]
    fn workflow_without_steps_is_rejected() {
        let err = parse_workflows("empty:\n  steps: []\n").unwrap_err();
        assert!(matches!(err, DefinitionError::NoSteps { workflow } if workflow == "empty"));
    }

    #[test]
    fn unknown_step_kind_is_rejected() {
        let yaml = "wf:\n  steps:\n    - trigger_services:\n        project: a\n";
        assert!(matches!(
            parse_workflows(yaml).unwrap_err(),
            DefinitionError::Yaml(_)
        ));
    }
}
