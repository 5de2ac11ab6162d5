//! In-memory collaborators for step tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use workflow::{
    Action, AuthorizationError, Authorizer, BackendError, BranchOptions, BuildService,
    EventSubscription, FindOptions, Package, PackageCatalog, PackageName, PackageRef, Project,
    ProjectName, StoreError, SubscriptionKey, SubscriptionStore, TokenId, UpsertOutcome,
    UserLogin, WebhookEvent, WorkflowToken,
};

use crate::context::{Collaborators, StepContext};

pub fn project_name(name: &str) -> ProjectName {
    ProjectName::new(name).unwrap()
}

pub fn package_ref(project: &str, package: &str) -> PackageRef {
    PackageRef::new(project_name(project), PackageName::new(package).unwrap())
}

/// A GitHub pull request event for PR #1 of `openSUSE/open-build-service`.
pub fn webhook(action: &str) -> WebhookEvent {
    WebhookEvent::from_payload(json!({
        "scm": "github",
        "event": "pull_request",
        "action": action,
        "pr_number": 1,
        "source_repository_full_name": "reponame",
        "commit_sha": "123456789",
        "target_repository_full_name": "openSUSE/open-build-service"
    }))
    .unwrap()
}

/// A GitLab merge request event with the given action.
pub fn gitlab_webhook(action: &str) -> WebhookEvent {
    WebhookEvent::from_payload(json!({
        "scm": "gitlab",
        "event": "Merge Request Hook",
        "action": action,
        "pr_number": 1,
        "source_repository_full_name": "reponame",
        "commit_sha": "123456789",
        "target_repository_full_name": "openSUSE/open-build-service"
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Build service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StoredPackage {
    pub scmsync: Option<String>,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct BackendState {
    projects: BTreeMap<ProjectName, Project>,
    packages: BTreeMap<PackageRef, StoredPackage>,
    branches: Vec<(PackageRef, PackageRef, BranchOptions)>,
    rebuilds: Vec<PackageRef>,
    branch_failure: Option<BackendError>,
    rebuild_failure: Option<BackendError>,
    hide_next_lookup_of: Option<PackageRef>,
}

/// Catalog and build service over in-memory maps.
#[derive(Debug, Default)]
pub struct InMemoryBuildService {
    state: Mutex<BackendState>,
}

impl InMemoryBuildService {
    pub fn add_project(&self, name: &str, scmsync: Option<&str>, repositories: &[&str]) {
        let project = Project {
            name: project_name(name),
            scmsync: scmsync.map(Into::into),
            repositories: repositories.iter().map(|r| r.to_string()).collect(),
        };
        self.state
            .lock()
            .unwrap()
            .projects
            .insert(project.name.clone(), project);
    }

    pub fn add_package(&self, project: &str, package: &str, scmsync: Option<&str>) {
        let stored = StoredPackage {
            scmsync: scmsync.map(Into::into),
            files: BTreeMap::from([("hello_world.spec".to_string(), "Name: hello".to_string())]),
        };
        self.state
            .lock()
            .unwrap()
            .packages
            .insert(package_ref(project, package), stored);
    }

    pub fn fail_branch_with(&self, error: BackendError) {
        self.state.lock().unwrap().branch_failure = Some(error);
    }

    pub fn fail_rebuild_with(&self, error: BackendError) {
        self.state.lock().unwrap().rebuild_failure = Some(error);
    }

    /// Makes the next lookup of `package` miss even if it exists, emulating a
    /// concurrent delivery creating it between check and branch.
    pub fn hide_next_lookup_of(&self, package: PackageRef) {
        self.state.lock().unwrap().hide_next_lookup_of = Some(package);
    }

    pub fn package_count(&self) -> usize {
        self.state.lock().unwrap().packages.len()
    }

    pub fn package(&self, package: &PackageRef) -> Option<StoredPackage> {
        self.state.lock().unwrap().packages.get(package).cloned()
    }

    pub fn project(&self, name: &str) -> Option<Project> {
        self.state
            .lock()
            .unwrap()
            .projects
            .get(&project_name(name))
            .cloned()
    }

    pub fn branches(&self) -> Vec<(PackageRef, PackageRef, BranchOptions)> {
        self.state.lock().unwrap().branches.clone()
    }

    pub fn rebuilds(&self) -> Vec<PackageRef> {
        self.state.lock().unwrap().rebuilds.clone()
    }
}

fn not_found(resource: impl std::fmt::Display) -> BackendError {
    BackendError::NotFound {
        resource: resource.to_string(),
    }
}

#[async_trait]
impl PackageCatalog for InMemoryBuildService {
    async fn find_project(&self, name: &ProjectName) -> Result<Option<Project>, BackendError> {
        Ok(self.state.lock().unwrap().projects.get(name).cloned())
    }

    async fn find_package(
        &self,
        package: &PackageRef,
        options: FindOptions,
    ) -> Result<Option<Package>, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.hide_next_lookup_of.as_ref() == Some(package) {
            state.hide_next_lookup_of = None;
            return Ok(None);
        }
        let name = if options.follow_multibuild {
            package.package.multibuild_container()
        } else {
            package.package.clone()
        };
        let key = PackageRef::new(package.project.clone(), name.clone());
        Ok(state.packages.get(&key).map(|stored| Package {
            project: key.project.clone(),
            name,
            scmsync: stored.scmsync.clone(),
        }))
    }
}

#[async_trait]
impl BuildService for InMemoryBuildService {
    async fn branch(
        &self,
        source: &PackageRef,
        target: &PackageRef,
        options: BranchOptions,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.branch_failure.clone() {
            return Err(error);
        }
        let Some(source_package) = state.packages.get(source).cloned() else {
            return Err(not_found(source));
        };
        if state.packages.contains_key(target) {
            return Err(BackendError::AlreadyExists {
                resource: target.to_string(),
            });
        }

        let repositories = match (options.add_repositories, state.projects.get(&source.project)) {
            (true, Some(project)) => project.repositories.clone(),
            _ => Vec::new(),
        };
        state
            .projects
            .entry(target.project.clone())
            .or_insert_with(|| Project {
                name: target.project.clone(),
                scmsync: None,
                repositories,
            });
        let files = if options.copy_sources {
            source_package.files
        } else {
            BTreeMap::new()
        };
        state.packages.insert(
            target.clone(),
            StoredPackage {
                scmsync: None,
                files,
            },
        );
        state.branches.push((source.clone(), target.clone(), options));
        Ok(())
    }

    async fn rebuild(&self, package: &PackageRef) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.rebuild_failure.clone() {
            return Err(error);
        }
        if !state.packages.contains_key(package) {
            return Err(not_found(package));
        }
        state.rebuilds.push(package.clone());
        Ok(())
    }

    async fn read_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
    ) -> Result<String, BackendError> {
        let state = self.state.lock().unwrap();
        state
            .packages
            .get(package)
            .and_then(|stored| stored.files.get(filename).cloned())
            .ok_or_else(|| not_found(format!("{package}/{filename}")))
    }

    async fn write_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
        content: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .packages
            .get_mut(package)
            .ok_or_else(|| not_found(package))?;
        stored.files.insert(filename.to_string(), content.to_string());
        Ok(())
    }

    async fn set_scm_sync(&self, package: &PackageRef, url: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .packages
            .get_mut(package)
            .ok_or_else(|| not_found(package))?;
        stored.scmsync = Some(url.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

/// Allows or denies everything, recording each request.
#[derive(Debug)]
pub struct StaticAuthorizer {
    allow: Mutex<bool>,
    requests: Mutex<Vec<(UserLogin, Action, PackageRef)>>,
}

impl StaticAuthorizer {
    pub fn allowing() -> Self {
        Self {
            allow: Mutex::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn deny_all(&self) {
        *self.allow.lock().unwrap() = false;
    }

    pub fn requests(&self) -> Vec<(UserLogin, Action, PackageRef)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(
        &self,
        executor: &UserLogin,
        action: Action,
        target: &PackageRef,
    ) -> Result<(), AuthorizationError> {
        self.requests
            .lock()
            .unwrap()
            .push((executor.clone(), action, target.clone()));
        if *self.allow.lock().unwrap() {
            Ok(())
        } else {
            Err(AuthorizationError {
                executor: executor.clone(),
                action,
                target: target.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    records: Mutex<BTreeMap<SubscriptionKey, EventSubscription>>,
}

impl InMemorySubscriptionStore {
    pub fn all(&self) -> Vec<EventSubscription> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn count_of(&self, eventtype: workflow::EventType) -> usize {
        self.all()
            .iter()
            .filter(|s| s.eventtype == eventtype)
            .count()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn upsert(&self, subscription: EventSubscription) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.lock().unwrap();
        let key = subscription.key();
        if records.contains_key(&key) {
            return Ok(UpsertOutcome::AlreadyPresent);
        }
        records.insert(key, subscription);
        Ok(UpsertOutcome::Created)
    }

    async fn list_for_package(
        &self,
        package: &PackageRef,
    ) -> Result<Vec<EventSubscription>, StoreError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|s| &s.package == package)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Shared collaborators; every [`Fixture::context`] call starts a new run.
pub struct Fixture {
    pub backend: Arc<InMemoryBuildService>,
    pub authorizer: Arc<StaticAuthorizer>,
    pub store: Arc<InMemorySubscriptionStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(InMemoryBuildService::default()),
            authorizer: Arc::new(StaticAuthorizer::allowing()),
            store: Arc::new(InMemorySubscriptionStore::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalog: self.backend.clone(),
            build_service: self.backend.clone(),
            authorizer: self.authorizer.clone(),
            subscriptions: self.store.clone(),
        }
    }

    pub fn token() -> WorkflowToken {
        WorkflowToken {
            id: TokenId::new(7),
            executor: UserLogin::new("Iggy").unwrap(),
        }
    }

    pub fn context(&self) -> StepContext {
        StepContext::new(self.collaborators(), Self::token())
    }
}
