//! HTTP client for the build service's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};
use workflow::{
    BackendError, BranchOptions, BuildService, FindOptions, Package, PackageCatalog, PackageName,
    PackageRef, Project, ProjectName,
};

use crate::meta::{self, PackageMeta, ProjectMeta, Status};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status code the build service reports when a branch target exists.
const DOUBLE_BRANCH_PACKAGE: &str = "double_branch_package";

/// Connection settings.
#[derive(Debug, Clone)]
pub struct BuildServiceConfig {
    /// API root, e.g. `https://api.example.org`.
    pub url: String,
    pub user: String,
    pub password: SecretString,
    pub timeout: Option<Duration>,
}

/// The client could not be constructed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid build service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Build service adapter implementing [`PackageCatalog`] and [`BuildService`].
#[derive(Clone)]
pub struct BuildServiceClient {
    base_url: Url,
    user: String,
    password: SecretString,
    client: reqwest::Client,
}

impl std::fmt::Debug for BuildServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildServiceClient")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl BuildServiceClient {
    pub fn new(config: BuildServiceConfig) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: config.url.clone(),
            reason: reason.to_string(),
        };
        let base_url = Url::parse(&config.url).map_err(|e| invalid(&e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a base URL"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;
        Ok(Self {
            base_url,
            user: config.user,
            password: config.password,
            client,
        })
    }

    /// Builds an API URL from raw path segments, percent-encoding each one.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidResponse {
                message: format!("cannot extend {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<Response, BackendError> {
        debug!(%method, path = url.path(), "build service request");
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.user, Some(self.password.expose_secret()));
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(|e| BackendError::Unavailable {
            message: format!("request failed: {e}"),
        })
    }

    async fn text(response: Response) -> Result<String, BackendError> {
        response.text().await.map_err(|e| BackendError::Unavailable {
            message: format!("failed reading response body: {e}"),
        })
    }

    /// Passes successful responses through and maps failures to
    /// [`BackendError`].
    async fn check(response: Response, resource: &str) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = Self::text(response).await.unwrap_or_default();
        let parsed = Status::parse(&body);
        let message = parsed
            .as_ref()
            .map(Status::message)
            .unwrap_or_else(|| body.trim().to_string());

        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BackendError::NoPermission { message }
            }
            StatusCode::BAD_REQUEST
                if parsed.as_ref().is_some_and(|s| s.code == DOUBLE_BRANCH_PACKAGE) =>
            {
                BackendError::AlreadyExists {
                    resource: resource.to_string(),
                }
            }
            s if s.is_server_error() => BackendError::Unavailable {
                message: format!("{s}: {message}"),
            },
            s => BackendError::InvalidResponse {
                message: format!("{s}: {message}"),
            },
        })
    }

    /// GETs a meta document; `None` on 404.
    async fn get_meta(&self, segments: &[&str]) -> Result<Option<String>, BackendError> {
        let url = self.url(segments, &[])?;
        let resource = url.path().to_string();
        let response = self.send(Method::GET, url, None).await?;
        match Self::check(response, &resource).await {
            Ok(response) => Self::text(response).await.map(Some),
            Err(BackendError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put(
        &self,
        segments: &[&str],
        body: String,
        resource: &str,
    ) -> Result<(), BackendError> {
        let url = self.url(segments, &[])?;
        let response = self.send(Method::PUT, url, Some(body)).await?;
        Self::check(response, resource).await?;
        Ok(())
    }

    /// Creates `target` as a package without sources, plus its project when
    /// missing.
    ///
    /// `cmd=branch` always links and copies the source files, so branches that
    /// build from an `scmsync` pointer are set up from meta documents instead.
    /// Reports a missing source as [`BackendError::NotFound`] and an existing
    /// target as [`BackendError::AlreadyExists`], like `cmd=branch` does.
    async fn create_empty_branch(
        &self,
        source: &PackageRef,
        target: &PackageRef,
        add_repositories: bool,
    ) -> Result<(), BackendError> {
        let source_package = ["source", source.project.as_str(), source.package.as_str(), "_meta"];
        if self.get_meta(&source_package).await?.is_none() {
            return Err(BackendError::NotFound {
                resource: source.to_string(),
            });
        }
        let target_package = ["source", target.project.as_str(), target.package.as_str(), "_meta"];
        if self.get_meta(&target_package).await?.is_some() {
            return Err(BackendError::AlreadyExists {
                resource: target.to_string(),
            });
        }

        let target_project = ["source", target.project.as_str(), "_meta"];
        if self.get_meta(&target_project).await?.is_none() {
            let repositories = if add_repositories {
                match self.get_meta(&["source", source.project.as_str(), "_meta"]).await? {
                    Some(body) => meta::parse::<ProjectMeta>(&body)?.repositories,
                    None => Vec::new(),
                }
            } else {
                Vec::new()
            };
            let body = meta::branch_project_meta(
                target.project.as_str(),
                source.project.as_str(),
                &repositories,
            )?;
            self.put(&target_project, body, target.project.as_str()).await?;
            debug!(project = %target.project, "branch project created");
        }

        let body = meta::empty_package_meta(target.project.as_str(), target.package.as_str())?;
        self.put(&target_package, body, &target.to_string()).await
    }
}

fn to_project(meta: ProjectMeta) -> Result<Project, BackendError> {
    let name = ProjectName::new(meta.name).ok_or_else(|| BackendError::InvalidResponse {
        message: "project meta without name".to_string(),
    })?;
    Ok(Project {
        name,
        scmsync: meta.scmsync.filter(|url| !url.trim().is_empty()),
        repositories: meta.repositories.into_iter().map(|r| r.name).collect(),
    })
}

fn to_package(meta: PackageMeta) -> Result<Package, BackendError> {
    let invalid = || BackendError::InvalidResponse {
        message: "package meta without name or project".to_string(),
    };
    Ok(Package {
        project: ProjectName::new(meta.project).ok_or_else(invalid)?,
        name: PackageName::new(meta.name).ok_or_else(invalid)?,
        scmsync: meta.scmsync.filter(|url| !url.trim().is_empty()),
    })
}

#[async_trait]
impl PackageCatalog for BuildServiceClient {
    async fn find_project(&self, name: &ProjectName) -> Result<Option<Project>, BackendError> {
        match self.get_meta(&["source", name.as_str(), "_meta"]).await? {
            Some(body) => to_project(meta::parse(&body)?).map(Some),
            None => Ok(None),
        }
    }

    // `use_source` has no effect here: `_meta` is always answered by the API
    // frontend.
    async fn find_package(
        &self,
        package: &PackageRef,
        options: FindOptions,
    ) -> Result<Option<Package>, BackendError> {
        let name = if options.follow_multibuild {
            package.package.multibuild_container()
        } else {
            package.package.clone()
        };
        let segments = ["source", package.project.as_str(), name.as_str(), "_meta"];
        match self.get_meta(&segments).await? {
            Some(body) => to_package(meta::parse(&body)?).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BuildService for BuildServiceClient {
    #[instrument(skip_all, fields(source = %source, target = %target))]
    async fn branch(
        &self,
        source: &PackageRef,
        target: &PackageRef,
        options: BranchOptions,
    ) -> Result<(), BackendError> {
        if !options.copy_sources {
            return self
                .create_empty_branch(source, target, options.add_repositories)
                .await;
        }
        let mut query = vec![
            ("cmd", "branch"),
            ("target_project", target.project.as_str()),
            ("target_package", target.package.as_str()),
        ];
        if options.add_repositories {
            query.push(("add_repositories", "1"));
        }
        let url = self.url(
            &["source", source.project.as_str(), source.package.as_str()],
            &query,
        )?;
        let response = self.send(Method::POST, url, None).await?;
        Self::check(response, &target.to_string()).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(package = %package))]
    async fn rebuild(&self, package: &PackageRef) -> Result<(), BackendError> {
        let url = self.url(
            &["build", package.project.as_str()],
            &[("cmd", "rebuild"), ("package", package.package.as_str())],
        )?;
        let response = self.send(Method::POST, url, None).await?;
        Self::check(response, &package.to_string()).await?;
        Ok(())
    }

    async fn read_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
    ) -> Result<String, BackendError> {
        let url = self.url(
            &["source", package.project.as_str(), package.package.as_str(), filename],
            &[],
        )?;
        let response = self.send(Method::GET, url, None).await?;
        let response = Self::check(response, &format!("{package}/{filename}")).await?;
        Self::text(response).await
    }

    async fn write_source_file(
        &self,
        package: &PackageRef,
        filename: &str,
        content: &str,
    ) -> Result<(), BackendError> {
        let url = self.url(
            &["source", package.project.as_str(), package.package.as_str(), filename],
            &[],
        )?;
        let response = self
            .send(Method::PUT, url, Some(content.to_string()))
            .await?;
        Self::check(response, &format!("{package}/{filename}")).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(package = %package))]
    async fn set_scm_sync(&self, package: &PackageRef, url: &str) -> Result<(), BackendError> {
        let segments = ["source", package.project.as_str(), package.package.as_str(), "_meta"];
        let current = self
            .get_meta(&segments)
            .await?
            .ok_or_else(|| BackendError::NotFound {
                resource: package.to_string(),
            })?;
        let updated = meta::replace_scmsync(&current, url)?;
        self.put(&segments, updated, &package.to_string()).await
    }
}
