//! `scmsync` URL handling.
//!
//! A package (or a whole project) in `scmsync` mode does not store its sources;
//! it points at an external repository:
//!
//! ```text
//! https://github.com/example/repo.git?subdir=hello_world01#krauselukas-patch-2
//! └──────────── base ───────────────┘└──── query ───────┘└──── fragment ────┘
//! ```
//!
//! The query selects a subdirectory, the fragment a branch or commit. When a
//! pull request is branched, the fragment is replaced by the request's head
//! commit and everything else is kept byte-for-byte. The URL is therefore split
//! by hand rather than through a URL parser, which would normalize the base.

use crate::{CommitSha, PackageName};

/// An `scmsync` URL split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmSyncUrl {
    base: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl ScmSyncUrl {
    /// Splits a stored `scmsync` URL.
    ///
    /// The first `#` starts the fragment; the first `?` before it starts the
    /// query. Neither component includes its separator.
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (url, None),
        };
        let (base, query) = match rest.split_once('?') {
            Some((base, query)) => (base, Some(query.to_string())),
            None => (rest, None),
        };
        Self {
            base: base.to_string(),
            query,
            fragment,
        }
    }

    /// The URL without query and fragment, exactly as stored.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The branch or commit marker, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Value of the `subdir` query parameter, if present.
    pub fn subdir(&self) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("subdir="))
    }

    /// Replaces the fragment with `commit_sha`, keeping base and query.
    pub fn pinned_to(mut self, commit_sha: &CommitSha) -> Self {
        self.fragment = Some(commit_sha.as_str().to_string());
        self
    }

    /// Selects `package` as the subdirectory.
    ///
    /// Used when a package inherits its project's URL. A URL that already
    /// selects a subdirectory gets the package appended below it; any other
    /// query is kept and the parameter added.
    pub fn with_package_subdir(mut self, package: &PackageName) -> Self {
        let package = package.as_str();
        self.query = Some(match self.query.take() {
            None => format!("subdir={package}"),
            Some(query) => {
                let mut found = false;
                let pairs: Vec<String> = query
                    .split('&')
                    .map(|pair| match pair.strip_prefix("subdir=") {
                        Some(dir) if !found => {
                            found = true;
                            match dir.trim_end_matches('/') {
                                "" => format!("subdir={package}"),
                                dir => format!("subdir={dir}/{package}"),
                            }
                        }
                        _ => pair.to_string(),
                    })
                    .collect();
                let joined = pairs.join("&");
                if found {
                    joined
                } else if joined.is_empty() {
                    format!("subdir={package}")
                } else {
                    format!("{joined}&subdir={package}")
                }
            }
        });
        self
    }
}

impl std::fmt::Display for ScmSyncUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Pins a stored `scmsync` URL to `commit_sha`.
///
/// The existing fragment is dropped unconditionally; the query, if any, is kept
/// verbatim in front of the new fragment.
///
/// ```
/// use workflow::{scmsync, CommitSha};
///
/// let sha = CommitSha::new("1234567").unwrap();
/// assert_eq!(
///     scmsync::merge("https://host/repo.git?subdir=hello_world01#old-branch", &sha),
///     "https://host/repo.git?subdir=hello_world01#1234567",
/// );
/// ```
pub fn merge(existing: &str, commit_sha: &CommitSha) -> String {
    ScmSyncUrl::parse(existing).pinned_to(commit_sha).to_string()
}

/// Computes the `scmsync` URL a branched package gets.
///
/// The package's own URL takes precedence. Otherwise the project's URL is used
/// with the package selected as subdirectory. Returns `None` when neither is
/// synced.
pub fn resolve_for_branch(
    package_scmsync: Option<&str>,
    project_scmsync: Option<&str>,
    package: &PackageName,
    commit_sha: &CommitSha,
) -> Option<String> {
    if let Some(url) = package_scmsync.filter(|url| !url.trim().is_empty()) {
        return Some(merge(url, commit_sha));
    }
    let url = project_scmsync.filter(|url| !url.trim().is_empty())?;
    Some(
        ScmSyncUrl::parse(url)
            .with_package_subdir(package)
            .pinned_to(commit_sha)
            .to_string(),
    )
}
