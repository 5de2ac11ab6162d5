//! Build service infrastructure adapter.
//!
//! Implements the [`workflow::PackageCatalog`] and [`workflow::BuildService`]
//! traits over the build service's REST API.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, XML parsing and the mapping of HTTP
//! statuses to [`workflow::BackendError`] live here. The steps see only the
//! traits.
//!
//! | Call | Request |
//! |------|---------|
//! | `find_project` | `GET /source/{project}/_meta` |
//! | `find_package` | `GET /source/{project}/{package}/_meta` |
//! | `branch` | `POST /source/{project}/{package}?cmd=branch` |
//! | `rebuild` | `POST /build/{project}?cmd=rebuild&package={package}` |
//! | `read_source_file` / `write_source_file` | `GET`/`PUT /source/{project}/{package}/{file}` |
//! | `set_scm_sync` | read, rewrite and `PUT` the package `_meta` |

mod client;
mod meta;

pub use client::{BuildServiceClient, BuildServiceConfig, ClientError};
