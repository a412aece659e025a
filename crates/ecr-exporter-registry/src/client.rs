//! Upstream registry API surface.
//!
//! The collectors only ever see the registry through these traits: one
//! cursor-paginated call per listing level plus a connector that resolves a
//! fresh client at the start of every collection cycle.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::model::{ImageDescriptor, ImageId, Page, Repository, ScanFindings};

/// Paginated registry API.
///
/// Every method issues exactly one upstream request. `next_token` is the
/// opaque cursor from the previous page, or `None` for the first page.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Lists repositories in the registry.
    async fn describe_repositories(
        &self,
        next_token: Option<String>,
    ) -> Result<Page<Vec<Repository>>, RegistryError>;

    /// Lists image identifiers in a repository.
    async fn list_images(
        &self,
        repository: &Repository,
        next_token: Option<String>,
    ) -> Result<Page<Vec<ImageId>>, RegistryError>;

    /// Describes the given images.
    async fn describe_images(
        &self,
        repository: &Repository,
        image_ids: &[ImageId],
        next_token: Option<String>,
    ) -> Result<Page<Vec<ImageDescriptor>>, RegistryError>;

    /// Fetches scan findings for an image.
    ///
    /// A page with `None` items means the upstream returned no findings
    /// payload. A missing scan is reported as [`RegistryError::ScanNotFound`].
    async fn describe_image_scan_findings(
        &self,
        repository: &Repository,
        digest: &str,
        tag: &str,
        next_token: Option<String>,
    ) -> Result<Page<Option<ScanFindings>>, RegistryError>;
}

/// Resolves a registry client.
///
/// Called once per collection cycle so that rotated credentials are picked up.
#[async_trait]
pub trait RegistryConnector: Send + Sync {
    /// Connects to the registry.
    async fn connect(&self) -> Result<Arc<dyn RegistryApi>, RegistryError>;
}
