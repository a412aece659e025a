//! Error types for registry operations.

use thiserror::Error;

/// Errors that can occur while talking to the upstream registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to load client configuration (credentials, region, endpoint).
    #[error("Failed to load registry client configuration: {message}")]
    ConfigLoad {
        /// Error message.
        message: String,
    },

    /// Repository does not exist (deleted since it was listed).
    #[error("Repository not found: {repository}")]
    RepositoryNotFound {
        /// Repository name.
        repository: String,
    },

    /// Image does not exist (untagged or deleted since it was listed).
    #[error("Image not found in {repository}")]
    ImageNotFound {
        /// Repository name.
        repository: String,
    },

    /// No scan has been performed for the image yet.
    #[error("Scan not found: {repository}@{digest}")]
    ScanNotFound {
        /// Repository name.
        repository: String,
        /// Image digest.
        digest: String,
    },

    /// Any other upstream API failure.
    #[error("{operation} failed: {message}")]
    Api {
        /// Upstream operation name.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The upstream response omitted a field the exporter cannot do without.
    #[error("{operation} response is missing required field '{field}'")]
    MissingField {
        /// Upstream operation name.
        operation: &'static str,
        /// Field name.
        field: &'static str,
    },
}

impl RegistryError {
    /// Returns true for "not found / not yet available" errors.
    ///
    /// These are expected during normal traversal (a scan that has not run
    /// yet, a repository deleted mid-cycle) and never abort sibling work.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RepositoryNotFound { .. } | Self::ImageNotFound { .. } | Self::ScanNotFound { .. }
        )
    }

    /// Creates a generic API error.
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            operation,
            message: message.into(),
        }
    }
}
