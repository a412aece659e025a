//! # ECR Exporter Registry
//!
//! Paginated view of a container-image registry for the ECR exporter.
//!
//! This crate defines the upstream surface the collectors traverse
//! (repositories → images → scan findings) as the [`RegistryApi`] trait,
//! and implements it on top of the AWS ECR SDK.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ecr_exporter_registry::{EcrConnector, RegistryConfig, RegistryConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = EcrConnector::new(RegistryConfig::new().with_region("eu-west-1"));
//!     let client = connector.connect().await?;
//!
//!     let page = client.describe_repositories(None).await?;
//!     println!("{} repositories on the first page", page.items.len());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod config;
mod ecr;
mod error;
mod model;

pub use client::{RegistryApi, RegistryConnector};
pub use config::RegistryConfig;
pub use ecr::{EcrConnector, EcrRegistry};
pub use error::RegistryError;
pub use model::{
    unix_seconds, ImageDescriptor, ImageId, Page, Repository, ScanFindings, Severity,
};
