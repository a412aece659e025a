//! AWS ECR implementation of the registry API.

use async_trait::async_trait;
use aws_sdk_ecr::config::Region;
use aws_sdk_ecr::error::{DisplayErrorContext, SdkError};
use aws_sdk_ecr::primitives::DateTime as AwsDateTime;
use aws_sdk_ecr::types::{self as ecr, ImageIdentifier};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::client::{RegistryApi, RegistryConnector};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::model::{ImageDescriptor, ImageId, Page, Repository, ScanFindings, Severity};

/// Connector that builds an [`EcrRegistry`] from the AWS default provider chain.
#[derive(Debug, Clone, Default)]
pub struct EcrConnector {
    config: RegistryConfig,
}

impl EcrConnector {
    /// Creates a connector with the given configuration.
    #[must_use]
    pub const fn new(config: RegistryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RegistryConnector for EcrConnector {
    async fn connect(&self) -> Result<Arc<dyn RegistryApi>, RegistryError> {
        tracing::debug!("loading AWS configuration");
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &self.config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(RegistryError::ConfigLoad {
                message: "no AWS region configured".to_string(),
            });
        }

        tracing::debug!(region = ?sdk_config.region(), "creating AWS ECR client");
        let client = aws_sdk_ecr::Client::new(&sdk_config);
        Ok(Arc::new(EcrRegistry::new(client, self.config.clone())))
    }
}

/// Registry API backed by an AWS ECR client.
#[derive(Debug, Clone)]
pub struct EcrRegistry {
    client: aws_sdk_ecr::Client,
    config: RegistryConfig,
}

impl EcrRegistry {
    /// Wraps an existing ECR client.
    #[must_use]
    pub const fn new(client: aws_sdk_ecr::Client, config: RegistryConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RegistryApi for EcrRegistry {
    async fn describe_repositories(
        &self,
        next_token: Option<String>,
    ) -> Result<Page<Vec<Repository>>, RegistryError> {
        const OPERATION: &str = "DescribeRepositories";

        let output = self
            .client
            .describe_repositories()
            .set_registry_id(self.config.registry_id.clone())
            .set_max_results(self.config.page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| api_error(OPERATION, &e))?;

        let repositories = output
            .repositories
            .unwrap_or_default()
            .into_iter()
            .map(convert_repository)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items: repositories,
            next_token: output.next_token,
        })
    }

    async fn list_images(
        &self,
        repository: &Repository,
        next_token: Option<String>,
    ) -> Result<Page<Vec<ImageId>>, RegistryError> {
        const OPERATION: &str = "ListImages";

        let output = self
            .client
            .list_images()
            .set_registry_id(registry_id(repository))
            .repository_name(&repository.name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|s| s.is_repository_not_found_exception())
                {
                    RegistryError::RepositoryNotFound {
                        repository: repository.name.clone(),
                    }
                } else {
                    api_error(OPERATION, &e)
                }
            })?;

        let image_ids = output
            .image_ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| ImageId {
                digest: id.image_digest,
                tag: id.image_tag,
            })
            .collect();

        Ok(Page {
            items: image_ids,
            next_token: output.next_token,
        })
    }

    async fn describe_images(
        &self,
        repository: &Repository,
        image_ids: &[ImageId],
        next_token: Option<String>,
    ) -> Result<Page<Vec<ImageDescriptor>>, RegistryError> {
        const OPERATION: &str = "DescribeImages";

        let identifiers = image_ids.iter().map(to_identifier).collect();

        let output = self
            .client
            .describe_images()
            .set_registry_id(registry_id(repository))
            .repository_name(&repository.name)
            .set_image_ids(Some(identifiers))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(s) if s.is_repository_not_found_exception() => {
                    RegistryError::RepositoryNotFound {
                        repository: repository.name.clone(),
                    }
                }
                Some(s) if s.is_image_not_found_exception() => RegistryError::ImageNotFound {
                    repository: repository.name.clone(),
                },
                _ => api_error(OPERATION, &e),
            })?;

        let descriptors = output
            .image_details
            .unwrap_or_default()
            .into_iter()
            .map(convert_image_detail)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items: descriptors,
            next_token: output.next_token,
        })
    }

    async fn describe_image_scan_findings(
        &self,
        repository: &Repository,
        digest: &str,
        tag: &str,
        next_token: Option<String>,
    ) -> Result<Page<Option<ScanFindings>>, RegistryError> {
        const OPERATION: &str = "DescribeImageScanFindings";

        let image_id = ImageIdentifier::builder()
            .image_digest(digest)
            .image_tag(tag)
            .build();

        let output = self
            .client
            .describe_image_scan_findings()
            .set_registry_id(registry_id(repository))
            .repository_name(&repository.name)
            .image_id(image_id)
            .set_max_results(self.config.page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(s) if s.is_scan_not_found_exception() => RegistryError::ScanNotFound {
                    repository: repository.name.clone(),
                    digest: digest.to_string(),
                },
                Some(s) if s.is_repository_not_found_exception() => {
                    RegistryError::RepositoryNotFound {
                        repository: repository.name.clone(),
                    }
                }
                Some(s) if s.is_image_not_found_exception() => RegistryError::ImageNotFound {
                    repository: repository.name.clone(),
                },
                _ => api_error(OPERATION, &e),
            })?;

        Ok(Page {
            items: output.image_scan_findings.map(convert_scan_findings),
            next_token: output.next_token,
        })
    }
}

fn api_error<E, R>(operation: &'static str, err: &SdkError<E, R>) -> RegistryError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    RegistryError::api(operation, DisplayErrorContext(err).to_string())
}

fn registry_id(repository: &Repository) -> Option<String> {
    Some(repository.registry_id.clone()).filter(|id| !id.is_empty())
}

fn to_identifier(id: &ImageId) -> ImageIdentifier {
    ImageIdentifier::builder()
        .set_image_digest(id.digest.clone())
        .set_image_tag(id.tag.clone())
        .build()
}

fn to_utc(at: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}

fn convert_repository(repository: ecr::Repository) -> Result<Repository, RegistryError> {
    let scan_on_push = repository
        .image_scanning_configuration()
        .is_some_and(ecr::ImageScanningConfiguration::scan_on_push);
    let tag_mutability = repository
        .image_tag_mutability()
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Ok(Repository {
        name: repository.repository_name.ok_or(RegistryError::MissingField {
            operation: "DescribeRepositories",
            field: "repositoryName",
        })?,
        registry_id: repository.registry_id.unwrap_or_default(),
        uri: repository.repository_uri.unwrap_or_default(),
        scan_on_push,
        tag_mutability,
    })
}

fn convert_image_detail(detail: ecr::ImageDetail) -> Result<ImageDescriptor, RegistryError> {
    let pushed_at = detail.image_pushed_at().and_then(to_utc);
    let tags = detail.image_tags().to_vec();

    Ok(ImageDescriptor {
        digest: detail.image_digest.ok_or(RegistryError::MissingField {
            operation: "DescribeImages",
            field: "imageDigest",
        })?,
        tags,
        size_bytes: detail.image_size_in_bytes.unwrap_or(0),
        pushed_at,
    })
}

fn convert_scan_findings(findings: ecr::ImageScanFindings) -> ScanFindings {
    let completed_at = findings.image_scan_completed_at().and_then(to_utc);
    let severity_counts = findings
        .finding_severity_counts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(severity, count)| {
            Severity::from_upstream(severity.as_str()).map(|s| (s, i64::from(count)))
        })
        .collect();

    ScanFindings {
        completed_at,
        severity_counts,
    }
}
