//! Image collection for a single repository.

use ecr_exporter_metrics::ImageLabels;
use ecr_exporter_registry::{
    unix_seconds, ImageDescriptor, RegistryApi, RegistryError, Repository,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::context::CollectorContext;
use crate::error::{CollectorError, Result};
use crate::findings::FindingsCollector;
use crate::pager::Pager;

/// Counts from one repository's image traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImagesSummary {
    /// Distinct images described.
    pub images: usize,

    /// (digest, tag) pairs that received metrics.
    pub emitted_tags: usize,

    /// (digest, tag) pairs skipped because the tag budget ran out.
    pub skipped_tags: usize,
}

/// Per-repository allowance of (digest, tag) pairs that may emit metrics.
#[derive(Debug, Clone, Copy)]
pub struct TagBudget {
    remaining: Option<usize>,
}

impl TagBudget {
    /// Creates a budget. `None` never runs out.
    pub const fn new(limit: Option<usize>) -> Self {
        Self { remaining: limit }
    }

    /// Consumes one unit, returning false once the budget is exhausted.
    pub fn try_take(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// A (digest, tag) pair and whether it fits in the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSelection<'a> {
    /// Image the tag points at.
    pub descriptor: &'a ImageDescriptor,

    /// The tag.
    pub tag: &'a str,

    /// Whether metrics are emitted for this pair.
    pub emit: bool,
}

/// Drops repeated digests and orders images newest first.
///
/// The sort is stable: images pushed at the same instant keep their upstream
/// order. Images without a push time sort last.
pub fn rank_descriptors(descriptors: Vec<ImageDescriptor>) -> Vec<ImageDescriptor> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<_> = descriptors
        .into_iter()
        .filter(|d| seen.insert(d.digest.clone()))
        .collect();
    ranked.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
    ranked
}

/// Walks every (digest, tag) pair in ranked order against the budget.
pub fn select_tags(descriptors: &[ImageDescriptor], limit: Option<usize>) -> Vec<TagSelection<'_>> {
    let mut budget = TagBudget::new(limit);
    descriptors
        .iter()
        .flat_map(|descriptor| {
            descriptor.tags.iter().map(move |tag| (descriptor, tag.as_str()))
        })
        .map(|(descriptor, tag)| TagSelection {
            descriptor,
            tag,
            emit: budget.try_take(),
        })
        .collect()
}

/// Emits image metrics for one repository and dispatches findings collection.
pub struct ImagesCollector {
    ctx: Arc<CollectorContext>,
    client: Arc<dyn RegistryApi>,
}

impl ImagesCollector {
    /// Creates a collector using the given client.
    pub fn new(ctx: Arc<CollectorContext>, client: Arc<dyn RegistryApi>) -> Self {
        Self { ctx, client }
    }

    /// Runs the traversal, logging instead of returning errors.
    pub async fn run(&self, repository: Arc<Repository>, cancel: &CancellationToken) {
        match self.collect(Arc::clone(&repository), cancel).await {
            Ok(summary) => tracing::debug!(
                repository = %repository.name,
                images = summary.images,
                emitted_tags = summary.emitted_tags,
                skipped_tags = summary.skipped_tags,
                "collected image metrics"
            ),
            Err(e @ CollectorError::Registry(RegistryError::RepositoryNotFound { .. })) => {
                tracing::info!(
                    repository = %repository.name,
                    error = %e,
                    "repository disappeared, skipping"
                );
            }
            Err(e) if e.is_not_found() => tracing::info!(
                repository = %repository.name,
                error = %e,
                "upstream resource disappeared, skipping repository"
            ),
            Err(e) => tracing::warn!(
                repository = %repository.name,
                error = %e,
                "failed to collect image metrics"
            ),
        }
    }

    /// Lists, ranks and emits the repository's images.
    ///
    /// Returns once every findings task has been dispatched, without waiting
    /// for any of them. An image that vanishes between listing and describing
    /// only drops its identifier page; any other listing error abandons the
    /// whole repository before a single image metric is written.
    pub async fn collect(
        &self,
        repository: Arc<Repository>,
        cancel: &CancellationToken,
    ) -> Result<ImagesSummary> {
        let descriptors = rank_descriptors(self.describe_all(&repository, cancel).await?);

        let mut summary = ImagesSummary {
            images: descriptors.len(),
            ..ImagesSummary::default()
        };

        for selection in select_tags(&descriptors, self.ctx.config.tag_limit) {
            let descriptor = selection.descriptor;

            if !selection.emit {
                tracing::warn!(
                    repository = %repository.name,
                    digest = %descriptor.digest,
                    tag = selection.tag,
                    reason = "image tag limit reached",
                    "skipping metric collection for image tag"
                );
                summary.skipped_tags += 1;
                continue;
            }

            let labels = ImageLabels {
                repository: &repository.name,
                digest: &descriptor.digest,
                tag: selection.tag,
            };
            tracing::info!(
                repository = %repository.name,
                digest = %descriptor.digest,
                tag = selection.tag,
                "setting metrics for image"
            );

            if let Some(pushed_at) = descriptor.pushed_at {
                self.ctx
                    .sink
                    .set_image_pushed_at(&labels, unix_seconds(pushed_at));
            }
            #[allow(clippy::cast_precision_loss)]
            let size = descriptor.size_bytes as f64;
            self.ctx.sink.set_image_size(&labels, size);

            self.dispatch_findings(
                &repository,
                descriptor.digest.clone(),
                selection.tag.to_string(),
                cancel,
            );
            summary.emitted_tags += 1;
        }

        Ok(summary)
    }

    async fn describe_all(
        &self,
        repository: &Arc<Repository>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImageDescriptor>> {
        let mut ids_pager = {
            let client = Arc::clone(&self.client);
            let repository = Arc::clone(repository);
            Pager::new("ListImages", move |token| {
                let client = Arc::clone(&client);
                let repository = Arc::clone(&repository);
                async move { client.list_images(&repository, token).await }
            })
        };

        let mut descriptors = Vec::new();

        while ids_pager.has_more() {
            let ids = ids_pager.next(&self.ctx.limiter, cancel).await?;
            if ids.is_empty() {
                tracing::info!(repository = %repository.name, "found empty repository, skipping");
                continue;
            }

            tracing::info!(
                repository = %repository.name,
                count = ids.len(),
                "describing images in repository"
            );

            let ids = Arc::new(ids);
            let mut describe_pager = {
                let client = Arc::clone(&self.client);
                let repository = Arc::clone(repository);
                Pager::new("DescribeImages", move |token| {
                    let client = Arc::clone(&client);
                    let repository = Arc::clone(&repository);
                    let ids = Arc::clone(&ids);
                    async move { client.describe_images(&repository, &ids, token).await }
                })
            };

            while describe_pager.has_more() {
                match describe_pager.next(&self.ctx.limiter, cancel).await {
                    Ok(page) => descriptors.extend(page),
                    // Images deleted since they were listed; the rest of this
                    // identifier page is dropped.
                    Err(CollectorError::Registry(RegistryError::ImageNotFound { .. })) => {
                        tracing::info!(
                            repository = %repository.name,
                            "images disappeared while being described, skipping page"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(descriptors)
    }

    fn dispatch_findings(
        &self,
        repository: &Arc<Repository>,
        digest: String,
        tag: String,
        cancel: &CancellationToken,
    ) {
        let findings = FindingsCollector::new(Arc::clone(&self.ctx), Arc::clone(&self.client));
        let repository = Arc::clone(repository);
        let cancel = cancel.clone();
        self.ctx.spawn(async move {
            findings.collect(repository, digest, tag, &cancel).await;
        });
    }
}
