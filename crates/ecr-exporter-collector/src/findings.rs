//! Scan findings collection for a single image tag.

use ecr_exporter_metrics::ImageLabels;
use ecr_exporter_registry::{unix_seconds, RegistryApi, Repository, ScanFindings, Severity};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::context::CollectorContext;
use crate::pager::Pager;

/// How a findings branch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingsOutcome {
    /// The digest was processed within the cache TTL; nothing was fetched.
    Cached,

    /// Findings were emitted.
    Emitted,

    /// The upstream returned no findings payload; the digest was cached.
    NotScanned,

    /// The scan (or the image) does not exist yet; retried next cycle.
    NotFound,

    /// The branch was abandoned after an upstream error or cancellation.
    Failed,
}

/// Emits scan finding metrics for one (digest, tag) pair.
pub struct FindingsCollector {
    ctx: Arc<CollectorContext>,
    client: Arc<dyn RegistryApi>,
}

impl FindingsCollector {
    /// Creates a collector using the given client.
    pub fn new(ctx: Arc<CollectorContext>, client: Arc<dyn RegistryApi>) -> Self {
        Self { ctx, client }
    }

    /// Fetches and emits the findings for an image tag.
    ///
    /// Skips the upstream entirely if the digest is in the dedup cache. On a
    /// completed traversal the digest is cached for the configured TTL, even
    /// when no findings payload was returned.
    pub async fn collect(
        &self,
        repository: Arc<Repository>,
        digest: String,
        tag: String,
        cancel: &CancellationToken,
    ) -> FindingsOutcome {
        if self.ctx.cache.has(&digest).await {
            tracing::info!(
                repository = %repository.name,
                digest = %digest,
                tag = %tag,
                "found results for API call in cache, skipping"
            );
            return FindingsOutcome::Cached;
        }

        let mut pager = {
            let client = Arc::clone(&self.client);
            let repository = Arc::clone(&repository);
            let digest = digest.clone();
            let tag = tag.clone();
            Pager::new("DescribeImageScanFindings", move |token| {
                let client = Arc::clone(&client);
                let repository = Arc::clone(&repository);
                let digest = digest.clone();
                let tag = tag.clone();
                async move {
                    client
                        .describe_image_scan_findings(&repository, &digest, &tag, token)
                        .await
                }
            })
        };

        let labels = ImageLabels {
            repository: &repository.name,
            digest: &digest,
            tag: &tag,
        };
        let mut emitted = false;

        while pager.has_more() {
            let page = match pager.next(&self.ctx.limiter, cancel).await {
                Ok(page) => page,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(
                        repository = %repository.name,
                        digest = %digest,
                        tag = %tag,
                        error = %e,
                        "scan not found, skipping"
                    );
                    return FindingsOutcome::NotFound;
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %repository.name,
                        digest = %digest,
                        tag = %tag,
                        error = %e,
                        "failed to retrieve next scan findings page"
                    );
                    return FindingsOutcome::Failed;
                }
            };

            let Some(findings) = page else {
                tracing::info!(
                    repository = %repository.name,
                    digest = %digest,
                    tag = %tag,
                    "no image scan findings found, skipping image"
                );
                continue;
            };

            self.emit(&labels, &findings);
            emitted = true;
        }

        self.ctx
            .cache
            .set_with_expiry(digest.clone(), self.ctx.config.cache_ttl)
            .await;

        if emitted {
            FindingsOutcome::Emitted
        } else {
            FindingsOutcome::NotScanned
        }
    }

    fn emit(&self, labels: &ImageLabels<'_>, findings: &ScanFindings) {
        if let Some(completed_at) = findings.completed_at {
            tracing::info!(
                repository = labels.repository,
                digest = labels.digest,
                tag = labels.tag,
                "setting scan completed timestamp"
            );
            self.ctx
                .sink
                .set_scan_completed_at(labels, unix_seconds(completed_at));
        }

        tracing::info!(
            repository = labels.repository,
            digest = labels.digest,
            tag = labels.tag,
            "setting scan finding severities"
        );
        for severity in Severity::ALL {
            #[allow(clippy::cast_precision_loss)]
            let count = findings.count(severity) as f64;
            self.ctx
                .sink
                .set_scan_findings(labels, severity.as_str(), count);
            tracing::debug!(severity = %severity, count, "set severity findings");
        }
    }
}
