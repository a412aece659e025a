//! Repository collection: the entry point of a collection cycle.

use ecr_exporter_metrics::{MetricSink, RepositoryLabels};
use ecr_exporter_registry::{RegistryApi, RegistryConnector, Repository};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::context::CollectorContext;
use crate::error::Result;
use crate::images::ImagesCollector;
use crate::pager::Pager;

/// Counts from one collection cycle's repository listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Repositories listed.
    pub repositories: usize,
}

/// Lists every repository and fans out image collection per repository.
///
/// Cloning is cheap; clones share the limiter, dedup cache, sink and task
/// tracker.
#[derive(Clone)]
pub struct RepositoryCollector {
    ctx: Arc<CollectorContext>,
    connector: Arc<dyn RegistryConnector>,
}

impl RepositoryCollector {
    /// Creates a collector, constructing the shared limiter and cache.
    pub fn new(
        config: CollectorConfig,
        connector: Arc<dyn RegistryConnector>,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self> {
        let ctx = CollectorContext::new(config, sink)?;
        Ok(Self {
            ctx: Arc::new(ctx),
            connector,
        })
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<CollectorContext> {
        &self.ctx
    }

    /// Runs one cycle, logging the outcome.
    ///
    /// This is the scheduler's entry point: failures are logged, never
    /// returned, and the next scheduled run is the retry.
    pub async fn run_cycle(&self, cancel: &CancellationToken) {
        match self.collect(cancel).await {
            Ok(summary) => tracing::info!(
                repositories = summary.repositories,
                "collection cycle dispatched"
            ),
            Err(e) => tracing::error!(error = %e, "collection cycle failed"),
        }
    }

    /// Lists repositories, emits their metrics and dispatches image collection.
    ///
    /// Returns once every repository has been dispatched; image and findings
    /// branches keep running in the background. Failing to connect or to
    /// fetch any repository page aborts the cycle and leaves the repository
    /// count untouched.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<CycleSummary> {
        let client = self.connector.connect().await?;

        let mut pager = {
            let client = Arc::clone(&client);
            Pager::new("DescribeRepositories", move |token| {
                let client = Arc::clone(&client);
                async move { client.describe_repositories(token).await }
            })
        };

        let mut count = 0;

        while pager.has_more() {
            let repositories = pager.next(&self.ctx.limiter, cancel).await?;

            count += repositories.len();
            tracing::debug!(
                increment = repositories.len(),
                total = count,
                "added to running count"
            );

            for repository in repositories {
                self.ctx.sink.set_repository_info(&RepositoryLabels {
                    name: &repository.name,
                    registry: &repository.registry_id,
                    scan_on_push: repository.scan_on_push,
                    tag_mutability: &repository.tag_mutability,
                    uri: &repository.uri,
                });

                self.dispatch_images(&client, repository, cancel);
            }
        }

        self.ctx.sink.set_repository_count(count);

        Ok(CycleSummary {
            repositories: count,
        })
    }

    /// Waits for every background branch to finish.
    pub async fn wait_for_tasks(&self) {
        self.ctx.wait_for_tasks().await;
    }

    /// Waits for background branches, giving up after `grace`.
    ///
    /// Returns false if branches were still running at the deadline.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        if tokio::time::timeout(grace, self.wait_for_tasks()).await.is_ok() {
            true
        } else {
            tracing::warn!(
                pending = self.ctx.pending_tasks(),
                "background collection tasks still running at shutdown"
            );
            false
        }
    }

    fn dispatch_images(
        &self,
        client: &Arc<dyn RegistryApi>,
        repository: Repository,
        cancel: &CancellationToken,
    ) {
        let images = ImagesCollector::new(Arc::clone(&self.ctx), Arc::clone(client));
        let repository = Arc::new(repository);
        let cancel = cancel.clone();
        self.ctx.spawn(async move {
            images.run(repository, &cancel).await;
        });
    }
}

impl std::fmt::Debug for RepositoryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryCollector")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
