//! State shared by every traversal branch.

use ecr_exporter_metrics::MetricSink;
use std::future::Future;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::config::CollectorConfig;
use crate::dedup::DedupCache;
use crate::error::Result;
use crate::rate_limit::RateLimiter;

/// Handles constructed once at startup and passed into every collector.
///
/// The limiter, cache and sink are each internally synchronized. Descriptors
/// fetched during a cycle are never stored here.
pub struct CollectorContext {
    /// Collector configuration.
    pub config: CollectorConfig,

    /// Upstream request limiter.
    pub limiter: RateLimiter,

    /// Findings deduplication cache.
    pub cache: DedupCache,

    /// Metric write surface.
    pub sink: Arc<dyn MetricSink>,

    tasks: TaskTracker,
}

impl CollectorContext {
    /// Builds the shared state from a validated configuration.
    pub fn new(config: CollectorConfig, sink: Arc<dyn MetricSink>) -> Result<Self> {
        config.validate()?;

        let limiter = RateLimiter::new(config.rate_limit_frequency, config.rate_limit_burst)?;
        let cache = DedupCache::new(config.cache_capacity);

        tracing::info!(
            bursts = limiter.burst(),
            frequency = limiter.rate(),
            "rate limiter instantiated"
        );

        Ok(Self {
            config,
            limiter,
            cache,
            sink,
            tasks: TaskTracker::new(),
        })
    }

    /// Spawns a detached branch task.
    ///
    /// The caller never awaits it; the tracker only lets shutdown and tests
    /// wait for outstanding branches.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.tasks.spawn(task));
    }

    /// Number of branch tasks still running.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every spawned branch, including ones spawned while
    /// waiting, has finished.
    pub async fn wait_for_tasks(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

impl std::fmt::Debug for CollectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorContext")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("pending_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
