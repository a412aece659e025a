//! ECR Exporter Collector
//!
//! This crate walks a container registry on a schedule and writes what it
//! finds into a [`MetricSink`](ecr_exporter_metrics::MetricSink).
//!
//! # Overview
//!
//! A collection cycle is a three-level fan-out:
//! - **Repositories**: every repository is listed page by page; each one gets
//!   an info gauge and its own image branch.
//! - **Images**: each repository's image identifiers and descriptors are
//!   listed, ranked newest-first and capped by the optional tag budget.
//! - **Findings**: each emitted (digest, tag) pair gets its own findings
//!   branch, skipped while the digest is in the dedup cache.
//!
//! Every upstream request, at every level, first takes a token from one
//! shared rate limiter. Branches are detached: a parent never waits for its
//! children, and a failure in one branch never affects its siblings.
//!
//! # Architecture
//!
//! ```text
//!   CronScheduler ──tick──▶ RepositoryCollector
//!                                  │ DescribeRepositories (paged)
//!              ┌───────────────────┼───────────────────┐
//!              ▼                   ▼                   ▼
//!       ImagesCollector     ImagesCollector     ImagesCollector
//!              │ ListImages + DescribeImages (paged)
//!        ┌─────┴─────┐
//!        ▼           ▼
//!   Findings    Findings   ◀── DedupCache (per-digest TTL)
//!
//!   all requests ──▶ RateLimiter (token bucket)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ecr_exporter_collector::{CollectorConfig, CronScheduler, RepositoryCollector};
//! use ecr_exporter_metrics::PrometheusSink;
//! use ecr_exporter_registry::{EcrConnector, RegistryConfig};
//!
//! let sink = Arc::new(PrometheusSink::new()?);
//! let connector = Arc::new(EcrConnector::new(RegistryConfig::new()));
//! let collector = RepositoryCollector::new(CollectorConfig::default(), connector, sink)?;
//!
//! let cancel = CancellationToken::new();
//! collector.run_cycle(&cancel).await;
//! CronScheduler::new("0 0 * * * *")?.run(&collector, &cancel).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod dedup;
pub mod error;
pub mod findings;
pub mod images;
pub mod pager;
pub mod rate_limit;
pub mod repositories;
pub mod scheduler;

// Re-export main types at crate root
pub use config::{CollectorConfig, CollectorConfigBuilder};
pub use context::CollectorContext;
pub use dedup::DedupCache;
pub use error::{CollectorError, RateLimitError, Result};
pub use findings::{FindingsCollector, FindingsOutcome};
pub use images::{
    rank_descriptors, select_tags, ImagesCollector, ImagesSummary, TagBudget, TagSelection,
};
pub use pager::Pager;
pub use rate_limit::RateLimiter;
pub use repositories::{CycleSummary, RepositoryCollector};
pub use scheduler::{CronScheduler, DEFAULT_SCHEDULE};
