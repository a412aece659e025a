//! # ECR Exporter Metrics
//!
//! Prometheus gauges written by the collection pipeline and the HTTP
//! endpoint that exposes them.
//!
//! The collectors only depend on the [`MetricSink`] trait. [`PrometheusSink`]
//! implements it over a process-local registry that is rebuilt from scratch
//! on every restart; nothing is persisted.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod server;
mod sink;

pub use error::MetricsError;
pub use server::{router, serve, ServerConfig};
pub use sink::{
    ImageLabels, MetricSink, PrometheusSink, RepositoryLabels, IMAGE_PUSHED_AT, IMAGE_SIZE,
    REPOSITORY_COUNT, REPOSITORY_INFO, SCAN_COMPLETED_AT, SCAN_FINDINGS,
};
