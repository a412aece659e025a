//! HTTP exposition of the collected metrics.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::MetricsError;
use crate::sink::PrometheusSink;

/// Configuration for the metrics HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,

    /// Path the exposition is served on.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            path: "/metrics".to_string(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for the given address and path.
    ///
    /// A missing leading slash is added to the path.
    pub fn new(addr: SocketAddr, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self { addr, path }
    }
}

/// Builds the router serving the sink's registry.
pub fn router(path: &str, sink: Arc<PrometheusSink>) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(sink)
}

async fn metrics_handler(State(sink): State<Arc<PrometheusSink>>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&sink.registry().gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serves the metrics endpoint until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve<F>(
    config: ServerConfig,
    sink: Arc<PrometheusSink>,
    shutdown: F,
) -> Result<(), MetricsError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| MetricsError::Bind {
            addr: config.addr,
            source,
        })?;

    tracing::info!(addr = %config.addr, path = %config.path, "serving metrics");

    axum::serve(listener, router(&config.path, sink))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(MetricsError::Serve)
}
