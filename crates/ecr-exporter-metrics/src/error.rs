//! Error types for the metrics crate.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while registering, encoding or serving metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be created or registered.
    #[error("failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    /// Gathered metrics could not be encoded.
    #[error("failed to encode metrics: {message}")]
    Encode {
        /// Error message.
        message: String,
    },

    /// The HTTP listener could not be bound.
    #[error("failed to bind metrics server to {addr}: {source}")]
    Bind {
        /// Requested listen address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server terminated with an error.
    #[error("metrics server failed: {0}")]
    Serve(#[source] std::io::Error),
}
