//! Error types for the collector crate.

use ecr_exporter_registry::RegistryError;
use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors that can occur while collecting metrics.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for invalidity.
        reason: String,
    },

    /// The cron expression could not be parsed.
    #[error("invalid cron schedule '{expression}': {reason}")]
    InvalidSchedule {
        /// The rejected expression.
        expression: String,
        /// Parser message.
        reason: String,
    },

    /// Upstream registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A rate limiter token could not be acquired.
    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitError),

    /// `next` was called on a pager with no pages left.
    #[error("no more pages available for {operation}")]
    PagerExhausted {
        /// Upstream operation name.
        operation: &'static str,
    },

    /// The operation was cancelled.
    #[error("operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was cancelled.
        operation: &'static str,
    },
}

impl CollectorError {
    /// Returns true if the error is a non-fatal "not found / not yet available" condition.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_not_found())
    }
}

/// Rate limiter errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The wait was cancelled before a token became available.
    #[error("wait cancelled")]
    Cancelled,
}
