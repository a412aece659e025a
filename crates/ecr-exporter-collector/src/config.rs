//! Collector configuration.

use std::time::Duration;

use crate::error::{CollectorError, Result};

/// Configuration for the collection pipeline.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Sustained upstream request rate, in requests per second.
    pub rate_limit_frequency: f64,

    /// Number of requests allowed in a burst.
    pub rate_limit_burst: u32,

    /// How long a digest's scan findings are considered fresh.
    pub cache_ttl: Duration,

    /// Maximum number of digests remembered by the dedup cache.
    pub cache_capacity: u64,

    /// Per-repository budget of (digest, tag) pairs emitted each cycle.
    ///
    /// `None` disables the budget.
    pub tag_limit: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            rate_limit_frequency: 2.0,
            rate_limit_burst: 1,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_capacity: 100_000,
            tag_limit: None,
        }
    }
}

impl CollectorConfig {
    /// Creates a configuration builder.
    pub fn builder() -> CollectorConfigBuilder {
        CollectorConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.rate_limit_frequency.is_finite() && self.rate_limit_frequency > 0.0) {
            return Err(CollectorError::InvalidConfig {
                reason: format!(
                    "rate limit frequency must be positive, got {}",
                    self.rate_limit_frequency
                ),
            });
        }

        if self.rate_limit_burst == 0 {
            return Err(CollectorError::InvalidConfig {
                reason: "rate limit burst must be at least 1".to_string(),
            });
        }

        if self.cache_ttl.is_zero() {
            return Err(CollectorError::InvalidConfig {
                reason: "cache TTL must be non-zero".to_string(),
            });
        }

        if self.cache_capacity == 0 {
            return Err(CollectorError::InvalidConfig {
                reason: "cache capacity must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for `CollectorConfig`.
#[derive(Debug, Default)]
pub struct CollectorConfigBuilder {
    rate_limit_frequency: Option<f64>,
    rate_limit_burst: Option<u32>,
    cache_ttl: Option<Duration>,
    cache_capacity: Option<u64>,
    tag_limit: Option<Option<usize>>,
}

impl CollectorConfigBuilder {
    /// Sets the sustained request rate.
    pub fn rate_limit_frequency(mut self, frequency: f64) -> Self {
        self.rate_limit_frequency = Some(frequency);
        self
    }

    /// Sets the burst size.
    pub fn rate_limit_burst(mut self, burst: u32) -> Self {
        self.rate_limit_burst = Some(burst);
        self
    }

    /// Sets the dedup cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the dedup cache capacity.
    pub fn cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Limits the number of tags emitted per repository each cycle.
    pub fn tag_limit(mut self, limit: usize) -> Self {
        self.tag_limit = Some(Some(limit));
        self
    }

    /// Removes the tag limit.
    pub fn unlimited_tags(mut self) -> Self {
        self.tag_limit = Some(None);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CollectorConfig {
        let defaults = CollectorConfig::default();
        CollectorConfig {
            rate_limit_frequency: self
                .rate_limit_frequency
                .unwrap_or(defaults.rate_limit_frequency),
            rate_limit_burst: self.rate_limit_burst.unwrap_or(defaults.rate_limit_burst),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            cache_capacity: self.cache_capacity.unwrap_or(defaults.cache_capacity),
            tag_limit: self.tag_limit.unwrap_or(defaults.tag_limit),
        }
    }
}
