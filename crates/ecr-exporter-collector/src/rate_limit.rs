//! Token-bucket rate limiting for upstream calls.
//!
//! Every page fetch at every traversal level acquires one token from the
//! shared [`RateLimiter`] immediately before issuing its request.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CollectorError, RateLimitError, Result};

/// Token bucket shared by every traversal branch.
///
/// The bucket holds at most `burst` tokens and refills at `rate` tokens per
/// second. Waiters reserve a token up front, so concurrent callers are served
/// in arrival order and never exceed the configured pace.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    /// May go negative: outstanding reservations not yet paid back.
    tokens: f64,
    updated_at: Instant,
}

impl RateLimiter {
    /// Creates a limiter with a full bucket.
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(CollectorError::InvalidConfig {
                reason: format!("rate limit frequency must be positive, got {rate}"),
            });
        }
        if burst == 0 {
            return Err(CollectorError::InvalidConfig {
                reason: "rate limit burst must be at least 1".to_string(),
            });
        }

        Ok(Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                updated_at: Instant::now(),
            }),
        })
    }

    /// Sustained rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Waits for a token.
    ///
    /// Returns an error only if `cancel` fires first, in which case the
    /// reserved token is handed back.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RateLimitError> {
        if cancel.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }

        let wait = self.reserve();
        if wait.is_zero() {
            return Ok(());
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.release();
                Err(RateLimitError::Cancelled)
            }
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }

    /// Takes a token and returns how long the caller must wait before using it.
    fn reserve(&self) -> Duration {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            // Very low rates can push the wait past what a Duration can hold.
            Duration::try_from_secs_f64(-bucket.tokens / self.rate).unwrap_or(Duration::MAX)
        }
    }

    fn release(&self) {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens = (bucket.tokens + 1.0).min(f64::from(self.burst));
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.updated_at);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(f64::from(self.burst));
        bucket.updated_at = now;
    }
}
