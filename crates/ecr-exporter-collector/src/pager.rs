//! Cursor-based pagination over upstream listings.

use ecr_exporter_registry::{Page, RegistryError};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{CollectorError, Result};
use crate::rate_limit::RateLimiter;

#[derive(Debug)]
enum Cursor {
    First,
    Next(String),
    Done,
}

/// Lazily walks a paginated listing, one rate-limited request per page.
///
/// The continuation token is never inspected, only forwarded. Any fetch error
/// ends the walk, so a failing request is not re-issued by the same pager.
pub struct Pager<F> {
    operation: &'static str,
    fetch: F,
    cursor: Cursor,
}

impl<F, Fut, T> Pager<F>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<Page<T>, RegistryError>>,
{
    /// Creates a pager. `fetch` issues one request for the given token.
    pub fn new(operation: &'static str, fetch: F) -> Self {
        Self {
            operation,
            fetch,
            cursor: Cursor::First,
        }
    }

    /// Returns true while another page can be requested.
    pub fn has_more(&self) -> bool {
        !matches!(self.cursor, Cursor::Done)
    }

    /// Fetches the next page.
    ///
    /// Acquires one limiter token, then issues the request. Both steps abort
    /// when `cancel` fires.
    pub async fn next(
        &mut self,
        limiter: &RateLimiter,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::First => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => {
                return Err(CollectorError::PagerExhausted {
                    operation: self.operation,
                })
            }
        };

        limiter.acquire(cancel).await?;

        let page = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(CollectorError::Cancelled {
                    operation: self.operation,
                })
            }
            page = (self.fetch)(token) => page?,
        };

        if let Some(next) = page.next_token.filter(|t| !t.is_empty()) {
            self.cursor = Cursor::Next(next);
        }

        Ok(page.items)
    }
}
