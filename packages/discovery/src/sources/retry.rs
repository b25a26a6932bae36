//! Request discipline shared by source fetchers: exponential backoff for
//! transient failures and fixed pacing between consecutive requests.

use std::future::Future;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::error::{SourceError, SourceResult};
use crate::types::config::ScraperConfig;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Run `op` until it succeeds, a non-transient error occurs, or
/// `max_retries` retries are spent. The delay before retry `n` is
/// `base_delay * 2^(n-1)`.
///
/// Blocked (429/403) and invalid-response errors return immediately;
/// retrying a source that is actively refusing us only worsens the block.
pub async fn with_backoff<T, F, Fut>(config: &ScraperConfig, mut op: F) -> SourceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SourceResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.base_delay * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(
                    source = err.source_name(),
                    attempt,
                    ?delay,
                    "transient source error, backing off: {err}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fixed spacing between consecutive requests to one source.
///
/// Wraps a governor rate limiter with a one-request quota per period, so
/// the effective behavior is "at most one request every `delay`".
pub struct RequestPacer {
    limiter: DirectRateLimiter,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        let quota = Quota::with_period(delay).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the next request slot opens.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}
