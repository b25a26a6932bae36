//! Per-source fetch tunables.

use std::time::Duration;

/// Tunables for one source fetcher: retry, backoff, timeout, pacing.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Retries after the first attempt, transient errors only.
    pub max_retries: u32,
    /// Backoff for attempt `n` is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Fixed spacing between consecutive requests to this source.
    pub rate_limit_delay: Duration,
    /// Cap on postings taken per request.
    pub max_results: usize,
}

impl ScraperConfig {
    /// Defaults suitable for cooperative JSON APIs.
    pub fn api_default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(20),
            rate_limit_delay: Duration::from_secs(1),
            max_results: 50,
        }
    }

    /// Defaults for sources with aggressive anti-automation defenses:
    /// slower pacing, longer backoff, more patience.
    pub fn strict() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            rate_limit_delay: Duration::from_secs(5),
            max_results: 25,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_rate_limit_delay(mut self, rate_limit_delay: Duration) -> Self {
        self.rate_limit_delay = rate_limit_delay;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self::api_default()
    }
}
