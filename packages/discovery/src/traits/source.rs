//! Source fetcher contract.
//!
//! Every external job source sits behind this trait so the fragile parts
//! (HTML scraping, rate limits, anti-automation defenses) stay isolated
//! from the orchestrator and can be mocked in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceResult;
use crate::types::candidate::Candidate;

/// Result of one fetch against a source.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub candidates: Vec<Candidate>,
    /// Per-item problems that did not fail the call as a whole.
    pub errors: Vec<String>,
}

/// Contract every external job source implements.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Cheap reachability probe. A false return skips this source for the
    /// current run.
    async fn check_availability(&self) -> bool;

    /// Fetch postings matching a search term. Implementations handle their
    /// own retry, backoff, and rate-limit pacing.
    async fn fetch(&self, query: &str) -> SourceResult<FetchOutcome>;

    /// Stable name used in candidate records, settings, and error reports.
    fn source_name(&self) -> &str;
}

/// Builds fetchers for enabled source names. Seam for tests.
pub trait SourceProvider: Send + Sync {
    fn fetcher(&self, name: &str) -> Option<Arc<dyn SourceFetcher>>;

    /// Names this provider can build; settings validation checks against it.
    fn known_sources(&self) -> Vec<String>;
}
