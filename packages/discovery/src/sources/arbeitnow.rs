//! Arbeitnow job board source (JSON API).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::sources::{classify_request_error, classify_status, retry, RequestPacer, ARBEITNOW};
use crate::traits::source::{FetchOutcome, SourceFetcher};
use crate::types::candidate::Candidate;
use crate::types::config::ScraperConfig;

const DEFAULT_BASE_URL: &str = "https://www.arbeitnow.com";

#[derive(Debug, Deserialize)]
struct ArbeitnowResponse {
    data: Vec<ArbeitnowJob>,
}

#[derive(Debug, Deserialize)]
struct ArbeitnowJob {
    slug: String,
    company_name: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    remote: bool,
    url: String,
    #[serde(default)]
    location: String,
}

/// Fetches postings from the public Arbeitnow job board API.
pub struct ArbeitnowSource {
    http: reqwest::Client,
    config: ScraperConfig,
    pacer: RequestPacer,
    base_url: String,
}

impl ArbeitnowSource {
    pub fn new(http: reqwest::Client, config: ScraperConfig) -> Self {
        let pacer = RequestPacer::new(config.rate_limit_delay);
        Self {
            http,
            config,
            pacer,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, query: &str) -> SourceResult<FetchOutcome> {
        self.pacer.wait().await;

        let url = format!("{}/api/job-board-api", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("search", query), ("page", "1")])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(ARBEITNOW, &e))?;

        if let Some(err) = classify_status(ARBEITNOW, response.status()) {
            return Err(err);
        }

        let body: ArbeitnowResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    source_name: ARBEITNOW.to_string(),
                    message: e.to_string(),
                })?;

        let mut outcome = FetchOutcome::default();
        for job in body.data.into_iter().take(self.config.max_results) {
            if job.url.is_empty() {
                outcome
                    .errors
                    .push(format!("arbeitnow job '{}' has no URL", job.slug));
                continue;
            }
            let mut candidate = Candidate::new(
                ARBEITNOW,
                &job.url,
                &job.title,
                &job.company_name,
                &job.description,
            );
            // The board lists city-level locations; remote-only postings
            // often leave it blank.
            if !job.location.is_empty() {
                candidate = candidate.with_country(job.location);
            } else if job.remote {
                candidate = candidate.with_country("Remote");
            }
            outcome.candidates.push(candidate);
        }

        debug!(
            query,
            candidates = outcome.candidates.len(),
            "arbeitnow fetch"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl SourceFetcher for ArbeitnowSource {
    async fn check_availability(&self) -> bool {
        let url = format!("{}/api/job-board-api", self.base_url);
        match self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn fetch(&self, query: &str) -> SourceResult<FetchOutcome> {
        retry::with_backoff(&self.config, || self.request(query)).await
    }

    fn source_name(&self) -> &str {
        ARBEITNOW
    }
}
