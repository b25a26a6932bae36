//! Remotive job board source (JSON API).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::sources::{classify_request_error, classify_status, retry, RequestPacer, REMOTIVE};
use crate::traits::source::{FetchOutcome, SourceFetcher};
use crate::types::candidate::Candidate;
use crate::types::config::ScraperConfig;

const DEFAULT_BASE_URL: &str = "https://remotive.com";

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize)]
struct RemotiveJob {
    id: u64,
    url: String,
    title: String,
    company_name: String,
    #[serde(default)]
    candidate_required_location: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Fetches remote postings from the public Remotive API.
pub struct RemotiveSource {
    http: reqwest::Client,
    config: ScraperConfig,
    pacer: RequestPacer,
    base_url: String,
}

impl RemotiveSource {
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

        let url = format!("{}/api/remote-jobs", self.base_url);
        let limit = self.config.max_results.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[("search", query), ("limit", limit.as_str())])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(REMOTIVE, &e))?;

        if let Some(err) = classify_status(REMOTIVE, response.status()) {
            return Err(err);
        }

        let body: RemotiveResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    source_name: REMOTIVE.to_string(),
                    message: e.to_string(),
                })?;

        let mut outcome = FetchOutcome::default();
        for job in body.jobs.into_iter().take(self.config.max_results) {
            if job.url.is_empty() {
                outcome
                    .errors
                    .push(format!("remotive job {} has no URL", job.id));
                continue;
            }
            let mut candidate = Candidate::new(
                REMOTIVE,
                &job.url,
                &job.title,
                &job.company_name,
                job.description.as_deref().unwrap_or(""),
            );
            if let Some(location) = job.candidate_required_location {
                candidate = candidate.with_country(location);
            }
            outcome.candidates.push(candidate);
        }

        debug!(
            query,
            candidates = outcome.candidates.len(),
            "remotive fetch"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl SourceFetcher for RemotiveSource {
    async fn check_availability(&self) -> bool {
        let url = format!("{}/api/remote-jobs", self.base_url);
        match self
            .http
            .get(&url)
            .query(&[("limit", "1")])
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
        REMOTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_response_shape() {
        let json = r#"{
            "jobs": [
                {
                    "id": 1,
                    "url": "https://remotive.com/jobs/1",
                    "title": "Rust Engineer",
                    "company_name": "Acme",
                    "candidate_required_location": "Worldwide",
                    "description": "Build things"
                },
                {
                    "id": 2,
                    "url": "https://remotive.com/jobs/2",
                    "title": "Backend Engineer",
                    "company_name": "Globex"
                }
            ]
        }"#;

        let parsed: RemotiveResponse = serde_json::from_str(json).expect("parses");
        assert_eq!(parsed.jobs.len(), 2);
        assert_eq!(parsed.jobs[0].company_name, "Acme");
        assert!(parsed.jobs[1].candidate_required_location.is_none());
    }
}
