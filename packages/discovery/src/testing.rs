//! Mock implementations of the pipeline seams.
//!
//! Useful for testing orchestration and stage logic without real network
//! or LLM calls. All mocks are builder-style and record their calls.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::ai::validate_credential;
use crate::error::{EnrichError, SourceError, SourceResult};
use crate::traits::extractor::{
    CallUsage, ExtractOutcome, Extractor, ExtractorFactory,
};
use crate::traits::source::{FetchOutcome, SourceFetcher, SourceProvider};
use crate::types::candidate::{
    Candidate, CompanyProfile, Enrichment, RoleDetails,
};
use crate::types::settings::{LlmSettings, SearchSettings};

/// API key accepted by the real credential format check.
pub const TEST_API_KEY: &str = "sk-test0123456789abcdefghij";

/// Build a collected candidate with sensible defaults.
pub fn candidate(source: &str, url: &str, title: &str, company: &str) -> Candidate {
    Candidate::new(source, url, title, company, format!("{title} at {company}"))
}

/// Build settings with a valid test credential and no filter rules.
pub fn settings(terms: &[&str], sources: &[&str]) -> SearchSettings {
    SearchSettings {
        search_terms: terms.iter().map(|t| t.to_string()).collect(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        blacklist_companies: vec![],
        blacklist_title_words: vec![],
        blacklist_description_words: vec![],
        country_whitelist: vec![],
        languages: vec![],
        llm: LlmSettings {
            api_key: TEST_API_KEY.to_string(),
            ..Default::default()
        },
    }
}

/// A deterministic enrichment payload for mocks.
pub fn sample_enrichment(company: &str, title: &str) -> Enrichment {
    Enrichment {
        company_profile: CompanyProfile {
            name: company.to_string(),
            industry: Some("Software".to_string()),
            size: None,
            summary: None,
        },
        role: RoleDetails {
            title: title.to_string(),
            seniority: Some("senior".to_string()),
            employment_type: Some("full-time".to_string()),
            remote: Some(true),
            responsibilities: vec![],
            requirements: vec![],
        },
        technologies: vec!["rust".to_string()],
        compensation: None,
        application: None,
    }
}

/// A mock source fetcher with canned results per query.
pub struct MockSource {
    name: String,
    available: bool,
    results: RwLock<HashMap<String, Vec<Candidate>>>,
    fallback: RwLock<Vec<Candidate>>,
    failure: RwLock<Option<SourceError>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            results: RwLock::new(HashMap::new()),
            fallback: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Canned candidates for a specific query.
    pub fn with_results(self, query: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        self.results
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.into(), candidates);
        self
    }

    /// Canned candidates for any query without a specific entry.
    pub fn with_fallback(self, candidates: Vec<Candidate>) -> Self {
        *self.fallback.write().unwrap_or_else(|e| e.into_inner()) = candidates;
        self
    }

    /// Every fetch fails with this error.
    pub fn with_failure(self, error: SourceError) -> Self {
        *self.failure.write().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    /// Sleep before answering, so tests can interleave control commands.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the availability probe.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Queries fetched so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SourceFetcher for MockSource {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn fetch(&self, query: &str) -> SourceResult<FetchOutcome> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self
            .failure
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(error);
        }

        let candidates = self
            .results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(query)
            .cloned()
            .unwrap_or_else(|| {
                self.fallback
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            });

        Ok(FetchOutcome {
            candidates,
            errors: vec![],
        })
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Provider serving a fixed set of mock fetchers.
#[derive(Default)]
pub struct MockSourceProvider {
    fetchers: HashMap<String, Arc<dyn SourceFetcher>>,
}

impl MockSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetchers
            .insert(fetcher.source_name().to_string(), fetcher);
        self
    }
}

impl SourceProvider for MockSourceProvider {
    fn fetcher(&self, name: &str) -> Option<Arc<dyn SourceFetcher>> {
        self.fetchers.get(name).cloned()
    }

    fn known_sources(&self) -> Vec<String> {
        self.fetchers.keys().cloned().collect()
    }
}

/// A mock extractor returning a canned payload (or parse failure) with
/// fixed per-call usage.
#[derive(Clone)]
pub struct MockExtractor {
    parse_failure: bool,
    usage: CallUsage,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            parse_failure: false,
            usage: CallUsage {
                prompt_tokens: 500,
                completion_tokens: 200,
            },
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Every call returns unparseable content.
    pub fn with_parse_failure(mut self) -> Self {
        self.parse_failure = true;
        self
    }

    pub fn with_usage(mut self, usage: CallUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Sleep before answering, so tests can interleave control commands.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Candidate ids extracted so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(
        &self,
        candidate: &Candidate,
        _instructions: Option<&str>,
    ) -> Result<(ExtractOutcome, CallUsage), EnrichError> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(candidate.id.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = if self.parse_failure {
            ExtractOutcome::ParseFailure {
                message: "expected value at line 1 column 1".to_string(),
            }
        } else {
            ExtractOutcome::Parsed(sample_enrichment(&candidate.company, &candidate.title))
        };

        Ok((outcome, self.usage))
    }
}

/// Factory wrapping a mock extractor behind the real credential check.
pub struct MockExtractorFactory {
    extractor: MockExtractor,
    validate: bool,
}

impl MockExtractorFactory {
    pub fn new(extractor: MockExtractor) -> Self {
        Self {
            extractor,
            validate: true,
        }
    }

    /// Skip the credential format check.
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

impl ExtractorFactory for MockExtractorFactory {
    fn create(&self, llm: &LlmSettings) -> Result<Arc<dyn Extractor>, EnrichError> {
        if self.validate {
            validate_credential(&llm.api_key)?;
        }
        Ok(Arc::new(self.extractor.clone()))
    }
}
