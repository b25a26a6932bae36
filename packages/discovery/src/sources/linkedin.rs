//! LinkedIn guest job search source (rendered HTML).
//!
//! LinkedIn has no public postings API, so this fetcher scrapes the guest
//! search endpoint that backs the logged-out jobs page. It is the most
//! fragile source in the set: markup changes break the selectors, and the
//! site blocks aggressively (403, occasionally a bare 429), which is why
//! it runs with the strict scraper config and a browser-like User-Agent.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::sources::{classify_request_error, classify_status, retry, RequestPacer, LINKEDIN};
use crate::traits::source::{FetchOutcome, SourceFetcher};
use crate::types::candidate::Candidate;
use crate::types::config::ScraperConfig;

const DEFAULT_BASE_URL: &str = "https://www.linkedin.com";
const SEARCH_PATH: &str = "/jobs-guest/jobs/api/seeMoreJobPostings/search";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fetches postings by scraping LinkedIn's guest job search fragment.
pub struct LinkedinSource {
    http: reqwest::Client,
    config: ScraperConfig,
    pacer: RequestPacer,
    base_url: String,
}

impl LinkedinSource {
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

        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let response = self
            .http
            .get(&url)
            .query(&[("keywords", query), ("start", "0")])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(LINKEDIN, &e))?;

        if let Some(err) = classify_status(LINKEDIN, response.status()) {
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                source_name: LINKEDIN.to_string(),
                message: e.to_string(),
            })?;

        let outcome = parse_job_cards(&body, self.config.max_results);
        debug!(
            query,
            candidates = outcome.candidates.len(),
            "linkedin fetch"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl SourceFetcher for LinkedinSource {
    async fn check_availability(&self) -> bool {
        match self
            .http
            .get(&self.base_url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
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
        LINKEDIN
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Pull job cards out of the guest search HTML fragment.
///
/// Search cards carry no description text; those candidates go through
/// filtering on title/company/location only.
fn parse_job_cards(html: &str, limit: usize) -> FetchOutcome {
    let document = Html::parse_document(html);
    let card_sel = selector("div.base-search-card");
    let title_sel = selector("h3.base-search-card__title");
    let company_sel = selector("h4.base-search-card__subtitle");
    let location_sel = selector("span.job-search-card__location");
    let link_sel = selector("a.base-card__full-link");

    let mut outcome = FetchOutcome::default();
    let mut seen_urls: Vec<String> = Vec::new();

    for card in document.select(&card_sel) {
        if outcome.candidates.len() >= limit {
            break;
        }

        let title = text_of(&card, &title_sel);
        let company = text_of(&card, &company_sel);
        let location = text_of(&card, &location_sel);
        let href = card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            // Guest links carry per-request tracking params; strip them so
            // candidate ids stay stable across fetches.
            .and_then(|h| h.split('?').next())
            .map(str::to_string);

        let (Some(title), Some(company), Some(url)) = (title, company, href) else {
            outcome
                .errors
                .push("linkedin card missing title, company, or link".to_string());
            continue;
        };

        if seen_urls.contains(&url) {
            continue;
        }
        seen_urls.push(url.clone());

        let mut candidate = Candidate::new(LINKEDIN, &url, &title, &company, "");
        if let Some(location) = location {
            // "City, Region, Country" - the trailing segment is the most
            // useful match for a country whitelist.
            if let Some(country) = location.rsplit(',').next() {
                candidate = candidate.with_country(country.trim());
            }
        }
        outcome.candidates.push(candidate);
    }

    outcome
}

fn text_of(card: &scraper::ElementRef<'_>, sel: &Selector) -> Option<String> {
    let text = card
        .select(sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
