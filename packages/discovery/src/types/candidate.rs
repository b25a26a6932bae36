//! Candidate postings and their enrichment payload.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle of a candidate within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Pulled from a source, not yet filtered.
    Collected,
    /// Survived filtering, awaiting enrichment.
    Passed,
    /// Removed by a filter rule; `skip_reason` says which.
    Skipped,
    /// Enrichment payload attached.
    Enriched,
}

/// One discovered job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable id derived from source name and posting URL.
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: String,
    /// Name of the source fetcher that produced this candidate.
    pub source: String,
    #[serde(default)]
    pub country: Option<String>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub enrichment: Option<Enrichment>,
    pub collected_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a freshly collected candidate.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let url = url.into();
        Self {
            id: Self::stable_id(&source, &url),
            title: title.into(),
            company: company.into(),
            description: description.into(),
            url,
            source,
            country: None,
            status: CandidateStatus::Collected,
            skip_reason: None,
            enrichment: None,
            collected_at: Utc::now(),
        }
    }

    /// Set the country/location.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Id derived from source and posting URL. The same posting collected
    /// twice (e.g. across overlapping search terms, or after a resume)
    /// dedupes to one candidate.
    pub fn stable_id(source: &str, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b":");
        hasher.update(url.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Structured data extracted by the LLM for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Enrichment {
    pub company_profile: CompanyProfile,
    pub role: RoleDetails,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub compensation: Option<Compensation>,
    #[serde(default)]
    pub application: Option<ApplicationInfo>,
}

/// What the posting reveals about the hiring company.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// The role itself.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoleDetails {
    pub title: String,
    #[serde(default)]
    pub seniority: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub remote: Option<bool>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// Compensation, when the posting states it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Compensation {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// "year", "month", "hour"
    #[serde(default)]
    pub period: Option<String>,
}

/// How to apply.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationInfo {
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}
