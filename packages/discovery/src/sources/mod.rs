//! Source fetcher implementations.
//!
//! Each source wraps the shared retry/backoff and pacing discipline from
//! [`retry`] and maps HTTP outcomes onto the [`SourceError`] taxonomy:
//! 429/403 are terminal for the source this run, 5xx and timeouts retry.

pub mod arbeitnow;
pub mod linkedin;
pub mod remotive;
pub mod retry;

pub use arbeitnow::ArbeitnowSource;
pub use linkedin::LinkedinSource;
pub use remotive::RemotiveSource;
pub use retry::{with_backoff, RequestPacer};

use std::sync::Arc;

use reqwest::StatusCode;

use crate::error::SourceError;
use crate::traits::source::{SourceFetcher, SourceProvider};
use crate::types::config::ScraperConfig;

/// Source names accepted in settings.
pub const REMOTIVE: &str = "remotive";
pub const ARBEITNOW: &str = "arbeitnow";
pub const LINKEDIN: &str = "linkedin";

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(source: &str, status: StatusCode) -> Option<SourceError> {
    if status.is_success() {
        return None;
    }
    let code = status.as_u16();
    Some(match code {
        429 | 403 => SourceError::Blocked {
            source_name: source.to_string(),
            status: code,
        },
        _ if status.is_server_error() => SourceError::Transient {
            source_name: source.to_string(),
            message: format!("HTTP {code}"),
        },
        _ => SourceError::InvalidResponse {
            source_name: source.to_string(),
            message: format!("unexpected HTTP {code}"),
        },
    })
}

/// Map a reqwest transport error onto the taxonomy. Timeouts and connect
/// failures are transient; anything else means the response was unusable.
pub(crate) fn classify_request_error(source: &str, err: &reqwest::Error) -> SourceError {
    if err.is_timeout() || err.is_connect() {
        SourceError::Transient {
            source_name: source.to_string(),
            message: err.to_string(),
        }
    } else {
        SourceError::InvalidResponse {
            source_name: source.to_string(),
            message: err.to_string(),
        }
    }
}

/// Default provider wiring the three real sources with their per-source
/// configs. The HTTP client is shared; pacing state is per fetcher, so
/// each fetcher is built once and reused.
pub struct DefaultSourceProvider {
    remotive: Arc<RemotiveSource>,
    arbeitnow: Arc<ArbeitnowSource>,
    linkedin: Arc<LinkedinSource>,
}

impl DefaultSourceProvider {
    pub fn new() -> Self {
        let http = reqwest::Client::new();
        Self {
            remotive: Arc::new(RemotiveSource::new(http.clone(), ScraperConfig::api_default())),
            arbeitnow: Arc::new(ArbeitnowSource::new(
                http.clone(),
                ScraperConfig::api_default(),
            )),
            linkedin: Arc::new(LinkedinSource::new(http, ScraperConfig::strict())),
        }
    }
}

impl Default for DefaultSourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for DefaultSourceProvider {
    fn fetcher(&self, name: &str) -> Option<Arc<dyn SourceFetcher>> {
        match name {
            REMOTIVE => Some(self.remotive.clone()),
            ARBEITNOW => Some(self.arbeitnow.clone()),
            LINKEDIN => Some(self.linkedin.clone()),
            _ => None,
        }
    }

    fn known_sources(&self) -> Vec<String> {
        vec![
            REMOTIVE.to_string(),
            ARBEITNOW.to_string(),
            LINKEDIN.to_string(),
        ]
    }
}
