//! Extractor seam for the enrichment stage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EnrichError;
use crate::types::candidate::{Candidate, Enrichment};
use crate::types::settings::LlmSettings;

/// Tagged result of parsing LLM content for one candidate. Parse failure is
/// data, not control flow: the stage records it and moves on.
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    /// Content parsed into the structured payload.
    Parsed(Enrichment),
    /// Content came back but did not parse; the candidate stays unenriched.
    ParseFailure { message: String },
}

/// Token counts reported by the LLM service for one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl CallUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One LLM extraction call per candidate.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        candidate: &Candidate,
        instructions: Option<&str>,
    ) -> Result<(ExtractOutcome, CallUsage), EnrichError>;
}

/// Validates the credential and builds an extractor for a session.
///
/// Creation fails fast on a malformed or missing credential, before any
/// call is made or token is spent.
pub trait ExtractorFactory: Send + Sync {
    fn create(&self, llm: &LlmSettings) -> Result<Arc<dyn Extractor>, EnrichError>;
}
