//! OpenAI-backed extractor.
//!
//! One structured chat completion per candidate. The response content is
//! parsed into the enrichment payload; unparseable content becomes a
//! `ParseFailure` outcome rather than an error, since the stage is
//! expected to continue past bad completions.

use std::sync::Arc;

use async_trait::async_trait;
use openai_client::{response_schema, strip_code_blocks, OpenAIClient, StructuredRequest};

use crate::ai::{extraction_system_prompt, extraction_user_prompt, validate_credential};
use crate::error::EnrichError;
use crate::traits::extractor::{CallUsage, ExtractOutcome, Extractor, ExtractorFactory};
use crate::types::candidate::{Candidate, Enrichment};
use crate::types::settings::LlmSettings;

/// Extractor calling the OpenAI chat completions endpoint.
pub struct OpenAiExtractor {
    client: OpenAIClient,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(
        &self,
        candidate: &Candidate,
        instructions: Option<&str>,
    ) -> Result<(ExtractOutcome, CallUsage), EnrichError> {
        let request = StructuredRequest::new(
            &self.model,
            extraction_system_prompt(instructions),
            extraction_user_prompt(candidate),
            response_schema::<Enrichment>(),
        );

        let response = self
            .client
            .chat_structured(request)
            .await
            .map_err(|e| EnrichError::Request(e.to_string()))?;

        let usage = response
            .usage
            .map(|u| CallUsage {
                prompt_tokens: u64::from(u.prompt_tokens),
                completion_tokens: u64::from(u.completion_tokens),
            })
            .unwrap_or_default();

        let content = strip_code_blocks(&response.content);
        let outcome = match serde_json::from_str::<Enrichment>(content) {
            Ok(enrichment) => ExtractOutcome::Parsed(enrichment),
            Err(e) => ExtractOutcome::ParseFailure {
                message: e.to_string(),
            },
        };

        Ok((outcome, usage))
    }
}

/// Factory validating the credential format before building the extractor.
pub struct OpenAiExtractorFactory;

impl ExtractorFactory for OpenAiExtractorFactory {
    fn create(&self, llm: &LlmSettings) -> Result<Arc<dyn Extractor>, EnrichError> {
        validate_credential(&llm.api_key)?;
        let client = OpenAIClient::new(llm.api_key.trim());
        Ok(Arc::new(OpenAiExtractor::new(client, &llm.model)))
    }
}
