//! Minimal OpenAI REST client for chat completions.
//!
//! One bearer-authenticated HTTPS call per request, with optional
//! JSON-schema constrained output and token usage accounting. No domain
//! logic lives here; callers own prompting and response interpretation.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{OpenAIClient, ChatRequest, Message};
//!
//! let client = OpenAIClient::from_env()?;
//!
//! let response = client
//!     .chat_completion(
//!         ChatRequest::new("gpt-4o-mini").message(Message::user("Hello!")),
//!     )
//!     .await?;
//! println!("{}", response.content);
//! ```
//!
//! # Structured output
//!
//! ```rust,ignore
//! use openai_client::{response_schema, StructuredRequest};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Posting { title: String, company: String }
//!
//! let request = StructuredRequest::new(
//!     "gpt-4o-mini",
//!     "Extract the posting.",
//!     page_text,
//!     response_schema::<Posting>(),
//! );
//! let response = client.chat_structured(request).await?;
//! let posting: Posting = serde_json::from_str(&response.content)?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{OpenAIError, Result};
pub use schema::response_schema;
pub use types::{
    strip_code_blocks, ChatRequest, ChatResponse, JsonSchemaFormat, Message, ResponseFormat,
    StructuredRequest, Usage,
};

use reqwest::Client;
use tracing::debug;

use types::ChatResponseRaw;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OpenAIError::Config("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (Azure, proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Plain chat completion.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = serde_json::to_value(&request)
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;
        self.post_chat(body).await
    }

    /// Chat completion constrained to a JSON schema. The content comes
    /// back as a string; callers parse it into their own type.
    pub async fn chat_structured(&self, request: StructuredRequest) -> Result<ChatResponse> {
        let body = serde_json::to_value(&request)
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;
        self.post_chat(body).await
    }

    async fn post_chat(&self, body: serde_json::Value) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, "sending chat completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OpenAIError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OpenAIError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;

        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OpenAIError::Parse("response contained no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            usage: raw.usage,
        })
    }
}
