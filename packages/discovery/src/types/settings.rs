//! Settings consumed at session start and resume.

use serde::{Deserialize, Serialize};

/// Default chat model for enrichment.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// LLM credential and configuration for the enrichment stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Extra extraction instructions appended to the system prompt.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            instructions: None,
        }
    }
}

/// Settings for one search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Search terms fetched against every enabled source.
    pub search_terms: Vec<String>,
    /// Enabled source names (see [`crate::sources`]).
    pub sources: Vec<String>,
    #[serde(default)]
    pub blacklist_companies: Vec<String>,
    #[serde(default)]
    pub blacklist_title_words: Vec<String>,
    #[serde(default)]
    pub blacklist_description_words: Vec<String>,
    /// Empty means every country passes.
    #[serde(default)]
    pub country_whitelist: Vec<String>,
    /// Languages the user can work in; carried through to reports.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub llm: LlmSettings,
}

impl SearchSettings {
    /// Shape validation, applied before any session or pipeline is created.
    pub fn validate(&self, known_sources: &[String]) -> Result<(), String> {
        if self.search_terms.iter().all(|t| t.trim().is_empty()) {
            return Err("at least one non-empty search term is required".to_string());
        }
        if self.sources.is_empty() {
            return Err("at least one source must be enabled".to_string());
        }
        for source in &self.sources {
            if !known_sources.iter().any(|k| k == source) {
                return Err(format!("unknown source: {source}"));
            }
        }
        Ok(())
    }
}
