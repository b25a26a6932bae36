//! LLM-backed enrichment support: credential checks, cost accounting,
//! and prompt assembly.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::EnrichError;
use crate::traits::extractor::CallUsage;
use crate::types::candidate::Candidate;

#[cfg(feature = "openai")]
pub mod openai;

/// Cap on description text shipped in a prompt.
const MAX_DESCRIPTION_BYTES: usize = 8_000;

lazy_static! {
    /// OpenAI-style secret key: `sk-` prefix plus at least 20 key chars.
    static ref CREDENTIAL_RE: Regex =
        Regex::new(r"^sk-[A-Za-z0-9_-]{20,}$").expect("valid regex");
}

/// Format-validate an API credential. Runs before any call is made so a
/// bad key fails the stage with zero spend.
pub fn validate_credential(key: &str) -> Result<(), EnrichError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EnrichError::InvalidCredential(
            "credential is empty".to_string(),
        ));
    }
    if !CREDENTIAL_RE.is_match(key) {
        return Err(EnrichError::InvalidCredential(
            "credential does not look like an API key (expected sk- prefix)".to_string(),
        ));
    }
    Ok(())
}

/// Published per-million-token USD rates (prompt, completion) used for
/// cost accounting. Unknown models fall back to the mini tier.
pub fn model_rates(model: &str) -> (f64, f64) {
    if model.starts_with("gpt-4o-mini") {
        (0.15, 0.60)
    } else if model.starts_with("gpt-4o") {
        (2.50, 10.00)
    } else if model.starts_with("gpt-4.1-mini") {
        (0.40, 1.60)
    } else if model.starts_with("gpt-4.1") {
        (2.00, 8.00)
    } else {
        (0.15, 0.60)
    }
}

/// Cost of one call at the model's published rates.
pub fn call_cost(model: &str, usage: &CallUsage) -> f64 {
    let (prompt_rate, completion_rate) = model_rates(model);
    usage.prompt_tokens as f64 / 1_000_000.0 * prompt_rate
        + usage.completion_tokens as f64 / 1_000_000.0 * completion_rate
}

/// System prompt for the structured-extraction call.
pub fn extraction_system_prompt(instructions: Option<&str>) -> String {
    let mut prompt = String::from(
        "You extract structured facts from job postings. Use only what the \
         posting states; leave fields null rather than guessing. Respond \
         with JSON matching the provided schema.",
    );
    if let Some(extra) = instructions {
        if !extra.trim().is_empty() {
            prompt.push_str("\n\nAdditional instructions:\n");
            prompt.push_str(extra.trim());
        }
    }
    prompt
}

/// User prompt carrying one candidate's fields.
pub fn extraction_user_prompt(candidate: &Candidate) -> String {
    let description = truncate_to_char_boundary(&candidate.description, MAX_DESCRIPTION_BYTES);
    format!(
        "Job posting from {source}:\n\
         Title: {title}\n\
         Company: {company}\n\
         Location: {location}\n\
         URL: {url}\n\n\
         Description:\n{description}",
        source = candidate.source,
        title = candidate.title,
        company = candidate.company,
        location = candidate.country.as_deref().unwrap_or("unknown"),
        url = candidate.url,
    )
}

/// Truncate to at most `max_bytes` bytes without splitting a character.
fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_credential() {
        assert!(matches!(
            validate_credential(""),
            Err(EnrichError::InvalidCredential(_))
        ));
        assert!(matches!(
            validate_credential("   "),
            Err(EnrichError::InvalidCredential(_))
        ));
    }

    #[test]
    fn rejects_malformed_credential() {
        assert!(validate_credential("not-a-key").is_err());
        assert!(validate_credential("sk-short").is_err());
        assert!(validate_credential("sk-has spaces in the middle").is_err());
    }

    #[test]
    fn accepts_plausible_credential() {
        assert!(validate_credential("sk-proj-abc123DEF456ghi789jkl").is_ok());
        assert!(validate_credential("  sk-abcdefghij0123456789xyz  ").is_ok());
    }

    #[test]
    fn cost_uses_model_rates() {
        let usage = CallUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
        };
        let mini = call_cost("gpt-4o-mini", &usage);
        assert!((mini - 0.75).abs() < 1e-9);

        let full = call_cost("gpt-4o", &usage);
        assert!((full - 12.50).abs() < 1e-9);
        assert!(full > mini);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        assert_eq!(call_cost("gpt-4o-mini", &CallUsage::default()), 0.0);
    }

    #[test]
    fn user_prompt_carries_candidate_fields() {
        let candidate = Candidate::new(
            "remotive",
            "https://example.com/j/1",
            "Rust Engineer",
            "Acme",
            "Build pipelines",
        )
        .with_country("Germany");

        let prompt = extraction_user_prompt(&candidate);
        assert!(prompt.contains("Rust Engineer"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("Germany"));
        assert!(prompt.contains("Build pipelines"));
    }

    #[test]
    fn system_prompt_appends_instructions() {
        let plain = extraction_system_prompt(None);
        let custom = extraction_system_prompt(Some("Focus on visa sponsorship"));
        assert!(custom.starts_with(&plain));
        assert!(custom.contains("visa sponsorship"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld";
        let truncated = truncate_to_char_boundary(text, 3);
        assert!(truncated.len() <= 3);
        assert!(text.starts_with(truncated));
    }
}
