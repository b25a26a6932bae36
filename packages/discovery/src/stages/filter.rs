//! Filtering stage: pure blacklist/whitelist rules over collected
//! candidates. No network access.

use std::sync::Mutex as StdMutex;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::info;

use crate::eta::EtaEngine;
use crate::stages::StageExit;
use crate::types::candidate::{Candidate, CandidateStatus};
use crate::types::session::{FilteringStats, Session, SessionStatus, Stage};
use crate::types::settings::SearchSettings;

/// Skip reason labels reported in the filtering histogram.
pub const SKIP_COMPANY_BLACKLISTED: &str = "company_blacklisted";
pub const SKIP_TITLE_BLACKLISTED: &str = "title_blacklisted";
pub const SKIP_DESCRIPTION_BLACKLISTED: &str = "description_blacklisted";
pub const SKIP_COUNTRY_NOT_WHITELISTED: &str = "country_not_whitelisted";

/// Apply the filter rules in order to every collected candidate.
///
/// Rules: company blacklist, then title words, then description words,
/// then the country whitelist. Each skipped candidate counts under exactly
/// one reason - the first rule that matched - so blacklist outcomes take
/// precedence over whitelist inclusion.
pub fn apply_filters(candidates: &mut [Candidate], settings: &SearchSettings) -> FilteringStats {
    let mut stats = FilteringStats::default();

    for candidate in candidates.iter_mut() {
        // Resume safety: leave already-filtered or enriched entries alone.
        if candidate.status != CandidateStatus::Collected {
            continue;
        }

        match skip_reason(candidate, settings) {
            Some(reason) => {
                candidate.status = CandidateStatus::Skipped;
                candidate.skip_reason = Some(reason.to_string());
                stats.total_skipped += 1;
                *stats.skip_reasons.entry(reason.to_string()).or_insert(0) += 1;
            }
            None => {
                candidate.status = CandidateStatus::Passed;
                stats.total_passed += 1;
            }
        }
    }

    stats
}

fn skip_reason(candidate: &Candidate, settings: &SearchSettings) -> Option<&'static str> {
    let company = candidate.company.to_lowercase();
    if settings.blacklist_companies.iter().any(|entry| {
        let entry = entry.to_lowercase();
        !entry.is_empty() && (company == entry || company.contains(&entry))
    }) {
        return Some(SKIP_COMPANY_BLACKLISTED);
    }

    let title = candidate.title.to_lowercase();
    if contains_any_word(&title, &settings.blacklist_title_words) {
        return Some(SKIP_TITLE_BLACKLISTED);
    }

    let description = candidate.description.to_lowercase();
    if contains_any_word(&description, &settings.blacklist_description_words) {
        return Some(SKIP_DESCRIPTION_BLACKLISTED);
    }

    if !settings.country_whitelist.is_empty() {
        let allowed = candidate.country.as_deref().is_some_and(|country| {
            settings.country_whitelist.iter().any(|entry| {
                country.eq_ignore_ascii_case(entry)
                    || country.to_lowercase().contains(&entry.to_lowercase())
            })
        });
        // A candidate with no known country cannot satisfy a whitelist.
        if !allowed {
            return Some(SKIP_COUNTRY_NOT_WHITELISTED);
        }
    }

    None
}

fn contains_any_word(haystack: &str, words: &[String]) -> bool {
    words.iter().any(|word| {
        let word = word.to_lowercase();
        !word.is_empty() && haystack.contains(&word)
    })
}

/// Stage wrapper: single critical section, since the pass is synchronous.
pub async fn run_filtering(session: &Mutex<Session>, eta: &StdMutex<EtaEngine>) -> StageExit {
    let started = Instant::now();

    let total = {
        let mut s = session.lock().await;
        if s.status != SessionStatus::Running {
            return StageExit::Interrupted;
        }
        let total = s.candidates.len();
        s.stages.get_mut(Stage::Filtering).begin(total);

        let settings = s.settings.clone();
        let stats = apply_filters(&mut s.candidates, &settings);
        s.filtering = stats;

        let stage = s.stages.get_mut(Stage::Filtering);
        stage.record(total);
        stage.complete();
        s.touch();
        info!(
            passed = s.filtering.total_passed,
            skipped = s.filtering.total_skipped,
            "filtering complete"
        );
        total
    };

    eta.lock()
        .unwrap_or_else(|e| e.into_inner())
        .record_sample(Stage::Filtering, total, started.elapsed());

    StageExit::Completed
}
