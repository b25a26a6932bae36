//! Session record: one end-to-end search run.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::candidate::Candidate;
use crate::types::progress::StageProgress;
use crate::types::settings::SearchSettings;

/// One of the three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collecting,
    Filtering,
    Enriching,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Collecting, Stage::Filtering, Stage::Enriching];

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Collecting => Some(Stage::Filtering),
            Stage::Filtering => Some(Stage::Enriching),
            Stage::Enriching => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Collecting => "collecting",
            Stage::Filtering => "filtering",
            Stage::Enriching => "enriching",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Stopped,
    Error,
    Completed,
}

/// Progress records for the three stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSet {
    pub collecting: StageProgress,
    pub filtering: StageProgress,
    pub enriching: StageProgress,
}

impl StageSet {
    pub fn get(&self, stage: Stage) -> &StageProgress {
        match stage {
            Stage::Collecting => &self.collecting,
            Stage::Filtering => &self.filtering,
            Stage::Enriching => &self.enriching,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut StageProgress {
        match stage {
            Stage::Collecting => &mut self.collecting,
            Stage::Filtering => &mut self.filtering,
            Stage::Enriching => &mut self.enriching,
        }
    }
}

/// Aggregates produced by the filtering stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilteringStats {
    pub total_passed: usize,
    pub total_skipped: usize,
    /// Histogram of skip reasons; each skipped candidate counts once.
    #[serde(default)]
    pub skip_reasons: HashMap<String, usize>,
}

/// Token and cost accumulators for the enrichment stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub total_enriched: usize,
    pub total_failed: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl EnrichmentStats {
    pub fn tokens_used(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One end-to-end search run. Exclusively owned and mutated through the
/// orchestrator for its session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub current_stage: Stage,
    pub settings: SearchSettings,
    pub candidates: Vec<Candidate>,
    pub stages: StageSet,
    pub filtering: FilteringStats,
    pub enrichment: EnrichmentStats,
    /// Session-level errors (fatal conditions); stage-local errors live in
    /// the stage records.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Set once a snapshot exists that a later `resume` can replay.
    pub resumable: bool,
    #[serde(default)]
    pub last_completed_stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(settings: SearchSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Running,
            current_stage: Stage::Collecting,
            settings,
            candidates: Vec::new(),
            stages: StageSet::default(),
            filtering: FilteringStats::default(),
            enrichment: EnrichmentStats::default(),
            errors: Vec::new(),
            resumable: false,
            last_completed_stage: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Terminal from the caller's point of view: nothing more will happen
    /// without an explicit resume.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Stopped | SessionStatus::Error
        )
    }

    pub fn can_stop(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    /// Distinct sources represented in the candidate set.
    pub fn sources_seen(&self) -> usize {
        self.candidates
            .iter()
            .map(|c| c.source.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::settings::SearchSettings;

    fn settings() -> SearchSettings {
        SearchSettings {
            search_terms: vec!["rust".to_string()],
            sources: vec!["remotive".to_string()],
            blacklist_companies: vec![],
            blacklist_title_words: vec![],
            blacklist_description_words: vec![],
            country_whitelist: vec![],
            languages: vec![],
            llm: Default::default(),
        }
    }

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(Stage::Collecting.next(), Some(Stage::Filtering));
        assert_eq!(Stage::Filtering.next(), Some(Stage::Enriching));
        assert_eq!(Stage::Enriching.next(), None);
    }

    #[test]
    fn new_session_starts_collecting() {
        let s = Session::new(settings());
        assert_eq!(s.status, SessionStatus::Running);
        assert_eq!(s.current_stage, Stage::Collecting);
        assert!(!s.resumable);
        assert!(!s.is_complete());
        assert!(s.can_stop());
    }

    #[test]
    fn terminal_states() {
        let mut s = Session::new(settings());
        s.status = SessionStatus::Stopped;
        assert!(s.is_complete());
        assert!(!s.can_stop());

        s.status = SessionStatus::Error;
        assert!(s.is_complete());

        s.status = SessionStatus::Paused;
        assert!(!s.is_complete());
        assert!(s.can_stop());
    }

    #[test]
    fn sources_seen_counts_distinct() {
        use crate::types::candidate::Candidate;
        let mut s = Session::new(settings());
        s.candidates.push(Candidate::new("a", "u1", "t", "c", "d"));
        s.candidates.push(Candidate::new("a", "u2", "t", "c", "d"));
        s.candidates.push(Candidate::new("b", "u3", "t", "c", "d"));
        assert_eq!(s.sources_seen(), 2);
    }
}
