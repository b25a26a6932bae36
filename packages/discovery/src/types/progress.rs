//! Per-stage progress bookkeeping and the progress report returned to
//! the control surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::session::{FilteringStats, SessionStatus, Stage};

/// Status of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
    Paused,
}

/// Progress bookkeeping for one stage of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub status: StageStatus,
    pub items_processed: usize,
    pub items_total: usize,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl StageProgress {
    pub fn new() -> Self {
        Self {
            status: StageStatus::Pending,
            items_processed: 0,
            items_total: 0,
            started_at: None,
            paused_at: None,
            ended_at: None,
            errors: Vec::new(),
        }
    }

    /// Mark the stage running with a known item count. Resets the processed
    /// counter; callers that replay prior work record it right after.
    pub fn begin(&mut self, total: usize) {
        self.status = StageStatus::Running;
        self.items_total = total;
        self.items_processed = 0;
        self.started_at.get_or_insert_with(Utc::now);
        self.paused_at = None;
        self.ended_at = None;
    }

    /// Record progress, clamping processed into `[0, items_total]`.
    pub fn record(&mut self, processed: usize) {
        self.items_processed = processed.min(self.items_total);
    }

    pub fn remaining(&self) -> usize {
        self.items_total.saturating_sub(self.items_processed)
    }

    /// Completion fraction in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.status == StageStatus::Completed {
            return 1.0;
        }
        if self.items_total == 0 {
            return 0.0;
        }
        self.items_processed as f64 / self.items_total as f64
    }

    pub fn complete(&mut self) {
        self.status = StageStatus::Completed;
        self.ended_at = Some(Utc::now());
    }

    /// Honors only a running stage; completed work is never downgraded.
    pub fn pause(&mut self) {
        if self.status == StageStatus::Running {
            self.status = StageStatus::Paused;
            self.paused_at = Some(Utc::now());
        }
    }

    /// Honors any non-completed stage.
    pub fn stop(&mut self) {
        if self.status != StageStatus::Completed {
            self.status = StageStatus::Stopped;
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn fail(&mut self, error: String) {
        self.status = StageStatus::Failed;
        self.errors.push(error);
        self.ended_at = Some(Utc::now());
    }

    /// Put an interrupted or failed stage back to pending so a resumed
    /// pipeline can re-enter it. Error history is kept.
    pub fn reset_for_resume(&mut self) {
        self.status = StageStatus::Pending;
        self.paused_at = None;
        self.ended_at = None;
    }
}

impl Default for StageProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Report for one stage inside a [`ProgressReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub status: StageStatus,
    pub items_processed: usize,
    pub items_total: usize,
    #[serde(default)]
    pub eta_seconds: Option<f64>,
    #[serde(default)]
    pub eta_confidence: Option<f64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Per-stage reports, one field per stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReportSet {
    pub collecting: StageReport,
    pub filtering: StageReport,
    pub enriching: StageReport,
}

/// Enrichment aggregates as exposed to the control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentStatsReport {
    pub total_enriched: usize,
    pub total_failed: usize,
    pub tokens_used: u64,
    pub cost_usd: f64,
    /// Distinct sources represented in the candidate set.
    pub sources_count: usize,
}

/// Full progress view of one session, suitable for polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub session_id: Uuid,
    pub current_stage: Stage,
    pub status: SessionStatus,
    pub stages: StageReportSet,
    /// Percent complete across all stages, weighted.
    pub overall_progress: f64,
    #[serde(default)]
    pub overall_eta_seconds: Option<f64>,
    /// Human-formatted remaining time ("3m 20s").
    #[serde(default)]
    pub overall_eta: Option<String>,
    #[serde(default)]
    pub overall_confidence: Option<f64>,
    pub filtering_stats: FilteringStats,
    pub enrichment_stats: EnrichmentStatsReport,
    pub is_complete: bool,
    pub can_stop: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_clamps_to_total() {
        let mut p = StageProgress::new();
        p.begin(10);
        p.record(15);
        assert_eq!(p.items_processed, 10);
        assert_eq!(p.remaining(), 0);

        p.record(3);
        assert_eq!(p.items_processed, 3);
        assert_eq!(p.remaining(), 7);
    }

    #[test]
    fn begin_resets_processed() {
        let mut p = StageProgress::new();
        p.begin(5);
        p.record(4);
        p.begin(5);
        assert_eq!(p.items_processed, 0);
    }

    #[test]
    fn stop_does_not_downgrade_completed() {
        let mut p = StageProgress::new();
        p.begin(1);
        p.record(1);
        p.complete();
        p.stop();
        assert_eq!(p.status, StageStatus::Completed);
    }

    #[test]
    fn pause_only_applies_to_running() {
        let mut p = StageProgress::new();
        p.pause();
        assert_eq!(p.status, StageStatus::Pending);

        p.begin(1);
        p.pause();
        assert_eq!(p.status, StageStatus::Paused);
        assert!(p.paused_at.is_some());
    }

    #[test]
    fn fraction_handles_empty_total() {
        let mut p = StageProgress::new();
        assert_eq!(p.fraction(), 0.0);
        p.begin(0);
        p.complete();
        assert_eq!(p.fraction(), 1.0);
    }
}
