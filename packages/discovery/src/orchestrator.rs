//! Session orchestration: the pipeline state machine.
//!
//! Each session runs as one spawned background task whose handle is
//! retained, so `pause`/`stop` can signal it deterministically and tests
//! (or shutdown) can join it. The task sequences the stages strictly in
//! order, writes a snapshot at every stage boundary and on suspension,
//! and keeps session status and stage status mutually consistent inside
//! single critical sections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::eta::{self, format_duration, Estimate, EtaEngine};
use crate::snapshot::{SessionSnapshot, SnapshotStore};
use crate::stages::{self, StageExit};
use crate::traits::extractor::ExtractorFactory;
use crate::traits::source::SourceProvider;
use crate::traits::store::SessionStore;
use crate::types::progress::{
    EnrichmentStatsReport, ProgressReport, StageReport, StageReportSet,
};
use crate::types::session::{Session, SessionStatus, Stage};
use crate::types::settings::SearchSettings;

/// Relative weight of each stage in the overall percent figure. Collection
/// and enrichment dominate wall-clock time; filtering is nearly free.
const STAGE_WEIGHTS: [(Stage, f64); 3] = [
    (Stage::Collecting, 0.4),
    (Stage::Filtering, 0.1),
    (Stage::Enriching, 0.5),
];

struct PipelineHandle {
    /// Taken by `join`; `None` afterwards.
    task: Option<JoinHandle<()>>,
    eta: Arc<StdMutex<EtaEngine>>,
    revision: Arc<AtomicU64>,
}

/// Everything a pipeline task needs, cloned out of the orchestrator so the
/// task owns its dependencies.
struct PipelineCtx {
    session: Arc<Mutex<Session>>,
    eta: Arc<StdMutex<EtaEngine>>,
    snapshots: Arc<dyn SnapshotStore>,
    sources: Arc<dyn SourceProvider>,
    extractors: Arc<dyn ExtractorFactory>,
    revision: Arc<AtomicU64>,
}

impl PipelineCtx {
    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.snapshots.save(snapshot).await {
            // A failed snapshot write must not kill the pipeline; it only
            // degrades resumability.
            warn!(
                session_id = %snapshot.session.id,
                "failed to write snapshot: {e}"
            );
        }
    }
}

/// Owns the session registry and one background pipeline per session.
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    snapshots: Arc<dyn SnapshotStore>,
    sources: Arc<dyn SourceProvider>,
    extractors: Arc<dyn ExtractorFactory>,
    pipelines: StdMutex<HashMap<Uuid, PipelineHandle>>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        snapshots: Arc<dyn SnapshotStore>,
        sources: Arc<dyn SourceProvider>,
        extractors: Arc<dyn ExtractorFactory>,
    ) -> Self {
        Self {
            sessions,
            snapshots,
            sources,
            extractors,
            pipelines: StdMutex::new(HashMap::new()),
        }
    }

    /// Validate settings, create the session, and spawn its pipeline.
    /// Returns as soon as the task is spawned; progress is polled.
    pub async fn start(&self, settings: SearchSettings) -> OrchestratorResult<Uuid> {
        self.validate_settings(&settings)?;

        let session = Session::new(settings);
        let id = session.id;
        let handle = self.sessions.insert(session).await;
        self.spawn_pipeline(id, handle, Stage::Collecting, 0);

        info!(session_id = %id, "session started");
        Ok(id)
    }

    /// Current progress for a session, with ETA projections.
    pub async fn progress(&self, id: Uuid) -> OrchestratorResult<ProgressReport> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or(OrchestratorError::SessionNotFound(id))?;
        let session = handle.lock().await.clone();

        let eta = {
            let pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
            pipelines.get(&id).map(|p| p.eta.clone())
        };

        let report = match eta {
            Some(eta) => {
                let mut eta = eta.lock().unwrap_or_else(|e| e.into_inner());
                build_report(&session, &mut eta)
            }
            // No pipeline ever ran in this process (e.g. freshly restarted
            // server); completed stages still report zero ETA.
            None => build_report(&session, &mut EtaEngine::new()),
        };
        Ok(report)
    }

    /// Pause a running session. The pipeline honors the flag at its next
    /// per-item checkpoint and writes a snapshot before suspending.
    pub async fn pause(&self, id: Uuid) -> OrchestratorResult<bool> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or(OrchestratorError::SessionNotFound(id))?;

        let mut s = handle.lock().await;
        if s.status != SessionStatus::Running {
            return Ok(false);
        }
        s.status = SessionStatus::Paused;
        let stage = s.current_stage;
        s.stages.get_mut(stage).pause();
        s.touch();
        info!(session_id = %id, stage = %stage, "pause requested");
        Ok(true)
    }

    /// Stop a running or paused session. Stopped sessions stay resumable
    /// as long as their snapshot allows it.
    pub async fn stop(&self, id: Uuid) -> OrchestratorResult<bool> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or(OrchestratorError::SessionNotFound(id))?;

        let pipeline_active = {
            let pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
            pipelines
                .get(&id)
                .and_then(|p| p.task.as_ref())
                .map(|t| !t.is_finished())
                .unwrap_or(false)
        };

        let snapshot = {
            let mut s = handle.lock().await;
            if !s.can_stop() {
                return Ok(false);
            }
            let stage = s.current_stage;
            s.status = SessionStatus::Stopped;
            s.stages.get_mut(stage).stop();
            s.resumable = true;
            s.touch();
            info!(session_id = %id, stage = %stage, "stop requested");

            // An active pipeline writes the snapshot itself at the next
            // checkpoint; a suspended one cannot, so write it here.
            if pipeline_active {
                None
            } else {
                Some(SessionSnapshot::of(&s, self.next_revision_for(id).await))
            }
        };

        if let Some(snapshot) = snapshot {
            self.snapshots.save(&snapshot).await?;
        }
        Ok(true)
    }

    /// Resume a session from its snapshot at the first incomplete stage,
    /// replaying collected and filtered data without re-fetching.
    pub async fn resume(
        &self,
        id: Uuid,
        settings: Option<SearchSettings>,
    ) -> OrchestratorResult<Uuid> {
        if let Some(handle) = self.sessions.get(id).await {
            if handle.lock().await.status == SessionStatus::Running {
                return Err(OrchestratorError::AlreadyActive(id));
            }
        }

        let snapshot = self
            .snapshots
            .load(id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(id))?;
        if !snapshot.resumable {
            return Err(OrchestratorError::NotResumable(id));
        }

        let mut session = snapshot.session;
        // Fresh settings usually carry a fresh credential; validate them
        // like a new start.
        if let Some(new_settings) = settings {
            self.validate_settings(&new_settings)?;
            session.settings = new_settings;
        }

        let from = match session.last_completed_stage {
            None => Stage::Collecting,
            Some(stage) => match stage.next() {
                Some(next) => next,
                None => return Err(OrchestratorError::NotResumable(id)),
            },
        };

        session.status = SessionStatus::Running;
        session.current_stage = from;
        session.stages.get_mut(from).reset_for_resume();
        session.touch();

        info!(session_id = %id, stage = %from, revision = snapshot.revision, "resuming from snapshot");
        let handle = self.sessions.insert(session).await;
        self.spawn_pipeline(id, handle, from, snapshot.revision);
        Ok(id)
    }

    /// Ids of all sessions known to this process.
    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.ids().await
    }

    /// Await the session's pipeline task, if one is active. Used by tests
    /// and graceful shutdown; progress polling never blocks on this.
    pub async fn join(&self, id: Uuid) {
        let task = {
            let mut pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
            pipelines.get_mut(&id).and_then(|p| p.task.take())
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(session_id = %id, "pipeline task panicked: {e}");
            }
        }
    }

    fn validate_settings(&self, settings: &SearchSettings) -> OrchestratorResult<()> {
        settings
            .validate(&self.sources.known_sources())
            .map_err(OrchestratorError::InvalidSettings)
    }

    async fn next_revision_for(&self, id: Uuid) -> u64 {
        let counter = {
            let pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
            pipelines.get(&id).map(|p| p.revision.clone())
        };
        match counter {
            Some(counter) => counter.fetch_add(1, Ordering::SeqCst) + 1,
            // No pipeline this process lifetime: continue from the stored
            // snapshot's revision.
            None => {
                let base = self
                    .snapshots
                    .load(id)
                    .await
                    .ok()
                    .flatten()
                    .map(|s| s.revision)
                    .unwrap_or(0);
                base + 1
            }
        }
    }

    fn spawn_pipeline(
        &self,
        id: Uuid,
        session: Arc<Mutex<Session>>,
        from: Stage,
        base_revision: u64,
    ) {
        let eta = Arc::new(StdMutex::new(EtaEngine::new()));
        let revision = Arc::new(AtomicU64::new(base_revision));
        let ctx = PipelineCtx {
            session,
            eta: eta.clone(),
            snapshots: self.snapshots.clone(),
            sources: self.sources.clone(),
            extractors: self.extractors.clone(),
            revision: revision.clone(),
        };

        let task = tokio::spawn(run_pipeline(ctx, from));

        let mut pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
        pipelines.insert(
            id,
            PipelineHandle {
                task: Some(task),
                eta,
                revision,
            },
        );
    }
}

/// The background pipeline: run stages in order until completion,
/// interruption, or failure.
async fn run_pipeline(ctx: PipelineCtx, from: Stage) {
    let mut next = Some(from);

    while let Some(stage) = next {
        {
            let mut s = ctx.session.lock().await;
            s.current_stage = stage;
            s.touch();
        }

        let exit = match stage {
            Stage::Collecting => {
                stages::run_collection(&ctx.session, &ctx.eta, ctx.sources.as_ref()).await
            }
            Stage::Filtering => stages::run_filtering(&ctx.session, &ctx.eta).await,
            Stage::Enriching => {
                stages::run_enrichment(&ctx.session, &ctx.eta, ctx.extractors.as_ref()).await
            }
        };

        match exit {
            StageExit::Completed => {
                let snapshot = {
                    let mut s = ctx.session.lock().await;
                    s.last_completed_stage = Some(stage);
                    if stage == Stage::Enriching {
                        s.status = SessionStatus::Completed;
                        s.resumable = false;
                        info!(session_id = %s.id, "pipeline completed");
                    } else {
                        s.resumable = true;
                    }
                    s.touch();
                    SessionSnapshot::of(&s, ctx.next_revision())
                };
                ctx.save_snapshot(&snapshot).await;
                next = stage.next();
            }
            StageExit::Interrupted => {
                // Status was already flipped by the pause/stop command;
                // snapshot before suspending.
                let snapshot = {
                    let mut s = ctx.session.lock().await;
                    s.resumable = true;
                    s.touch();
                    info!(session_id = %s.id, status = ?s.status, stage = %stage, "pipeline suspended");
                    SessionSnapshot::of(&s, ctx.next_revision())
                };
                ctx.save_snapshot(&snapshot).await;
                next = None;
            }
            StageExit::Failed => {
                let snapshot = {
                    let mut s = ctx.session.lock().await;
                    s.status = SessionStatus::Error;
                    s.resumable = true;
                    s.touch();
                    error!(session_id = %s.id, stage = %stage, "pipeline failed");
                    SessionSnapshot::of(&s, ctx.next_revision())
                };
                ctx.save_snapshot(&snapshot).await;
                next = None;
            }
        }
    }
}

fn stage_report(
    session: &Session,
    eta: &mut EtaEngine,
    stage: Stage,
) -> (StageReport, Estimate) {
    let progress = session.stages.get(stage);
    let estimate = eta.estimate(stage, progress);
    let report = StageReport {
        status: progress.status,
        items_processed: progress.items_processed,
        items_total: progress.items_total,
        eta_seconds: estimate.eta_seconds(),
        eta_confidence: estimate.confidence(),
        errors: progress.errors.clone(),
    };
    (report, estimate)
}

fn build_report(session: &Session, eta: &mut EtaEngine) -> ProgressReport {
    let (collecting, est_collecting) = stage_report(session, eta, Stage::Collecting);
    let (filtering, est_filtering) = stage_report(session, eta, Stage::Filtering);
    let (enriching, est_enriching) = stage_report(session, eta, Stage::Enriching);

    let per_stage = [
        (Stage::Collecting, collecting.status, est_collecting),
        (Stage::Filtering, filtering.status, est_filtering),
        (Stage::Enriching, enriching.status, est_enriching),
    ];
    let overall = eta::combine_overall(&per_stage, session.current_stage);

    ProgressReport {
        session_id: session.id,
        current_stage: session.current_stage,
        status: session.status,
        stages: StageReportSet {
            collecting,
            filtering,
            enriching,
        },
        overall_progress: overall_percent(session),
        overall_eta_seconds: overall.eta_seconds(),
        overall_eta: overall.eta_seconds().map(format_duration),
        overall_confidence: overall.confidence(),
        filtering_stats: session.filtering.clone(),
        enrichment_stats: EnrichmentStatsReport {
            total_enriched: session.enrichment.total_enriched,
            total_failed: session.enrichment.total_failed,
            tokens_used: session.enrichment.tokens_used(),
            cost_usd: session.enrichment.cost_usd,
            sources_count: session.sources_seen(),
        },
        is_complete: session.is_complete(),
        can_stop: session.can_stop(),
    }
}

fn overall_percent(session: &Session) -> f64 {
    if session.status == SessionStatus::Completed {
        return 100.0;
    }
    STAGE_WEIGHTS
        .iter()
        .map(|(stage, weight)| weight * session.stages.get(*stage).fraction() * 100.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshotStore;
    use crate::stores::MemorySessionStore;
    use crate::testing::{
        candidate, settings, MockExtractor, MockExtractorFactory, MockSource, MockSourceProvider,
    };

    fn orchestrator(provider: MockSourceProvider, extractor: MockExtractor) -> Orchestrator {
        Orchestrator::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(provider),
            Arc::new(MockExtractorFactory::new(extractor)),
        )
    }

    #[tokio::test]
    async fn start_rejects_invalid_settings() {
        let orch = orchestrator(MockSourceProvider::new(), MockExtractor::new());

        let err = orch
            .start(settings(&[], &["mock"]))
            .await
            .expect_err("empty terms");
        assert!(matches!(err, OrchestratorError::InvalidSettings(_)));

        let err = orch
            .start(settings(&["rust"], &["unknown"]))
            .await
            .expect_err("unknown source");
        assert!(matches!(err, OrchestratorError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn progress_unknown_session_is_not_found() {
        let orch = orchestrator(MockSourceProvider::new(), MockExtractor::new());
        let err = orch.progress(Uuid::new_v4()).await.expect_err("unknown");
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn pause_unknown_session_is_not_found() {
        let orch = orchestrator(MockSourceProvider::new(), MockExtractor::new());
        assert!(orch.pause(Uuid::new_v4()).await.is_err());
        assert!(orch.stop(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn full_run_reaches_completed() {
        let source = MockSource::new("mock").with_fallback(vec![
            candidate("mock", "https://example.com/j/1", "Engineer", "Acme"),
            candidate("mock", "https://example.com/j/2", "Developer", "Globex"),
        ]);
        let provider = MockSourceProvider::new().with_source(Arc::new(source));
        let orch = orchestrator(provider, MockExtractor::new());

        let id = orch.start(settings(&["rust"], &["mock"])).await.expect("start");
        orch.join(id).await;

        let report = orch.progress(id).await.expect("progress");
        assert_eq!(report.status, SessionStatus::Completed);
        assert!(report.is_complete);
        assert!(!report.can_stop);
        assert_eq!(report.overall_progress, 100.0);
        assert_eq!(report.enrichment_stats.total_enriched, 2);
        assert_eq!(report.overall_eta_seconds, Some(0.0));
        assert_eq!(report.overall_confidence, Some(1.0));
    }

    #[tokio::test]
    async fn resume_without_snapshot_is_not_found() {
        let orch = orchestrator(MockSourceProvider::new(), MockExtractor::new());
        let err = orch
            .resume(Uuid::new_v4(), None)
            .await
            .expect_err("no snapshot");
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn completed_session_is_not_resumable() {
        let source = MockSource::new("mock").with_fallback(vec![candidate(
            "mock",
            "https://example.com/j/1",
            "Engineer",
            "Acme",
        )]);
        let provider = MockSourceProvider::new().with_source(Arc::new(source));
        let orch = orchestrator(provider, MockExtractor::new());

        let id = orch.start(settings(&["rust"], &["mock"])).await.expect("start");
        orch.join(id).await;

        let err = orch.resume(id, None).await.expect_err("completed");
        assert!(matches!(err, OrchestratorError::NotResumable(_)));
    }
}
