//! Collection stage: drive every enabled source for every search term.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::eta::EtaEngine;
use crate::stages::{is_running, StageExit};
use crate::traits::source::SourceProvider;
use crate::types::session::{Session, SessionStatus, Stage};

/// Run collection over the session's sources and search terms.
///
/// One work item is one (source, term) fetch. A failing source records an
/// error and the stage moves on; a blocked source abandons its remaining
/// terms for this run. Candidates dedupe by id.
pub async fn run_collection(
    session: &Mutex<Session>,
    eta: &StdMutex<EtaEngine>,
    provider: &dyn SourceProvider,
) -> StageExit {
    let (terms, source_names, mut seen) = {
        let mut s = session.lock().await;
        if s.status != SessionStatus::Running {
            return StageExit::Interrupted;
        }
        let terms = s.settings.search_terms.clone();
        let names = s.settings.sources.clone();
        let total = terms.len() * names.len();
        s.stages.get_mut(Stage::Collecting).begin(total);
        s.touch();
        let seen: HashSet<String> = s.candidates.iter().map(|c| c.id.clone()).collect();
        (terms, names, seen)
    };

    let mut processed = 0usize;

    for name in &source_names {
        let Some(fetcher) = provider.fetcher(name) else {
            // Settings were validated against the provider at start; a miss
            // here means the provider changed underneath the session.
            processed += terms.len();
            record_source_skip(
                session,
                processed,
                format!("unknown source: {name}"),
            )
            .await;
            continue;
        };

        if !fetcher.check_availability().await {
            warn!(source = %name, "source unavailable, skipping for this run");
            processed += terms.len();
            record_source_skip(
                session,
                processed,
                format!("{name}: availability check failed, skipped for this run"),
            )
            .await;
            continue;
        }

        for (index, term) in terms.iter().enumerate() {
            if !is_running(session).await {
                return StageExit::Interrupted;
            }

            let started = Instant::now();
            match fetcher.fetch(term).await {
                Ok(outcome) => {
                    let mut s = session.lock().await;
                    let mut added = 0usize;
                    for candidate in outcome.candidates {
                        if seen.insert(candidate.id.clone()) {
                            s.candidates.push(candidate);
                            added += 1;
                        }
                    }
                    processed += 1;
                    let stage = s.stages.get_mut(Stage::Collecting);
                    stage.errors.extend(outcome.errors);
                    stage.record(processed);
                    s.touch();
                    info!(source = %name, term = %term, added, "collected");
                }
                Err(err) => {
                    let blocked = matches!(err, SourceError::Blocked { .. });
                    let mut s = session.lock().await;
                    let stage = s.stages.get_mut(Stage::Collecting);
                    stage.errors.push(err.to_string());
                    if blocked {
                        // Current term plus everything we will not attempt.
                        processed += terms.len() - index;
                        stage.record(processed);
                        s.touch();
                        drop(s);
                        warn!(source = %name, "source blocked, abandoning its remaining terms");
                        break;
                    }
                    processed += 1;
                    stage.record(processed);
                    s.touch();
                    warn!(source = %name, term = %term, "fetch failed: {err}");
                }
            }

            eta.lock()
                .unwrap_or_else(|e| e.into_inner())
                .record_sample(Stage::Collecting, 1, started.elapsed());
        }
    }

    let mut s = session.lock().await;
    let stage = s.stages.get_mut(Stage::Collecting);
    stage.record(processed.max(stage.items_total));
    stage.complete();
    let collected = s.candidates.len();
    s.touch();
    info!(candidates = collected, "collection complete");
    StageExit::Completed
}

async fn record_source_skip(session: &Mutex<Session>, processed: usize, error: String) {
    let mut s = session.lock().await;
    let stage = s.stages.get_mut(Stage::Collecting);
    stage.errors.push(error);
    stage.record(processed);
    s.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, settings, MockSource, MockSourceProvider};
    use crate::types::progress::StageStatus;
    use std::sync::Arc;

    fn locked(session: Session) -> Mutex<Session> {
        Mutex::new(session)
    }

    #[tokio::test]
    async fn collects_and_dedupes_across_terms() {
        let shared = candidate("mock", "https://example.com/j/1", "Engineer", "Acme");
        let source = MockSource::new("mock")
            .with_results("rust", vec![shared.clone()])
            .with_results(
                "backend",
                vec![
                    shared,
                    candidate("mock", "https://example.com/j/2", "Backend", "Globex"),
                ],
            );
        let provider = MockSourceProvider::new().with_source(Arc::new(source));

        let session = locked(Session::new(settings(&["rust", "backend"], &["mock"])));
        let eta = StdMutex::new(EtaEngine::new());

        let exit = run_collection(&session, &eta, &provider).await;
        assert_eq!(exit, StageExit::Completed);

        let s = session.lock().await;
        assert_eq!(s.candidates.len(), 2);
        let stage = s.stages.get(Stage::Collecting);
        assert_eq!(stage.status, StageStatus::Completed);
        assert_eq!(stage.items_processed, 2);
        assert_eq!(stage.items_total, 2);
    }

    #[tokio::test]
    async fn unavailable_source_is_skipped_with_error() {
        let healthy = MockSource::new("up").with_fallback(vec![candidate(
            "up",
            "https://example.com/j/1",
            "Engineer",
            "Acme",
        )]);
        let down = MockSource::new("down").unavailable();
        let provider = MockSourceProvider::new()
            .with_source(Arc::new(healthy))
            .with_source(Arc::new(down));

        let session = locked(Session::new(settings(&["rust"], &["up", "down"])));
        let eta = StdMutex::new(EtaEngine::new());

        let exit = run_collection(&session, &eta, &provider).await;
        assert_eq!(exit, StageExit::Completed);

        let s = session.lock().await;
        assert_eq!(s.candidates.len(), 1);
        let stage = s.stages.get(Stage::Collecting);
        assert_eq!(stage.items_processed, stage.items_total);
        assert!(stage.errors.iter().any(|e| e.contains("down")));
    }

    #[tokio::test]
    async fn blocked_source_abandons_remaining_terms() {
        let blocked = MockSource::new("walled").with_failure(SourceError::Blocked {
            source_name: "walled".to_string(),
            status: 429,
        });
        let provider = MockSourceProvider::new().with_source(Arc::new(blocked));

        let session = locked(Session::new(settings(&["a", "b", "c"], &["walled"])));
        let eta = StdMutex::new(EtaEngine::new());

        let exit = run_collection(&session, &eta, &provider).await;
        assert_eq!(exit, StageExit::Completed);

        let s = session.lock().await;
        let stage = s.stages.get(Stage::Collecting);
        // One fetch attempted, one blocked error, all items accounted for.
        assert_eq!(stage.errors.len(), 1);
        assert_eq!(stage.items_processed, 3);
        assert_eq!(stage.status, StageStatus::Completed);
    }

    #[tokio::test]
    async fn interrupts_when_session_not_running() {
        let source = MockSource::new("mock");
        let provider = MockSourceProvider::new().with_source(Arc::new(source));

        let mut session = Session::new(settings(&["rust"], &["mock"]));
        session.status = SessionStatus::Stopped;
        let session = locked(session);
        let eta = StdMutex::new(EtaEngine::new());

        let exit = run_collection(&session, &eta, &provider).await;
        assert_eq!(exit, StageExit::Interrupted);

        // The stage never began.
        let s = session.lock().await;
        assert_eq!(s.stages.get(Stage::Collecting).status, StageStatus::Pending);
    }
}
