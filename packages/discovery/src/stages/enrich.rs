//! Enrichment stage: one LLM call per surviving candidate.

use std::sync::Mutex as StdMutex;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ai::call_cost;
use crate::eta::EtaEngine;
use crate::stages::{is_running, StageExit};
use crate::traits::extractor::{CallUsage, ExtractOutcome, ExtractorFactory};
use crate::types::candidate::CandidateStatus;
use crate::types::session::{Session, SessionStatus, Stage};

/// Run enrichment over every candidate that passed filtering.
///
/// The credential is format-validated (via the factory) before any call is
/// made; a bad credential fails the stage with zero spend. Per-candidate
/// call failures and unparseable responses are recorded and the stage
/// continues. Candidates are processed one at a time to bound concurrent
/// external cost exposure; that is a tunable, not a contract.
pub async fn run_enrichment(
    session: &Mutex<Session>,
    eta: &StdMutex<EtaEngine>,
    factory: &dyn ExtractorFactory,
) -> StageExit {
    let (llm, pending, already_done) = {
        let mut s = session.lock().await;
        if s.status != SessionStatus::Running {
            return StageExit::Interrupted;
        }
        let pending: Vec<String> = s
            .candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::Passed)
            .map(|c| c.id.clone())
            .collect();
        // Candidates enriched before a pause are replayed from the
        // snapshot, not re-sent.
        let done = s
            .candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::Enriched)
            .count();
        let stage = s.stages.get_mut(Stage::Enriching);
        stage.begin(pending.len() + done);
        stage.record(done);
        s.touch();
        (s.settings.llm.clone(), pending, done)
    };

    let extractor = match factory.create(&llm) {
        Ok(extractor) => extractor,
        Err(err) => {
            let mut s = session.lock().await;
            s.stages.get_mut(Stage::Enriching).fail(err.to_string());
            s.touch();
            warn!("enrichment aborted before any call: {err}");
            return StageExit::Failed;
        }
    };

    let mut processed = already_done;
    for id in pending {
        if !is_running(session).await {
            return StageExit::Interrupted;
        }

        let candidate = {
            let s = session.lock().await;
            match s.candidates.iter().find(|c| c.id == id) {
                Some(c) => c.clone(),
                None => continue,
            }
        };

        let started = Instant::now();
        let result = extractor
            .extract(&candidate, llm.instructions.as_deref())
            .await;

        {
            let mut s = session.lock().await;
            processed += 1;
            match result {
                Ok((ExtractOutcome::Parsed(enrichment), usage)) => {
                    apply_usage(&mut s, &llm.model, usage);
                    s.enrichment.total_enriched += 1;
                    if let Some(c) = s.candidates.iter_mut().find(|c| c.id == id) {
                        c.status = CandidateStatus::Enriched;
                        c.enrichment = Some(enrichment);
                    }
                }
                Ok((ExtractOutcome::ParseFailure { message }, usage)) => {
                    // Tokens were spent even though the content was unusable.
                    apply_usage(&mut s, &llm.model, usage);
                    s.enrichment.total_failed += 1;
                    s.stages
                        .get_mut(Stage::Enriching)
                        .errors
                        .push(format!("{}: unparseable response: {message}", candidate.title));
                }
                Err(err) => {
                    s.enrichment.total_failed += 1;
                    s.stages
                        .get_mut(Stage::Enriching)
                        .errors
                        .push(format!("{}: {err}", candidate.title));
                }
            }
            s.stages.get_mut(Stage::Enriching).record(processed);
            s.touch();
        }

        eta.lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_sample(Stage::Enriching, 1, started.elapsed());
    }

    let mut s = session.lock().await;
    s.stages.get_mut(Stage::Enriching).complete();
    s.touch();
    info!(
        enriched = s.enrichment.total_enriched,
        failed = s.enrichment.total_failed,
        cost_usd = s.enrichment.cost_usd,
        "enrichment complete"
    );
    StageExit::Completed
}

fn apply_usage(session: &mut Session, model: &str, usage: CallUsage) {
    session.enrichment.prompt_tokens += usage.prompt_tokens;
    session.enrichment.completion_tokens += usage.completion_tokens;
    session.enrichment.cost_usd += call_cost(model, &usage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{apply_filters, StageExit};
    use crate::testing::{candidate, settings, MockExtractor, MockExtractorFactory};
    use crate::types::progress::StageStatus;

    fn session_with_passed(n: usize) -> Session {
        let mut settings = settings(&["rust"], &["mock"]);
        settings.llm.api_key = "sk-abcdefghij0123456789xyz".to_string();
        let mut session = Session::new(settings);
        for i in 0..n {
            session.candidates.push(candidate(
                "mock",
                &format!("https://example.com/j/{i}"),
                "Engineer",
                "Acme",
            ));
        }
        let s = session.settings.clone();
        session.filtering = apply_filters(&mut session.candidates, &s);
        session
    }

    #[tokio::test]
    async fn enriches_all_passed_candidates() {
        let session = Mutex::new(session_with_passed(3));
        let eta = StdMutex::new(EtaEngine::new());
        let extractor = MockExtractor::new();
        let factory = MockExtractorFactory::new(extractor.clone());

        let exit = run_enrichment(&session, &eta, &factory).await;
        assert_eq!(exit, StageExit::Completed);

        let s = session.lock().await;
        assert_eq!(s.enrichment.total_enriched, 3);
        assert_eq!(s.enrichment.total_failed, 0);
        assert!(s.enrichment.tokens_used() > 0);
        assert!(s.enrichment.cost_usd > 0.0);
        assert!(s
            .candidates
            .iter()
            .all(|c| c.status == CandidateStatus::Enriched && c.enrichment.is_some()));
    }

    #[tokio::test]
    async fn invalid_credential_fails_stage_with_zero_spend() {
        let mut session = session_with_passed(2);
        session.settings.llm.api_key = String::new();
        let session = Mutex::new(session);
        let eta = StdMutex::new(EtaEngine::new());
        let extractor = MockExtractor::new();
        let factory = MockExtractorFactory::new(extractor.clone());

        let exit = run_enrichment(&session, &eta, &factory).await;
        assert_eq!(exit, StageExit::Failed);

        let s = session.lock().await;
        let stage = s.stages.get(Stage::Enriching);
        assert_eq!(stage.status, StageStatus::Failed);
        assert!(stage.errors.iter().any(|e| e.contains("credential")));
        assert_eq!(s.enrichment.total_enriched, 0);
        assert_eq!(s.enrichment.tokens_used(), 0);
        assert_eq!(s.enrichment.cost_usd, 0.0);
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn parse_failure_continues_and_counts_spend() {
        let session = Mutex::new(session_with_passed(2));
        let eta = StdMutex::new(EtaEngine::new());
        let extractor = MockExtractor::new().with_parse_failure();
        let factory = MockExtractorFactory::new(extractor.clone());

        let exit = run_enrichment(&session, &eta, &factory).await;
        assert_eq!(exit, StageExit::Completed);

        let s = session.lock().await;
        assert_eq!(s.enrichment.total_enriched, 0);
        assert_eq!(s.enrichment.total_failed, 2);
        // The calls still happened and still cost tokens.
        assert!(s.enrichment.tokens_used() > 0);
        let stage = s.stages.get(Stage::Enriching);
        assert_eq!(stage.status, StageStatus::Completed);
        assert_eq!(stage.errors.len(), 2);
        assert!(s
            .candidates
            .iter()
            .all(|c| c.status == CandidateStatus::Passed && c.enrichment.is_none()));
    }

    #[tokio::test]
    async fn already_enriched_candidates_are_not_resent() {
        let mut session = session_with_passed(3);
        // Simulate snapshot replay: one candidate already enriched.
        session.candidates[0].status = CandidateStatus::Enriched;
        let session = Mutex::new(session);
        let eta = StdMutex::new(EtaEngine::new());
        let extractor = MockExtractor::new();
        let factory = MockExtractorFactory::new(extractor.clone());

        let exit = run_enrichment(&session, &eta, &factory).await;
        assert_eq!(exit, StageExit::Completed);

        assert_eq!(extractor.call_count(), 2);
        let s = session.lock().await;
        let stage = s.stages.get(Stage::Enriching);
        assert_eq!(stage.items_total, 3);
        assert_eq!(stage.items_processed, 3);
    }
}
