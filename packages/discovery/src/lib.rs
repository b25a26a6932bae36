//! Job-Posting Discovery Pipeline
//!
//! Pulls candidate job postings from multiple external sources, filters
//! them against user-supplied criteria, and enriches the survivors with
//! structured data from an LLM, while tracking live progress, projected
//! completion time, and crash-safe snapshots for pause/stop/resume.
//!
//! # Architecture
//!
//! Three stages run strictly in order per session, as one background task:
//!
//! ```text
//! collecting -> filtering -> enriching -> completed
//! ```
//!
//! Collection and enrichment suspend on network calls and honor
//! pause/stop at per-item checkpoints; filtering is a pure synchronous
//! pass. A snapshot is written at every stage boundary and on suspension,
//! and `resume` replays it from the first incomplete stage.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use discovery::orchestrator::Orchestrator;
//! use discovery::snapshot::FsSnapshotStore;
//! use discovery::sources::DefaultSourceProvider;
//! use discovery::stores::MemorySessionStore;
//! use discovery::ai::openai::OpenAiExtractorFactory;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(FsSnapshotStore::new("./snapshots")),
//!     Arc::new(DefaultSourceProvider::new()),
//!     Arc::new(OpenAiExtractorFactory),
//! );
//!
//! let id = orchestrator.start(settings).await?;
//! let report = orchestrator.progress(id).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core seams (SourceFetcher, Extractor, SessionStore)
//! - [`types`] - Session, candidate, progress, and settings types
//! - [`sources`] - Real source fetchers and request discipline
//! - [`stages`] - The three pipeline stages
//! - [`eta`] - Throughput sampling and remaining-time estimation
//! - [`snapshot`] - Durable snapshots for pause/stop/resume
//! - [`orchestrator`] - Session state machine and control operations
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod error;
pub mod eta;
pub mod orchestrator;
pub mod snapshot;
pub mod sources;
pub mod stages;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{EnrichError, OrchestratorError, SnapshotError, SourceError};
pub use eta::{format_duration, Estimate, EtaEngine, SpeedSample};
pub use orchestrator::Orchestrator;
pub use snapshot::{FsSnapshotStore, MemorySnapshotStore, SessionSnapshot, SnapshotStore};
pub use sources::DefaultSourceProvider;
pub use stores::MemorySessionStore;
pub use traits::{
    extractor::{CallUsage, ExtractOutcome, Extractor, ExtractorFactory},
    source::{FetchOutcome, SourceFetcher, SourceProvider},
    store::SessionStore,
};
pub use types::{
    candidate::{Candidate, CandidateStatus, Enrichment},
    config::ScraperConfig,
    progress::{ProgressReport, StageProgress, StageStatus},
    session::{Session, SessionStatus, Stage},
    settings::{LlmSettings, SearchSettings},
};
