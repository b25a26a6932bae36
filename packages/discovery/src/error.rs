//! Typed errors for the discovery pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on failure classes instead of string contents.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while talking to an external job source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transient failure (timeout, connection reset, 5xx). Retried per the
    /// source's backoff policy.
    #[error("{source_name}: transient error: {message}")]
    Transient {
        source_name: String,
        message: String,
    },

    /// The source is actively refusing us (HTTP 429/403). Never retried in
    /// the current run; retrying would worsen the blocking.
    #[error("{source_name}: blocked by source (HTTP {status})")]
    Blocked { source_name: String, status: u16 },

    /// A response arrived but could not be decoded.
    #[error("{source_name}: invalid response: {message}")]
    InvalidResponse {
        source_name: String,
        message: String,
    },
}

impl SourceError {
    /// Whether the retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient { .. })
    }

    /// The source this error came from.
    pub fn source_name(&self) -> &str {
        match self {
            SourceError::Transient { source_name, .. }
            | SourceError::Blocked { source_name, .. }
            | SourceError::InvalidResponse { source_name, .. } => source_name,
        }
    }
}

/// Errors raised by the enrichment stage.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Credential failed format validation. Aborts the stage before any
    /// call is made, so no tokens are spent.
    #[error("invalid LLM credential: {0}")]
    InvalidCredential(String),

    /// The LLM call itself failed (network, HTTP error). Recorded per
    /// candidate; the stage continues.
    #[error("LLM request failed: {0}")]
    Request(String),
}

/// Errors raised by a snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The on-disk snapshot was written by a newer engine.
    #[error("snapshot format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Errors surfaced by orchestrator operations at the control boundary.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// Settings rejected before any session or pipeline exists.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("session {0} has no resumable snapshot")]
    NotResumable(Uuid),

    /// At most one active pipeline task per session id.
    #[error("session {0} already has an active pipeline")]
    AlreadyActive(Uuid),

    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type alias for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;
