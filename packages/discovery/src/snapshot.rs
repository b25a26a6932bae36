//! Durable session snapshots for pause/stop/resume.
//!
//! A snapshot is written at every stage boundary and whenever a pipeline
//! suspends, and read exactly once on resume. Writes are atomic (temp file
//! plus rename) so a snapshot is never observed half-applied.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SnapshotError;
use crate::types::session::{Session, Stage};

/// Current snapshot format major version. Files written by a newer engine
/// are rejected on load; same-version files with unknown fields are
/// tolerated through serde defaults.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    SNAPSHOT_FORMAT_VERSION
}

/// Versioned, durable copy of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Monotonically increasing per-session revision.
    pub revision: u64,
    /// Resume metadata, mirrored out of the session for quick inspection.
    #[serde(default)]
    pub last_completed_stage: Option<Stage>,
    pub resumable: bool,
    pub saved_at: DateTime<Utc>,
    /// Full session state: settings, candidates, per-stage results.
    pub session: Session,
}

impl SessionSnapshot {
    /// Capture the session as-is at the given revision.
    pub fn of(session: &Session, revision: u64) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            revision,
            last_completed_stage: session.last_completed_stage,
            resumable: session.resumable,
            saved_at: Utc::now(),
            session: session.clone(),
        }
    }
}

/// Store of one snapshot per session id.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist the snapshot, replacing any earlier one for the session.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError>;

    /// Latest snapshot for a session, or none.
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, SnapshotError>;

    /// Remove a session's snapshot. Returns whether one existed.
    async fn delete(&self, session_id: Uuid) -> Result<bool, SnapshotError>;
}

/// Snapshots as pretty JSON files under a directory, one per session.
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(snapshot.session.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::write(&tmp, &json).await?;
        // Atomic replace: readers see either the old snapshot or the new
        // one, never a partial write.
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            session_id = %snapshot.session.id,
            revision = snapshot.revision,
            "snapshot saved"
        );
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, SnapshotError> {
        let path = self.path_for(session_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SessionSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.format_version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, SnapshotError> {
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory snapshot store for tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<Uuid, SessionSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots held.
    pub fn len(&self) -> usize {
        self.snapshots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.session.id, snapshot.clone());
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, SnapshotError> {
        Ok(self
            .snapshots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
            .cloned())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, SnapshotError> {
        Ok(self
            .snapshots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id)
            .is_some())
    }
}
