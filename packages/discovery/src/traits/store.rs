//! Key-value access to session records.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::session::Session;

/// Key-value store of sessions by id.
///
/// The returned `Arc<Mutex<Session>>` is the per-session exclusive guard:
/// the pipeline task and control commands serialize their critical sections
/// on it. Components pass session ids across boundaries, never raw
/// references; a storage-backed implementation can be substituted without
/// touching orchestration logic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session record, keyed by its id.
    async fn insert(&self, session: Session) -> Arc<Mutex<Session>>;

    /// Look up the guard for a session id.
    async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>>;

    /// Drop a session record. Returns whether it existed.
    async fn remove(&self, id: Uuid) -> bool;

    /// Ids of all known sessions.
    async fn ids(&self) -> Vec<Uuid>;
}
